use crate::config::Labfile;
use crate::error::Result;
use crate::types::{ExecOutput, HostState};
use async_trait::async_trait;

pub mod compose;

pub use compose::ComposeEngine;

/// Seam between the lifecycle controller and the external container engine.
///
/// Every operation is a proxy: the adapter holds no state, performs no
/// retries, and surfaces a single engine failure immediately as the
/// corresponding typed error. Tests substitute a fake implementation.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Verify the engine binaries are present. Fails with a
    /// `DependencyError` before any mutating call can happen.
    async fn ensure_available(&self) -> Result<()>;

    /// Build all host images declared with a build context
    async fn build(&self, env: &Labfile) -> Result<()>;

    /// Create the network and start all hosts, detached
    async fn up(&self, env: &Labfile) -> Result<()>;

    /// Stop and remove hosts and the network. Absent resources are treated
    /// as already stopped, not as failures.
    async fn down(&self, env: &Labfile, remove_volumes: bool) -> Result<()>;

    /// Snapshot of host states, in declaration order
    async fn ps(&self, env: &Labfile) -> Result<Vec<HostState>>;

    /// Stream engine logs to the terminal. With `follow`, blocks until the
    /// operator interrupts; the underlying process is then killed promptly.
    async fn logs(
        &self,
        env: &Labfile,
        host: Option<String>,
        follow: bool,
        tail: Option<usize>,
    ) -> Result<()>;

    /// Attach an interactive session inside a host; blocks until it ends
    async fn exec_interactive(&self, env: &Labfile, host: &str, command: &[String]) -> Result<()>;

    /// Run a command inside a host and capture its output
    async fn exec_capture(
        &self,
        env: &Labfile,
        host: &str,
        command: &[String],
    ) -> Result<ExecOutput>;

    /// Remove unused engine resources
    async fn prune(&self, env: &Labfile) -> Result<()>;

    /// Remove the images built for this environment
    async fn remove_images(&self, env: &Labfile) -> Result<()>;
}
