//! netlab - Declarative lifecycle manager for containerized training labs
//!
//! This crate provides programmatic access to netlab's environment
//! descriptor, lifecycle controller, connectivity prober and the compose
//! engine adapter behind them.

pub mod config;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod probe;
pub mod report;
pub mod types;

pub use config::{LabConfig, Labfile, create_example_labfile};
pub use error::{LabError, Result};

// Export main types at root level
pub use lifecycle::{Controller, Step, Verb, plan};
pub use types::{ExecOutput, HostState, ProbeResult, RunState};

/// Builder for creating environment descriptors programmatically
pub struct LabfileBuilder {
    project: String,
    cidr: String,
    hosts: Vec<config::Host>,
    mounts: Vec<config::SharedMount>,
}

impl LabfileBuilder {
    pub fn new(project: impl Into<String>, cidr: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            cidr: cidr.into(),
            hosts: Vec::new(),
            mounts: Vec::new(),
        }
    }

    pub fn add_host(mut self, host: config::Host) -> Self {
        self.hosts.push(host);
        self
    }

    pub fn add_mount(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.mounts.push(config::SharedMount {
            source: source.into(),
            target: target.into(),
            hosts: None,
        });
        self
    }

    pub fn build(self) -> config::Labfile {
        config::Labfile {
            project: self.project,
            network: config::Network {
                name: None,
                cidr: self.cidr,
            },
            hosts: self.hosts,
            mounts: self.mounts,
            startup: config::StartupConfig::default(),
            probe: config::ProbeConfig::default(),
        }
    }
}

/// Core netlab API: one loaded environment bound to the production engine
pub struct LabRuntime {
    config: LabConfig,
    env: Labfile,
    engine: engine::ComposeEngine,
}

impl LabRuntime {
    /// Load the descriptor at the configured path and bind the compose engine
    pub fn new(config: LabConfig) -> Result<Self> {
        let env = config.load_labfile()?;
        let engine = engine::ComposeEngine::new(config.clone());
        Ok(Self {
            config,
            env,
            engine,
        })
    }

    pub fn environment(&self) -> &Labfile {
        &self.env
    }

    /// Run one lifecycle verb to completion
    pub async fn execute(&self, verb: &Verb) -> Result<()> {
        Controller::new(&self.env, &self.config, &self.engine)
            .execute(verb)
            .await
    }
}
