use crate::config::{LabConfig, Labfile};
use crate::engine::ContainerEngine;
use crate::error::{DependencyError, EngineError, Result};
use crate::types::{ExecOutput, HostState, RunState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Which compose front-end is installed on this machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ComposeStyle {
    /// `docker compose` (v2 plugin)
    DockerPlugin,
    /// Standalone `docker-compose` binary
    Standalone,
}

/// Production adapter: renders a compose file from the descriptor and
/// shells out to the engine for every operation.
pub struct ComposeEngine {
    config: LabConfig,
    style: OnceCell<ComposeStyle>,
}

impl ComposeEngine {
    pub fn new(config: LabConfig) -> Self {
        Self {
            config,
            style: OnceCell::new(),
        }
    }

    async fn style(&self) -> Result<ComposeStyle> {
        let style = self
            .style
            .get_or_try_init(detect_compose_style)
            .await
            .map_err(crate::error::LabError::Dependency)?;
        Ok(*style)
    }

    /// Re-render the compose file so descriptor edits always take effect
    fn write_compose_file(&self, env: &Labfile) -> Result<PathBuf> {
        let rendered = render_compose(env, &self.config)?;
        let path = self.config.compose_path(&env.project);
        std::fs::create_dir_all(&self.config.data_dir)?;
        std::fs::write(&path, rendered)?;
        debug!("Compose file written to {:?}", path);
        Ok(path)
    }

    /// Base `docker compose -p <project> -f <file>` invocation
    async fn compose(&self, env: &Labfile) -> Result<Command> {
        let style = self.style().await?;
        let file = self.write_compose_file(env)?;

        let mut cmd = match style {
            ComposeStyle::Standalone => Command::new("docker-compose"),
            ComposeStyle::DockerPlugin => {
                let mut cmd = Command::new("docker");
                cmd.arg("compose");
                cmd
            }
        };
        cmd.arg("-p").arg(&env.project).arg("-f").arg(file);
        Ok(cmd)
    }
}

#[async_trait]
impl ContainerEngine for ComposeEngine {
    async fn ensure_available(&self) -> Result<()> {
        let style = self.style().await?;
        debug!("Engine available ({:?})", style);
        Ok(())
    }

    async fn build(&self, env: &Labfile) -> Result<()> {
        info!("🔨 Building lab images for project '{}'", env.project);
        let mut cmd = self.compose(env).await?;
        cmd.arg("build");

        let output = cmd.output().await.map_err(|e| EngineError::Build {
            diagnostic: e.to_string(),
        })?;

        if !output.status.success() {
            return Err(EngineError::Build {
                diagnostic: diagnostic(&output),
            }
            .into());
        }
        Ok(())
    }

    async fn up(&self, env: &Labfile) -> Result<()> {
        info!("🚀 Starting lab hosts for project '{}'", env.project);
        let mut cmd = self.compose(env).await?;
        cmd.args(["up", "-d"]);

        let output = cmd.output().await.map_err(|e| EngineError::Start {
            diagnostic: e.to_string(),
        })?;

        if !output.status.success() {
            return Err(EngineError::Start {
                diagnostic: diagnostic(&output),
            }
            .into());
        }
        Ok(())
    }

    async fn down(&self, env: &Labfile, remove_volumes: bool) -> Result<()> {
        info!("🛑 Stopping lab hosts for project '{}'", env.project);
        let mut cmd = self.compose(env).await?;
        cmd.args(["down", "--remove-orphans"]);
        if remove_volumes {
            cmd.arg("--volumes");
        }

        let output = cmd.output().await.map_err(|e| EngineError::Stop {
            diagnostic: e.to_string(),
        })?;

        if !output.status.success() {
            let text = diagnostic(&output);
            // Another operator may already have torn the environment down;
            // absent resources count as stopped.
            if text.contains("No such") || text.contains("not found") {
                warn!("Nothing to stop: {}", text);
                return Ok(());
            }
            return Err(EngineError::Stop { diagnostic: text }.into());
        }
        Ok(())
    }

    async fn ps(&self, env: &Labfile) -> Result<Vec<HostState>> {
        let mut cmd = self.compose(env).await?;
        cmd.args(["ps", "-a", "--format", "json"]);

        let output = cmd.output().await.map_err(|e| EngineError::Query {
            diagnostic: e.to_string(),
        })?;

        if !output.status.success() {
            return Err(EngineError::Query {
                diagnostic: diagnostic(&output),
            }
            .into());
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        let entries = parse_ps_output(&raw)?;
        Ok(states_from_entries(env, &entries))
    }

    async fn logs(
        &self,
        env: &Labfile,
        host: Option<String>,
        follow: bool,
        tail: Option<usize>,
    ) -> Result<()> {
        let mut cmd = self.compose(env).await?;
        cmd.arg("logs");
        if follow {
            cmd.arg("--follow");
        }
        if let Some(n) = tail {
            cmd.arg("--tail").arg(n.to_string());
        }
        if let Some(host) = host {
            cmd.arg(host);
        }

        let mut child = cmd.spawn().map_err(|e| EngineError::Query {
            diagnostic: e.to_string(),
        })?;

        tokio::select! {
            status = child.wait() => {
                let status = status?;
                if !status.success() {
                    return Err(EngineError::Query {
                        diagnostic: format!("log stream exited with {status}"),
                    }
                    .into());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                child.kill().await?;
                info!("Log stream interrupted");
            }
        }
        Ok(())
    }

    async fn exec_interactive(&self, env: &Labfile, host: &str, command: &[String]) -> Result<()> {
        info!("💻 Attaching to '{}' (exit the shell to detach)", host);
        let mut cmd = self.compose(env).await?;
        cmd.arg("exec").arg(host).args(command);

        let mut child = cmd.spawn().map_err(|e| EngineError::Exec {
            host: host.to_string(),
            diagnostic: e.to_string(),
        })?;

        tokio::select! {
            status = child.wait() => {
                let status = status?;
                debug!("Session in '{}' ended with {}", host, status);
            }
            _ = tokio::signal::ctrl_c() => {
                child.kill().await?;
                info!("Session in '{}' interrupted", host);
            }
        }
        Ok(())
    }

    async fn exec_capture(
        &self,
        env: &Labfile,
        host: &str,
        command: &[String],
    ) -> Result<ExecOutput> {
        let mut cmd = self.compose(env).await?;
        cmd.args(["exec", "-T", host]).args(command);

        let output = cmd.output().await.map_err(|e| EngineError::Exec {
            host: host.to_string(),
            diagnostic: e.to_string(),
        })?;

        Ok(ExecOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn prune(&self, env: &Labfile) -> Result<()> {
        info!("🗑️  Pruning unused engine resources");
        let output = Command::new("docker")
            .args(["system", "prune", "--force"])
            .output()
            .await
            .map_err(|e| EngineError::Query {
                diagnostic: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(EngineError::Query {
                diagnostic: diagnostic(&output),
            }
            .into());
        }
        debug!("Prune complete for project '{}'", env.project);
        Ok(())
    }

    async fn remove_images(&self, env: &Labfile) -> Result<()> {
        for host in env.hosts.iter().filter(|h| h.build.is_some()) {
            // Compose v2 tags built images `{project}-{service}`, v1 used
            // an underscore; try both and ignore images that never existed.
            for tag in [
                format!("{}-{}", env.project, host.name),
                format!("{}_{}", env.project, host.name),
            ] {
                let result = Command::new("docker")
                    .args(["image", "rm", "--force", &tag])
                    .output()
                    .await;

                match result {
                    Ok(output) if output.status.success() => {
                        info!("🗑️  Removed image {}", tag);
                    }
                    Ok(_) => debug!("No image tagged {}", tag),
                    Err(e) => {
                        return Err(EngineError::Query {
                            diagnostic: e.to_string(),
                        }
                        .into());
                    }
                }
            }
        }
        Ok(())
    }
}

async fn detect_compose_style() -> Result<ComposeStyle, DependencyError> {
    if binary_on_path("docker-compose").await {
        Ok(ComposeStyle::Standalone)
    } else if binary_on_path("docker").await {
        Ok(ComposeStyle::DockerPlugin)
    } else {
        Err(DependencyError::MissingTool {
            tool: "docker".to_string(),
        })
    }
}

async fn binary_on_path(binary: &str) -> bool {
    Command::new("which")
        .arg(binary)
        .output()
        .await
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Engine diagnostics, stderr first, passed through verbatim
fn diagnostic(output: &std::process::Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.trim().is_empty() {
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    } else {
        stderr.trim().to_string()
    }
}

// --- Compose file model -----------------------------------------------------

#[derive(Debug, Serialize)]
struct ComposeFile {
    services: BTreeMap<String, ComposeService>,
    networks: BTreeMap<String, ComposeNetwork>,
}

#[derive(Debug, Serialize)]
struct ComposeService {
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    build: Option<String>,
    container_name: String,
    hostname: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    volumes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cap_add: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    environment: Vec<String>,
    tty: bool,
    stdin_open: bool,
    networks: BTreeMap<String, ComposeServiceNetwork>,
}

#[derive(Debug, Serialize)]
struct ComposeServiceNetwork {
    ipv4_address: String,
}

#[derive(Debug, Serialize)]
struct ComposeNetwork {
    driver: String,
    ipam: ComposeIpam,
}

#[derive(Debug, Serialize)]
struct ComposeIpam {
    config: Vec<ComposeIpamConfig>,
}

#[derive(Debug, Serialize)]
struct ComposeIpamConfig {
    subnet: String,
}

/// Render the engine's declarative input from the environment descriptor.
/// Relative paths resolve against the Labfile directory because the rendered
/// file does not live next to the Labfile.
pub(crate) fn render_compose(env: &Labfile, config: &LabConfig) -> Result<String> {
    let network_name = env.network_name().to_string();
    let mut services = BTreeMap::new();

    for host in &env.hosts {
        let mut volumes = Vec::new();

        for mount in &env.mounts {
            let attached = mount
                .hosts
                .as_ref()
                .map(|hosts| hosts.iter().any(|h| h == &host.name))
                .unwrap_or(true);
            if attached {
                volumes.push(format!(
                    "{}:{}",
                    config.resolve_host_path(&mount.source).display(),
                    mount.target
                ));
            }
        }

        if let Some(ref extra) = host.volumes {
            for spec in extra {
                let (source, rest) = spec.split_once(':').unwrap_or((spec.as_str(), ""));
                volumes.push(format!(
                    "{}:{}",
                    config.resolve_host_path(source).display(),
                    rest
                ));
            }
        }

        let mut service_networks = BTreeMap::new();
        service_networks.insert(
            network_name.clone(),
            ComposeServiceNetwork {
                ipv4_address: host.address.to_string(),
            },
        );

        services.insert(
            host.name.clone(),
            ComposeService {
                image: host.image.clone(),
                build: host
                    .build
                    .as_ref()
                    .map(|b| config.resolve_host_path(b).display().to_string()),
                container_name: format!("{}_{}", env.project, host.name),
                hostname: host.name.clone(),
                volumes,
                cap_add: host.cap_add.clone().unwrap_or_default(),
                environment: host.environment.clone().unwrap_or_default(),
                tty: true,
                stdin_open: true,
                networks: service_networks,
            },
        );
    }

    let mut networks = BTreeMap::new();
    networks.insert(
        network_name,
        ComposeNetwork {
            driver: "bridge".to_string(),
            ipam: ComposeIpam {
                config: vec![ComposeIpamConfig {
                    subnet: env.network.cidr.clone(),
                }],
            },
        },
    );

    let file = ComposeFile { services, networks };
    Ok(serde_yaml::to_string(&file)?)
}

// --- Engine ps output -------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PsEntry {
    #[serde(rename = "Service", default)]
    service: String,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "State", default)]
    state: String,
    #[serde(rename = "Status", default)]
    status: String,
}

/// Compose v2 emits one JSON object per line; some versions emit a single
/// array. Accept both.
fn parse_ps_output(raw: &str) -> Result<Vec<PsEntry>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }
    trimmed
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(Into::into))
        .collect()
}

/// Merge engine entries into one state per declared host, declaration order
fn states_from_entries(env: &Labfile, entries: &[PsEntry]) -> Vec<HostState> {
    env.hosts
        .iter()
        .map(|host| {
            let container_name = format!("{}_{}", env.project, host.name);
            let entry = entries
                .iter()
                .find(|e| e.service == host.name || e.name == container_name);

            match entry {
                Some(e) => HostState {
                    name: host.name.clone(),
                    state: run_state(&e.state),
                    detail: if e.status.is_empty() {
                        e.state.clone()
                    } else {
                        e.status.clone()
                    },
                },
                None => HostState {
                    name: host.name.clone(),
                    state: RunState::NotCreated,
                    detail: "not created".to_string(),
                },
            }
        })
        .collect()
}

fn run_state(raw: &str) -> RunState {
    match raw {
        "running" => RunState::Running,
        "" => RunState::NotCreated,
        _ => RunState::Exited,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::create_example_labfile;
    use std::path::PathBuf;

    fn test_config() -> LabConfig {
        LabConfig {
            data_dir: PathBuf::from("/tmp/netlab-test"),
            labfile_path: PathBuf::from("/lab/Labfile.toml"),
            verbose: false,
        }
    }

    #[test]
    fn renders_static_addresses_and_subnet() {
        let env = create_example_labfile();
        let yaml = render_compose(&env, &test_config()).unwrap();

        assert!(yaml.contains("ipv4_address: 172.28.0.2"));
        assert!(yaml.contains("ipv4_address: 172.28.0.3"));
        assert!(yaml.contains("subnet: 172.28.0.0/16"));
        assert!(yaml.contains("container_name: netlab_attacker"));
        assert!(yaml.contains("container_name: netlab_target"));
        assert!(yaml.contains("cap_add"));
    }

    #[test]
    fn renders_shared_mount_resolved_against_labfile_dir() {
        let env = create_example_labfile();
        let yaml = render_compose(&env, &test_config()).unwrap();
        assert!(yaml.contains("/lab/./shared:/shared"));
    }

    #[test]
    fn parses_ndjson_ps_output() {
        let raw = concat!(
            r#"{"Service":"attacker","Name":"netlab_attacker","State":"running","Status":"Up 5 minutes"}"#,
            "\n",
            r#"{"Service":"target","Name":"netlab_target","State":"exited","Status":"Exited (0) 2 minutes ago"}"#,
        );
        let entries = parse_ps_output(raw).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].service, "attacker");
        assert_eq!(entries[1].state, "exited");
    }

    #[test]
    fn parses_array_ps_output() {
        let raw = r#"[{"Service":"attacker","Name":"netlab_attacker","State":"running","Status":"Up"}]"#;
        let entries = parse_ps_output(raw).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].state, "running");
    }

    #[test]
    fn missing_hosts_report_not_created_in_declaration_order() {
        let env = create_example_labfile();
        let entries = parse_ps_output(
            r#"{"Service":"target","Name":"netlab_target","State":"running","Status":"Up"}"#,
        )
        .unwrap();
        let states = states_from_entries(&env, &entries);

        assert_eq!(states.len(), 2);
        assert_eq!(states[0].name, "attacker");
        assert_eq!(states[0].state, RunState::NotCreated);
        assert_eq!(states[1].name, "target");
        assert_eq!(states[1].state, RunState::Running);
    }

    #[test]
    fn empty_ps_output_is_not_an_error() {
        assert!(parse_ps_output("").unwrap().is_empty());
        assert!(parse_ps_output("  \n ").unwrap().is_empty());
    }
}
