use crate::config::{LabConfig, Labfile};
use crate::engine::ContainerEngine;
use crate::error::{ConfigError, Result};
use crate::types::{HostState, ProbeResult};
use crate::{probe, report};
use std::time::Duration;
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// One lifecycle request, parsed from the CLI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verb {
    Start,
    Stop,
    Restart,
    Status,
    Logs {
        host: Option<String>,
        follow: bool,
        tail: Option<usize>,
    },
    Connect {
        host: String,
    },
    Test,
    Cleanup,
}

/// A single typed operation in a verb's plan. Plans are explicit ordered
/// lists so step sequencing is testable without the real engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    CheckDependencies,
    EnsureMounts,
    WriteReference,
    Build,
    Up,
    AwaitReady,
    Probe,
    Report,
    Ps,
    Down {
        remove_volumes: bool,
    },
    Prune,
    RemoveImages,
    Logs {
        host: Option<String>,
        follow: bool,
        tail: Option<usize>,
    },
    Exec {
        host: String,
    },
}

/// Map a verb to its ordered step sequence
pub fn plan(verb: &Verb) -> Vec<Step> {
    match verb {
        Verb::Start => vec![
            Step::CheckDependencies,
            Step::EnsureMounts,
            Step::WriteReference,
            Step::Build,
            Step::Up,
            Step::AwaitReady,
            Step::Probe,
            Step::Report,
        ],
        Verb::Stop => vec![Step::Down {
            remove_volumes: false,
        }],
        Verb::Restart => vec![
            Step::CheckDependencies,
            Step::Down {
                remove_volumes: false,
            },
            Step::Build,
            Step::Up,
            Step::AwaitReady,
            Step::Probe,
            Step::Report,
        ],
        Verb::Status => vec![Step::Ps, Step::Report],
        Verb::Logs { host, follow, tail } => vec![Step::Logs {
            host: host.clone(),
            follow: *follow,
            tail: *tail,
        }],
        Verb::Connect { host } => vec![Step::Exec { host: host.clone() }],
        Verb::Test => vec![Step::Probe, Step::Report],
        Verb::Cleanup => vec![
            Step::Down {
                remove_volumes: true,
            },
            Step::Prune,
            Step::RemoveImages,
        ],
    }
}

/// State threaded between steps within a single verb run
#[derive(Default)]
struct RunContext {
    states: Option<Vec<HostState>>,
    probes: Vec<ProbeResult>,
}

/// Drives a verb's plan against an injected engine. Fatal errors abort the
/// remaining steps and leave the engine's state as-is; probe and report
/// failures only degrade the final output.
pub struct Controller<'a> {
    env: &'a Labfile,
    config: &'a LabConfig,
    engine: &'a dyn ContainerEngine,
}

impl<'a> Controller<'a> {
    pub fn new(env: &'a Labfile, config: &'a LabConfig, engine: &'a dyn ContainerEngine) -> Self {
        Self {
            env,
            config,
            engine,
        }
    }

    pub async fn execute(&self, verb: &Verb) -> Result<()> {
        let steps = plan(verb);
        debug!("Executing {:?} as {} steps", verb, steps.len());

        let mut cx = RunContext::default();
        for step in &steps {
            self.run_step(step, &mut cx).await?;
        }
        Ok(())
    }

    async fn run_step(&self, step: &Step, cx: &mut RunContext) -> Result<()> {
        debug!("Step: {:?}", step);
        match step {
            Step::CheckDependencies => self.engine.ensure_available().await,

            Step::EnsureMounts => {
                for mount in &self.env.mounts {
                    let dir = self.config.resolve_host_path(&mount.source);
                    if !dir.exists() {
                        std::fs::create_dir_all(&dir)?;
                        info!("📁 Created shared directory {:?}", dir);
                    }
                }
                Ok(())
            }

            Step::WriteReference => {
                if let Err(e) = report::write_reference(self.env, self.config) {
                    warn!("Could not write reference document: {}", e);
                }
                Ok(())
            }

            Step::Build => self.engine.build(self.env).await,

            Step::Up => self.engine.up(self.env).await,

            Step::AwaitReady => {
                cx.states = Some(self.await_ready().await?);
                Ok(())
            }

            Step::Probe => {
                if cx.states.is_none() {
                    cx.states = Some(self.engine.ps(self.env).await?);
                }
                let states = cx.states.as_deref().unwrap_or(&[]);
                let probes = probe::run_probes(self.env, self.engine, states).await;

                let failed = probes.iter().filter(|p| !p.success).count();
                if failed > 0 {
                    warn!("⚠️  {} of {} probes failed", failed, probes.len());
                } else {
                    info!("✅ All {} probes succeeded", probes.len());
                }
                cx.probes = probes;
                Ok(())
            }

            Step::Report => {
                if cx.states.is_none() {
                    cx.states = Some(self.engine.ps(self.env).await?);
                }
                let states = cx.states.as_deref().unwrap_or(&[]);
                let stdout = std::io::stdout();
                if let Err(e) = report::render(&mut stdout.lock(), self.env, states, &cx.probes) {
                    warn!("Could not write report: {}", e);
                }
                Ok(())
            }

            Step::Ps => {
                cx.states = Some(self.engine.ps(self.env).await?);
                Ok(())
            }

            Step::Down { remove_volumes } => self.engine.down(self.env, *remove_volumes).await,

            Step::Prune => self.engine.prune(self.env).await,

            Step::RemoveImages => self.engine.remove_images(self.env).await,

            Step::Logs { host, follow, tail } => {
                self.engine
                    .logs(self.env, host.clone(), *follow, *tail)
                    .await
            }

            Step::Exec { host } => {
                if self.env.host(host).is_none() {
                    return Err(ConfigError::UnknownHost { name: host.clone() }.into());
                }
                let shell = vec!["/bin/bash".to_string()];
                self.engine.exec_interactive(self.env, host, &shell).await
            }
        }
    }

    /// Poll the engine until every host reports running, bounded by the
    /// descriptor's ready timeout, then honor the settle delay. Hosts that
    /// never come up are left for the probe step to report.
    async fn await_ready(&self) -> Result<Vec<HostState>> {
        let timeout = Duration::from_secs(self.env.startup.ready_timeout_secs());
        let deadline = tokio::time::Instant::now() + timeout;

        let mut states = self.engine.ps(self.env).await?;
        while !states.iter().all(|s| s.state.is_running()) {
            if tokio::time::Instant::now() >= deadline {
                let waiting: Vec<&str> = states
                    .iter()
                    .filter(|s| !s.state.is_running())
                    .map(|s| s.name.as_str())
                    .collect();
                warn!("⚠️  Hosts not running after {:?}: {:?}", timeout, waiting);
                break;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
            states = self.engine.ps(self.env).await?;
        }

        let settle = self.env.startup.settle_secs();
        if settle > 0 {
            debug!("Settling for {}s", settle);
            tokio::time::sleep(Duration::from_secs(settle)).await;
        }

        Ok(states)
    }
}
