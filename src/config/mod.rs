use crate::error::{ConfigError, Result};
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Declarative environment descriptor for one lab session.
///
/// Loaded once at startup, validated, and passed explicitly to every
/// component. Nothing mutates it after load.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Labfile {
    pub project: String,
    pub network: Network,
    /// Declared hosts; declaration order is significant (probing and
    /// reporting follow it).
    pub hosts: Vec<Host>,
    #[serde(default)]
    pub mounts: Vec<SharedMount>,
    #[serde(default)]
    pub startup: StartupConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Network {
    /// Engine-visible network name. Defaults to "labnet".
    pub name: Option<String>,
    /// CIDR block every host address must fall within
    pub cidr: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Host {
    pub name: String,
    pub address: Ipv4Addr,
    pub image: Option<String>,
    /// Build context path, relative to the Labfile
    pub build: Option<String>,
    pub volumes: Option<Vec<String>>,
    pub cap_add: Option<Vec<String>>,
    pub environment: Option<Vec<String>>,
}

impl Host {
    pub fn with_image(name: impl Into<String>, address: Ipv4Addr, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address,
            image: Some(image.into()),
            build: None,
            volumes: None,
            cap_add: None,
            environment: None,
        }
    }

    pub fn with_build(name: impl Into<String>, address: Ipv4Addr, context: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address,
            image: None,
            build: Some(context.into()),
            volumes: None,
            cap_add: None,
            environment: None,
        }
    }
}

/// Directory bind-mounted into lab hosts. The host path is created before
/// container start if it does not exist.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SharedMount {
    pub source: String,
    pub target: String,
    /// Hosts the mount is attached to; all of them when omitted
    pub hosts: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StartupConfig {
    /// Extra pause after all hosts report running
    pub settle_secs: Option<u64>,
    /// Upper bound on the post-start readiness poll
    pub ready_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProbeConfig {
    /// Echo requests per host pair
    pub count: Option<u32>,
    /// Per-request timeout in seconds
    pub timeout_secs: Option<u64>,
}

impl StartupConfig {
    pub fn settle_secs(&self) -> u64 {
        self.settle_secs.unwrap_or(2)
    }

    pub fn ready_timeout_secs(&self) -> u64 {
        self.ready_timeout_secs.unwrap_or(30)
    }
}

impl ProbeConfig {
    pub fn count(&self) -> u32 {
        self.count.unwrap_or(3)
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(2)
    }
}

impl Labfile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(&path).map_err(|_| ConfigError::LabfileNotFound {
                path: path.as_ref().display().to_string(),
            })?;

        let labfile: Labfile = toml::from_str(&content).map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
        })?;

        labfile.validate()?;

        Ok(labfile)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.validate()?;
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Engine-visible network name
    pub fn network_name(&self) -> &str {
        self.network.name.as_deref().unwrap_or("labnet")
    }

    pub fn host(&self, name: &str) -> Option<&Host> {
        self.hosts.iter().find(|h| h.name == name)
    }

    /// Parsed network block. Validation guarantees this succeeds after load.
    pub fn subnet(&self) -> Result<Ipv4Net, ConfigError> {
        self.network
            .cidr
            .parse::<Ipv4Net>()
            .map_err(|e| ConfigError::InvalidCidr {
                cidr: self.network.cidr.clone(),
                reason: e.to_string(),
            })
    }

    /// Validate the descriptor: at least one host, unique names, unique
    /// addresses, valid CIDR containing every address, well-formed specs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        debug!("🔍 Validating Labfile for project '{}'", self.project);

        if self.project.is_empty() {
            return Err(ConfigError::MissingField {
                field: "project".to_string(),
            });
        }

        if self.project.contains(' ') {
            return Err(ConfigError::InvalidFormat {
                reason: format!("project name cannot contain spaces: '{}'", self.project),
            });
        }

        if self.hosts.is_empty() {
            return Err(ConfigError::MissingField {
                field: "hosts".to_string(),
            });
        }

        let subnet = self.subnet()?;

        let mut names = HashSet::new();
        let mut addresses: Vec<(&Ipv4Addr, &str)> = Vec::new();

        for host in &self.hosts {
            if host.name.is_empty() {
                return Err(ConfigError::MissingField {
                    field: "hosts.name".to_string(),
                });
            }

            if host.name.contains(' ') {
                return Err(ConfigError::InvalidFormat {
                    reason: format!("host name cannot contain spaces: '{}'", host.name),
                });
            }

            if !names.insert(host.name.as_str()) {
                return Err(ConfigError::DuplicateHost {
                    name: host.name.clone(),
                });
            }

            if let Some((_, first)) = addresses.iter().find(|(a, _)| **a == host.address) {
                return Err(ConfigError::DuplicateAddress {
                    address: host.address.to_string(),
                    first: first.to_string(),
                    second: host.name.clone(),
                });
            }
            addresses.push((&host.address, host.name.as_str()));

            if !subnet.contains(&host.address) {
                return Err(ConfigError::AddressOutsideNetwork {
                    host: host.name.clone(),
                    address: host.address.to_string(),
                    cidr: self.network.cidr.clone(),
                });
            }

            // Exactly one of image / build
            match (&host.image, &host.build) {
                (None, None) => {
                    return Err(ConfigError::InvalidFormat {
                        reason: format!("host '{}' must specify 'image' or 'build'", host.name),
                    });
                }
                (Some(_), Some(_)) => {
                    return Err(ConfigError::InvalidFormat {
                        reason: format!(
                            "host '{}' can only specify one of 'image' or 'build'",
                            host.name
                        ),
                    });
                }
                _ => {}
            }

            if let Some(ref volumes) = host.volumes {
                validate_volume_specs(&host.name, volumes)?;
            }
        }

        for mount in &self.mounts {
            if mount.source.is_empty() || mount.target.is_empty() {
                return Err(ConfigError::InvalidFormat {
                    reason: "mount source and target cannot be empty".to_string(),
                });
            }
            if let Some(ref attached) = mount.hosts {
                for name in attached {
                    if !names.contains(name.as_str()) {
                        return Err(ConfigError::UnknownHost { name: name.clone() });
                    }
                }
            }
        }

        debug!("✅ Labfile validation passed");
        Ok(())
    }
}

fn validate_volume_specs(host: &str, volumes: &[String]) -> Result<(), ConfigError> {
    for volume in volumes {
        let parts: Vec<&str> = volume.split(':').collect();
        if parts.len() < 2 || parts.len() > 3 || parts[0].is_empty() || parts[1].is_empty() {
            return Err(ConfigError::InvalidFormat {
                reason: format!("host '{}': invalid volume mapping '{}'", host, volume),
            });
        }
    }
    Ok(())
}

/// Runtime configuration (paths, verbosity) for lab operations
#[derive(Debug, Clone, Default)]
pub struct LabConfig {
    pub data_dir: PathBuf,
    pub labfile_path: PathBuf,
    pub verbose: bool,
}

impl LabConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("netlab");

        let labfile_path = std::env::current_dir()
            .unwrap_or_default()
            .join("Labfile.toml");

        Ok(Self {
            data_dir,
            labfile_path,
            verbose: false,
        })
    }

    /// Load the Labfile from the configured path
    pub fn load_labfile(&self) -> Result<Labfile, ConfigError> {
        Labfile::load(&self.labfile_path)
    }

    /// Directory the Labfile lives in; relative paths in the descriptor
    /// resolve against it.
    pub fn labfile_dir(&self) -> PathBuf {
        self.labfile_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn resolve_host_path(&self, raw: &str) -> PathBuf {
        let path = Path::new(raw);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.labfile_dir().join(path)
        }
    }

    /// Location of the rendered compose file for a project
    pub fn compose_path(&self, project: &str) -> PathBuf {
        self.data_dir.join(format!("{project}-compose.yaml"))
    }
}

/// Canonical two-host training topology: an attacker and a target on a
/// private /16, with a shared drop directory.
pub fn create_example_labfile() -> Labfile {
    let mut attacker = Host::with_build("attacker", Ipv4Addr::new(172, 28, 0, 2), "./attacker");
    attacker.cap_add = Some(vec!["NET_ADMIN".to_string()]);

    let mut target = Host::with_build("target", Ipv4Addr::new(172, 28, 0, 3), "./target");
    target.cap_add = Some(vec!["NET_ADMIN".to_string()]);

    let hosts = vec![attacker, target];

    info!("📦 Generated example Labfile with {} hosts", hosts.len());

    Labfile {
        project: "netlab".to_string(),
        network: Network {
            name: Some("labnet".to_string()),
            cidr: "172.28.0.0/16".to_string(),
        },
        hosts,
        mounts: vec![SharedMount {
            source: "./shared".to_string(),
            target: "/shared".to_string(),
            hosts: None,
        }],
        startup: StartupConfig::default(),
        probe: ProbeConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_labfile_is_valid() {
        let labfile = create_example_labfile();
        assert!(labfile.validate().is_ok());
        assert_eq!(labfile.hosts.len(), 2);
        assert_eq!(labfile.network_name(), "labnet");
    }

    #[test]
    fn relative_paths_resolve_against_labfile_dir() {
        let config = LabConfig {
            data_dir: PathBuf::from("/tmp/netlab"),
            labfile_path: PathBuf::from("/lab/Labfile.toml"),
            verbose: false,
        };
        assert_eq!(
            config.resolve_host_path("./shared"),
            PathBuf::from("/lab/./shared")
        );
        assert_eq!(config.resolve_host_path("/abs"), PathBuf::from("/abs"));
    }
}
