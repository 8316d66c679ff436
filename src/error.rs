use thiserror::Error;

/// Netlab-specific error types for better error handling
#[derive(Error, Debug)]
pub enum LabError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dependency error: {0}")]
    Dependency(#[from] DependencyError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Generic error: {0}")]
    Other(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Labfile not found at path: {path}")]
    LabfileNotFound { path: String },

    #[error("Invalid Labfile format: {reason}")]
    InvalidFormat { reason: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid network CIDR '{cidr}': {reason}")]
    InvalidCidr { cidr: String, reason: String },

    #[error("Host '{host}' address {address} is outside network {cidr}")]
    AddressOutsideNetwork {
        host: String,
        address: String,
        cidr: String,
    },

    #[error("Duplicate host name: {name}")]
    DuplicateHost { name: String },

    #[error("Address {address} is declared by both '{first}' and '{second}'")]
    DuplicateAddress {
        address: String,
        first: String,
        second: String,
    },

    #[error("Unknown host: {name}")]
    UnknownHost { name: String },
}

#[derive(Error, Debug)]
pub enum DependencyError {
    #[error("required tool '{tool}' not found on PATH")]
    MissingTool { tool: String },
}

/// Engine-reported failures. Diagnostics are passed through verbatim so the
/// operator sees exactly what the engine said.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("build failed: {diagnostic}")]
    Build { diagnostic: String },

    #[error("start failed: {diagnostic}")]
    Start { diagnostic: String },

    #[error("stop failed: {diagnostic}")]
    Stop { diagnostic: String },

    #[error("engine query failed: {diagnostic}")]
    Query { diagnostic: String },

    #[error("exec in '{host}' failed: {diagnostic}")]
    Exec { host: String, diagnostic: String },
}

/// Convenience type alias for netlab results
pub type Result<T, E = LabError> = std::result::Result<T, E>;
