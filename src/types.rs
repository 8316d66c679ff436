/// Runtime state of a declared host, as reported by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Running,
    Exited,
    NotCreated,
}

impl RunState {
    pub fn is_running(&self) -> bool {
        matches!(self, RunState::Running)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Running => write!(f, "running"),
            RunState::Exited => write!(f, "exited"),
            RunState::NotCreated => write!(f, "not created"),
        }
    }
}

/// Host state snapshot, one per declared host, in declaration order
#[derive(Debug, Clone)]
pub struct HostState {
    pub name: String,
    pub state: RunState,
    /// Raw engine status text ("Up 3 minutes", "Exited (0) ...")
    pub detail: String,
}

/// Outcome of a single reachability probe between two declared hosts
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub source: String,
    pub destination: String,
    pub success: bool,
    /// Latency summary on success, failure reason otherwise
    pub detail: String,
}

/// Captured output of a non-interactive exec inside a host
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}
