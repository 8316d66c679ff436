use clap::{Parser, Subcommand};
use netlab::Verb;

#[derive(Parser)]
#[command(name = "netlab")]
#[command(about = "Lifecycle manager for containerized network-security training labs")]
#[command(version, long_about = None)]
pub struct Cli {
    /// Lifecycle verb; `start` when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Environment descriptor path
    #[arg(short, long, default_value = "Labfile.toml")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build images, start hosts, probe connectivity and report
    Start,

    /// Stop hosts, keep volumes
    Stop,

    /// Tear down and start the environment again
    Restart,

    /// Show host states
    Status,

    /// Follow engine logs
    Logs {
        /// Restrict output to one host
        host: Option<String>,

        /// Number of lines to show from the end of the logs
        #[arg(short, long)]
        tail: Option<usize>,
    },

    /// Open an interactive shell inside a host
    Connect {
        /// Declared host name
        host: String,
    },

    /// Probe connectivity between all host pairs
    Test,

    /// Remove containers, volumes and the images built for this lab
    Cleanup,
}

impl Commands {
    pub fn into_verb(self) -> Verb {
        match self {
            Commands::Start => Verb::Start,
            Commands::Stop => Verb::Stop,
            Commands::Restart => Verb::Restart,
            Commands::Status => Verb::Status,
            Commands::Logs { host, tail } => Verb::Logs {
                host,
                follow: true,
                tail,
            },
            Commands::Connect { host } => Verb::Connect { host },
            Commands::Test => Verb::Test,
            Commands::Cleanup => Verb::Cleanup,
        }
    }
}
