//! CLI argument parsing using clap

use clap::{Parser, ValueEnum};
use std::net::Ipv4Addr;
use std::path::PathBuf;

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutionMode {
    /// Standalone mode (default) - auto-launch a local worker and run against it
    Standalone,
    /// Coordinator mode - discover workers, dispatch tasks, aggregate the result
    Coordinator,
    /// Worker mode - long-lived daemon answering probes and serving tasks
    Worker,
}

/// GridPulse - Minimal master/worker compute-distribution engine
#[derive(Parser, Debug)]
#[command(name = "gridpulse")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Execution mode: standalone, coordinator, or worker
    #[arg(long, value_enum, default_value = "standalone")]
    pub mode: ExecutionMode,

    /// TOML configuration file (CLI flags take precedence)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Comma-separated worker addresses, skipping discovery
    /// (e.g., "10.0.1.10:9999,10.0.1.11")
    #[arg(long)]
    pub host_list: Option<String>,

    /// File with one worker address per line ('#' starts a comment),
    /// skipping discovery
    #[arg(long)]
    pub clients_file: Option<PathBuf>,

    // === Workload Options ===
    /// Left edge of the workload range (inclusive)
    #[arg(long)]
    pub range_start: Option<f64>,

    /// Right edge of the workload range (exclusive)
    #[arg(long)]
    pub range_end: Option<f64>,

    /// Number of subtasks to partition the range into
    #[arg(short = 'n', long)]
    pub tasks: Option<usize>,

    /// Trapezoid count per subtask in the work function
    #[arg(long)]
    pub samples: Option<u32>,

    // === Network Options ===
    /// UDP port for worker discovery
    #[arg(long)]
    pub discovery_port: Option<u16>,

    /// TCP port for task dispatch
    #[arg(long)]
    pub task_port: Option<u16>,

    /// Address discovery probes are broadcast to
    #[arg(long)]
    pub broadcast_addr: Option<Ipv4Addr>,

    /// Number of discovery receive attempts
    #[arg(long)]
    pub discovery_attempts: Option<u32>,

    /// Cap on concurrently served task connections (worker mode)
    #[arg(long)]
    pub max_connections: Option<usize>,

    // === Output Options ===
    /// Emit the final summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Print operational detail to stderr
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Parse CLI arguments from the process environment
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Cross-flag validation that clap cannot express
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.host_list.is_some() && self.clients_file.is_some() {
            anyhow::bail!("--host-list and --clients-file are mutually exclusive");
        }

        // Standalone always runs against its own loopback worker, so an
        // explicit worker list would be silently ignored there too
        if self.mode != ExecutionMode::Coordinator
            && (self.host_list.is_some() || self.clients_file.is_some())
        {
            anyhow::bail!("--host-list/--clients-file only apply to coordinator mode");
        }

        Ok(())
    }
}
