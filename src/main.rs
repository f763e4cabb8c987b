//! GridPulse - Minimal master/worker compute-distribution engine

use anyhow::{Context, Result};
use gridpulse::config::cli::{Cli, ExecutionMode};
use gridpulse::config::{self, Config};
use gridpulse::{discovery, Coordinator, WorkerService};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::process::{Child, Command};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn main() {
    let cli = Cli::parse_args();

    if let Err(e) = cli.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let config = match load_config(&cli) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    println!("GridPulse v{}", env!("CARGO_PKG_VERSION"));

    let outcome = match cli.mode {
        ExecutionMode::Standalone => run_standalone(&config),
        ExecutionMode::Coordinator => run_coordinator(&cli, &config),
        ExecutionMode::Worker => run_worker(&config),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Layer the configuration sources: file (if given), then CLI overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let base = match &cli.config {
        Some(path) => config::parse_toml_file(path)?,
        None => Config::default(),
    };

    let merged = config::merge_cli_with_config(cli, base);
    config::validate_config(&merged)?;
    Ok(merged)
}

/// Coordinator mode: resolve worker endpoints (explicit list, clients
/// file, or UDP discovery), then drive the run.
fn run_coordinator(cli: &Cli, config: &Arc<Config>) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    let config = Arc::clone(config);

    runtime.block_on(async move {
        let endpoints = resolve_endpoints(cli, &config).await?;
        execute_run(config, endpoints).await
    })
}

/// Worker mode: bind the service sockets and serve until killed
fn run_worker(config: &Arc<Config>) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    let config = Arc::clone(config);

    runtime.block_on(async move {
        let service = WorkerService::bind(config).await?;
        service.run().await
    })
}

/// Standalone mode: launch a local worker as a child process, run the
/// coordinator against it over loopback, then tear the worker down.
fn run_standalone(config: &Arc<Config>) -> Result<()> {
    println!("Launching local worker...");
    let mut worker = launch_local_worker(config)?;

    // Give the child a moment to bind its sockets
    std::thread::sleep(Duration::from_millis(500));

    let endpoint = SocketAddr::from(([127, 0, 0, 1], config.network.task_port));
    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime");

    let outcome = match runtime {
        Ok(runtime) => {
            let config = Arc::clone(config);
            runtime.block_on(execute_run(config, vec![endpoint]))
        }
        Err(e) => Err(e),
    };

    cleanup_local_worker(&mut worker);
    outcome
}

async fn execute_run(config: Arc<Config>, endpoints: Vec<SocketAddr>) -> Result<()> {
    let coordinator = Coordinator::new(Arc::clone(&config), endpoints)?;
    let started = Instant::now();
    let total = coordinator.run().await?;
    print_summary(&config, total, started.elapsed())
}

async fn resolve_endpoints(cli: &Cli, config: &Config) -> Result<Vec<SocketAddr>> {
    if let Some(list) = &cli.host_list {
        return parse_host_list(list, config.network.task_port);
    }

    if let Some(path) = &cli.clients_file {
        return parse_clients_file(path, config.network.task_port);
    }

    println!(
        "Discovering workers ({} attempts on port {})...",
        config.network.discovery_attempts, config.network.discovery_port
    );
    discovery::discover_workers(&config.network, config.runtime.debug).await
}

/// Parse a comma-separated list of worker addresses. Entries without a
/// port get the configured task port.
fn parse_host_list(list: &str, default_port: u16) -> Result<Vec<SocketAddr>> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| parse_endpoint(entry, default_port))
        .collect()
}

/// Parse a clients file: one worker address per line, blank lines and
/// '#' comments skipped.
fn parse_clients_file(path: &Path, default_port: u16) -> Result<Vec<SocketAddr>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read clients file: {}", path.display()))?;

    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| parse_endpoint(line, default_port))
        .collect()
}

fn parse_endpoint(entry: &str, default_port: u16) -> Result<SocketAddr> {
    let candidate = if entry.contains(':') {
        entry.to_string()
    } else {
        format!("{}:{}", entry, default_port)
    };

    candidate
        .to_socket_addrs()
        .with_context(|| format!("Failed to resolve worker address: {}", entry))?
        .next()
        .with_context(|| format!("Worker address resolved to nothing: {}", entry))
}

fn print_summary(config: &Config, total: f64, elapsed: Duration) -> Result<()> {
    if config.runtime.json {
        let summary = serde_json::json!({
            "range_start": config.workload.range_start,
            "range_end": config.workload.range_end,
            "tasks": config.workload.num_tasks,
            "samples_per_task": config.workload.samples_per_task,
            "total": total,
            "elapsed_ms": elapsed.as_millis() as u64,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?
        );
    } else {
        println!();
        println!("=== Run Summary ===");
        println!(
            "Range:   [{}, {})",
            config.workload.range_start, config.workload.range_end
        );
        println!("Tasks:   {}", config.workload.num_tasks);
        println!("Total:   {}", total);
        println!("Elapsed: {:.2?}", elapsed);
    }

    Ok(())
}

fn launch_local_worker(config: &Config) -> Result<Child> {
    let exe = std::env::current_exe().context("Failed to locate current executable")?;

    Command::new(exe)
        .arg("--mode")
        .arg("worker")
        .arg("--discovery-port")
        .arg(config.network.discovery_port.to_string())
        .arg("--task-port")
        .arg(config.network.task_port.to_string())
        .arg("--samples")
        .arg(config.workload.samples_per_task.to_string())
        .spawn()
        .context("Failed to launch local worker process")
}

fn cleanup_local_worker(worker: &mut Child) {
    if let Err(e) = worker.kill() {
        eprintln!("Failed to stop local worker: {}", e);
    }
    let _ = worker.wait();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_host_list_appends_default_port() {
        let endpoints = parse_host_list("10.0.1.10:9000, 10.0.1.11", 9999).unwrap();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].port(), 9000);
        assert_eq!(endpoints[1].port(), 9999);
    }

    #[test]
    fn test_parse_host_list_rejects_garbage() {
        assert!(parse_host_list("not an address at all!", 9999).is_err());
    }

    #[test]
    fn test_parse_clients_file_skips_comments() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# fleet workers").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "10.0.1.10").unwrap();
        writeln!(file, "10.0.1.11:9001").unwrap();
        file.flush().unwrap();

        let endpoints = parse_clients_file(file.path(), 9999).unwrap();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].port(), 9999);
        assert_eq!(endpoints[1].port(), 9001);
    }
}
