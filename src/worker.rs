//! Worker service
//!
//! Long-running node process: answers discovery probes over UDP and
//! serves task connections over TCP. Each connection is handled by its
//! own task; the number of simultaneously served connections is capped
//! by a semaphore. Assignments on one connection are processed strictly
//! in order, and the numeric work itself runs on the blocking pool so
//! it never stalls the socket handling.

use crate::compute::{self, WorkFn};
use crate::config::Config;
use crate::protocol::{self, TaskResult};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::Semaphore;

pub struct WorkerService {
    config: Arc<Config>,
    discovery_socket: UdpSocket,
    listener: TcpListener,
    work_fn: WorkFn,
}

impl WorkerService {
    /// Bind both service sockets. A bind failure (port already taken,
    /// insufficient privileges) is fatal: a worker that cannot be
    /// discovered or connected to has nothing to offer.
    pub async fn bind(config: Arc<Config>) -> Result<Self> {
        let discovery_socket = UdpSocket::bind(("0.0.0.0", config.network.discovery_port))
            .await
            .with_context(|| {
                format!(
                    "Failed to bind discovery port {}",
                    config.network.discovery_port
                )
            })?;

        let listener = TcpListener::bind(("0.0.0.0", config.network.task_port))
            .await
            .with_context(|| format!("Failed to bind task port {}", config.network.task_port))?;

        Ok(Self {
            config,
            discovery_socket,
            listener,
            work_fn: compute::square,
        })
    }

    /// Swap in a different work function (the default integrates x^2)
    pub fn with_work_fn(mut self, work_fn: WorkFn) -> Self {
        self.work_fn = work_fn;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read task listener address")
    }

    pub fn discovery_addr(&self) -> Result<SocketAddr> {
        self.discovery_socket
            .local_addr()
            .context("Failed to read discovery socket address")
    }

    /// Serve forever: discovery replies in the background, task
    /// connections in the accept loop.
    pub async fn run(self) -> Result<()> {
        let node = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());
        println!(
            "Worker ready on {} (discovery {}, tasks {})",
            node,
            self.discovery_addr()?,
            self.local_addr()?
        );

        tokio::spawn(crate::discovery::respond_to_probes(
            self.discovery_socket,
            self.config.runtime.debug,
        ));

        let limit = Arc::new(Semaphore::new(self.config.network.max_connections));

        loop {
            let permit = Arc::clone(&limit)
                .acquire_owned()
                .await
                .context("Connection limit semaphore closed")?;

            let (stream, peer) = self
                .listener
                .accept()
                .await
                .context("Failed to accept task connection")?;

            println!("Coordinator connected: {}", peer);
            let samples = self.config.workload.samples_per_task;
            let work_fn = self.work_fn;
            let debug = self.config.runtime.debug;
            tokio::spawn(async move {
                serve_connection(stream, peer, samples, work_fn, debug).await;
                drop(permit);
            });
        }
    }
}

/// Serve one coordinator connection until EOF. Malformed assignment
/// lines are logged and skipped; the connection keeps serving.
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    samples: u32,
    work_fn: WorkFn,
    debug: bool,
) {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                eprintln!("Read from {} failed: {}", peer, e);
                break;
            }
        };

        let assignment = match protocol::parse_assignment(&line) {
            Ok(assignment) => assignment,
            Err(e) => {
                eprintln!("Ignoring malformed assignment from {}: {} ({:?})", peer, e, line);
                continue;
            }
        };

        if debug {
            eprintln!(
                "DEBUG: Computing task {} over [{}, {})",
                assignment.task_id, assignment.left, assignment.right
            );
        }

        let (left, right) = (assignment.left, assignment.right);
        let value = match tokio::task::spawn_blocking(move || {
            compute::integrate(work_fn, left, right, samples)
        })
        .await
        {
            Ok(value) => value,
            Err(e) => {
                eprintln!("Work function panicked for task {}: {}", assignment.task_id, e);
                break;
            }
        };

        let result = TaskResult {
            task_id: assignment.task_id,
            value,
        };
        let reply = format!("{}\n", result);
        if let Err(e) = write_half.write_all(reply.as_bytes()).await {
            eprintln!("Write to {} failed: {}", peer, e);
            break;
        }
    }

    println!("Coordinator disconnected: {}", peer);
}
