//! Coordinator
//!
//! Owns the task table and the worker registry for the whole run. All
//! mutation happens on the dispatch loop; per-connection reader tasks
//! only forward events over a channel, so no state is shared under a
//! lock. Each worker holds one persistent connection that serves many
//! assignments in sequence.

use crate::config::Config;
use crate::protocol::{self, TaskAssignment};
use crate::registry::WorkerRegistry;
use crate::task::TaskTable;
use anyhow::Result;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Events forwarded from per-connection reader tasks to the dispatch loop.
///
/// Each event carries the generation of the connection it came from. A
/// reader task outlives its connection's teardown by a little, so a
/// late `Disconnected` from a replaced connection must not tear down the
/// replacement; the dispatch loop drops any event whose generation is
/// not the worker's current one.
#[derive(Debug)]
enum WorkerEvent {
    /// A line arrived on the worker's connection
    Line {
        worker: usize,
        generation: u64,
        line: String,
    },
    /// The connection reached EOF or failed
    Disconnected { worker: usize, generation: u64 },
}

pub struct Coordinator {
    config: Arc<Config>,
    tasks: TaskTable,
    registry: WorkerRegistry,
    /// Write halves of live connections, keyed by registry index. A
    /// worker's writer is only ever touched by the dispatch loop.
    writers: HashMap<usize, OwnedWriteHalf>,
    /// Connection generation per worker, bumped on every connect and
    /// disconnect. Events matching an older generation are stale.
    generations: Vec<u64>,
}

impl Coordinator {
    /// Build a coordinator over a set of discovered worker endpoints.
    /// An empty set is an immediate error: with nobody to dispatch to,
    /// the run could never finish.
    pub fn new(config: Arc<Config>, endpoints: Vec<SocketAddr>) -> Result<Self> {
        if endpoints.is_empty() {
            anyhow::bail!("No workers available");
        }

        let mut registry = WorkerRegistry::new();
        for endpoint in endpoints {
            registry.register(endpoint);
        }

        let tasks = TaskTable::partition(
            config.workload.range_start,
            config.workload.range_end,
            config.workload.num_tasks,
        );

        let generations = vec![0; registry.len()];

        Ok(Self {
            config,
            tasks,
            registry,
            writers: HashMap::new(),
            generations,
        })
    }

    /// Drive the run to completion and return the aggregated total.
    ///
    /// Structure: a connect pass over every unconnected worker, then a
    /// bounded wait on the event channel. The wait doubles as the retry
    /// clock: when it elapses without an event, the next iteration
    /// simply attempts reconnection again.
    pub async fn run(mut self) -> Result<f64> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let retry_interval = Duration::from_millis(self.config.network.retry_interval_ms);

        while self.tasks.remaining() > 0 {
            self.connect_pass(&tx).await;

            match timeout(retry_interval, rx.recv()).await {
                Ok(Some(WorkerEvent::Line {
                    worker,
                    generation,
                    line,
                })) => {
                    if generation == self.generations[worker] {
                        self.handle_line(worker, &line).await;
                    }
                }
                Ok(Some(WorkerEvent::Disconnected { worker, generation })) => {
                    if generation == self.generations[worker] {
                        self.disconnect(worker);
                    }
                }
                // `tx` is held by this loop, so the channel cannot close;
                // a timeout just triggers the next reconnect pass.
                Ok(None) | Err(_) => {}
            }
        }

        println!("All {} tasks complete", self.tasks.len());
        Ok(self.tasks.aggregate())
    }

    /// Try to (re)connect every worker that has no live connection.
    /// On success the worker immediately gets its first assignment.
    async fn connect_pass(&mut self, tx: &mpsc::UnboundedSender<WorkerEvent>) {
        let connect_timeout = Duration::from_millis(self.config.network.connect_timeout_ms);

        for worker in self.registry.unconnected() {
            let endpoint = self.registry.endpoint(worker);

            let stream = match timeout(connect_timeout, TcpStream::connect(endpoint)).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => {
                    if self.config.runtime.debug {
                        eprintln!("DEBUG: Connect to {} failed: {}", endpoint, e);
                    }
                    continue;
                }
                Err(_) => {
                    if self.config.runtime.debug {
                        eprintln!("DEBUG: Connect to {} timed out", endpoint);
                    }
                    continue;
                }
            };

            println!("Connected to worker {}", endpoint);
            let (read_half, write_half) = stream.into_split();
            self.generations[worker] += 1;
            tokio::spawn(forward_lines(
                read_half,
                worker,
                self.generations[worker],
                tx.clone(),
            ));

            self.registry.mark_connected(worker);
            self.writers.insert(worker, write_half);
            self.assign_next(worker).await;
        }
    }

    /// Handle a line received from a worker: record the result and hand
    /// the worker its next assignment. Malformed payloads are logged and
    /// dropped; the connection stays up.
    async fn handle_line(&mut self, worker: usize, line: &str) {
        let result = match protocol::parse_result(line) {
            Ok(result) => result,
            Err(e) => {
                eprintln!(
                    "Ignoring malformed result from {}: {} ({:?})",
                    self.registry.endpoint(worker),
                    e,
                    line
                );
                // A garbled line still means the worker is alive and
                // idle; hand it the next assignable task rather than
                // leaving it stranded with nothing to do.
                self.registry.set_in_flight(worker, None);
                if self.tasks.remaining() > 0 {
                    self.assign_next(worker).await;
                }
                return;
            }
        };

        // Duplicate deliveries (a task handed to two workers after a
        // reconnect) only credit completion once.
        let first_credit = self.tasks.record_result(result.task_id, result.value);
        self.registry.set_in_flight(worker, None);

        if self.config.runtime.debug {
            eprintln!(
                "DEBUG: Task {} = {} from {} ({} remaining{})",
                result.task_id,
                result.value,
                self.registry.endpoint(worker),
                self.tasks.remaining(),
                if first_credit { "" } else { ", duplicate" },
            );
        }

        if self.tasks.remaining() > 0 {
            self.assign_next(worker).await;
        }
    }

    /// Send the lowest-id assignable task to `worker`. A write failure
    /// is treated exactly like a disconnect.
    async fn assign_next(&mut self, worker: usize) {
        let task_id = match self.tasks.next_assignable() {
            Some(id) => id,
            None => return,
        };

        let (left, right) = match self.tasks.get(task_id) {
            Some(task) => (task.left, task.right),
            None => return,
        };
        let assignment = TaskAssignment {
            task_id,
            left,
            right,
        };
        let line = format!("{}\n", assignment);

        let writer = match self.writers.get_mut(&worker) {
            Some(writer) => writer,
            None => return,
        };

        match writer.write_all(line.as_bytes()).await {
            Ok(()) => {
                self.tasks.mark_in_flight(task_id);
                self.registry.set_in_flight(worker, Some(task_id));
                if self.config.runtime.debug {
                    eprintln!(
                        "DEBUG: Assigned task {} [{}, {}) to {}",
                        task_id,
                        left,
                        right,
                        self.registry.endpoint(worker)
                    );
                }
            }
            Err(e) => {
                eprintln!(
                    "Write to worker {} failed: {}",
                    self.registry.endpoint(worker),
                    e
                );
                self.disconnect(worker);
            }
        }
    }

    /// Tear down a worker's connection. Its in-flight task keeps its
    /// state; the selection fallback re-dispatches it elsewhere. Bumping
    /// the generation here invalidates any event the old reader task has
    /// yet to deliver.
    fn disconnect(&mut self, worker: usize) {
        if self.writers.remove(&worker).is_some() {
            println!("Worker {} disconnected", self.registry.endpoint(worker));
        }
        self.generations[worker] += 1;
        self.registry.mark_disconnected(worker);
    }
}

/// Reader side of one worker connection: forward complete lines to the
/// dispatch loop, then report the disconnect. A final line without a
/// trailing newline is still delivered before EOF.
async fn forward_lines(
    read_half: OwnedReadHalf,
    worker: usize,
    generation: u64,
    tx: mpsc::UnboundedSender<WorkerEvent>,
) {
    let mut lines = BufReader::new(read_half).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let event = WorkerEvent::Line {
                    worker,
                    generation,
                    line,
                };
                if tx.send(event).is_err() {
                    return;
                }
            }
            Ok(None) | Err(_) => {
                let _ = tx.send(WorkerEvent::Disconnected { worker, generation });
                return;
            }
        }
    }
}
