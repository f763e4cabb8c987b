//! Worker discovery
//!
//! Connectionless UDP exchange that populates the worker registry before
//! any stream connection exists. The coordinator broadcasts a `DISCOVER`
//! probe and performs a fixed number of receive attempts; every reply
//! whose payload is exactly `WORKER_AVAILABLE` contributes the sender's
//! address. Best-effort: absent workers simply never reply, and the pass
//! is not repeated once dispatch begins.

use crate::config::NetworkConfig;
use crate::protocol::{DISCOVER, WORKER_AVAILABLE};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

/// Run one discovery pass and return the task endpoints of every worker
/// that answered, in reply order (the registry deduplicates by IP).
pub async fn discover_workers(network: &NetworkConfig, debug: bool) -> Result<Vec<SocketAddr>> {
    let socket = UdpSocket::bind(("0.0.0.0", network.discovery_port))
        .await
        .context("Failed to bind discovery socket")?;
    socket
        .set_broadcast(true)
        .context("Failed to enable broadcast on discovery socket")?;

    let target = SocketAddr::from((network.broadcast_addr, network.discovery_port));
    send_probe(&socket, target).await?;

    let replies = collect_replies(
        &socket,
        network.discovery_attempts,
        Duration::from_millis(network.discovery_timeout_ms),
        debug,
    )
    .await;

    // Replies arrive from the worker's UDP source port; tasks are served
    // on the fixed task port.
    Ok(replies
        .into_iter()
        .map(|addr| SocketAddr::new(addr.ip(), network.task_port))
        .collect())
}

/// Broadcast the discovery probe
pub async fn send_probe(socket: &UdpSocket, target: SocketAddr) -> Result<()> {
    socket
        .send_to(DISCOVER.as_bytes(), target)
        .await
        .with_context(|| format!("Failed to send discovery probe to {}", target))?;
    Ok(())
}

/// Collect discovery replies: `attempts` receive attempts, each bounded
/// by `per_attempt_timeout` so a silent network cannot hang startup.
/// Replies whose payload is not exactly the acknowledgement token are
/// discarded.
pub async fn collect_replies(
    socket: &UdpSocket,
    attempts: u32,
    per_attempt_timeout: Duration,
    debug: bool,
) -> Vec<SocketAddr> {
    let mut replies = Vec::new();
    let mut buf = [0u8; 256];

    for attempt in 0..attempts {
        match timeout(per_attempt_timeout, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, src))) => {
                if &buf[..len] == WORKER_AVAILABLE.as_bytes() {
                    println!("Discovered worker: {}", src.ip());
                    replies.push(src);
                } else if debug {
                    eprintln!(
                        "DEBUG: Ignoring discovery payload from {}: {:?}",
                        src,
                        String::from_utf8_lossy(&buf[..len])
                    );
                }
            }
            Ok(Err(e)) => {
                eprintln!("Discovery receive failed: {}", e);
            }
            Err(_) => {
                if debug {
                    eprintln!("DEBUG: Discovery attempt {} timed out", attempt + 1);
                }
            }
        }
    }

    replies
}

/// Worker-side probe responder: answer every matching probe with the
/// acknowledgement token addressed to the probe's source. Runs until the
/// socket fails.
pub async fn respond_to_probes(socket: UdpSocket, debug: bool) -> Result<()> {
    let mut buf = [0u8; 256];

    loop {
        let (len, src) = socket
            .recv_from(&mut buf)
            .await
            .context("Discovery socket receive failed")?;

        if &buf[..len] == DISCOVER.as_bytes() {
            if debug {
                eprintln!("DEBUG: Discovery probe from {}", src);
            }
            if let Err(e) = socket.send_to(WORKER_AVAILABLE.as_bytes(), src).await {
                eprintln!("Failed to answer discovery probe from {}: {}", src, e);
            }
        } else if debug {
            eprintln!(
                "DEBUG: Ignoring UDP payload from {}: {:?}",
                src,
                String::from_utf8_lossy(&buf[..len])
            );
        }
    }
}
