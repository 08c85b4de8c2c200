//! LLRPC event loop
//!
//! The only stateful control-flow component. Owns the endpoint for the
//! lifetime of the process and, per iteration:
//! - waits (bounded) for inbound readability, requesting write readiness
//!   only while a heartbeat is pending
//! - services at most one inbound message, reporting it or the failure
//! - then services a pending heartbeat: one ECHO_REQ to the configured
//!   remote, with the next sequence id
//!
//! Per-iteration failures are terminal only to that step; the loop runs
//! until the shutdown flag is raised, then closes the endpoint exactly
//! once.

use bytes::BytesMut;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time;

use super::endpoint::{Endpoint, EndpointError};
use super::heartbeat::HeartbeatTimer;
use super::LinkConfig;
use crate::protocol::{decode_header, encode_header, format_event, Encoder, MessageType, HEADER_SIZE};

/// Upper bound on one iteration's wait, and therefore on shutdown latency.
const IDLE_WAIT: Duration = Duration::from_millis(200);

/// Link errors
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("endpoint error: {0}")]
    Endpoint(#[from] EndpointError),
}

pub type LinkResult<T> = Result<T, LinkError>;

/// Cooperative termination flag.
///
/// Raised from outside the loop (signal handling, tests); the loop checks
/// it once per iteration, so shutdown latency is bounded by one wait.
#[derive(Clone, Default)]
pub struct ShutdownHandle {
    shared: Arc<ShutdownShared>,
}

#[derive(Default)]
struct ShutdownShared {
    raised: AtomicBool,
    wake: Notify,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request termination and wake the loop.
    pub fn raise(&self) {
        self.shared.raised.store(true, Ordering::Release);
        self.shared.wake.notify_one();
    }

    /// Whether termination has been requested.
    pub fn is_raised(&self) -> bool {
        self.shared.raised.load(Ordering::Acquire)
    }

    /// Wait until termination is requested.
    pub async fn raised(&self) {
        loop {
            let notified = self.shared.wake.notified();
            if self.is_raised() {
                return;
            }
            notified.await;
        }
    }
}

/// Link statistics
#[derive(Debug, Default, Clone)]
pub struct LinkStats {
    /// Messages sent
    pub messages_sent: u64,
    /// Messages received and decoded
    pub messages_received: u64,
    /// Bytes sent
    pub bytes_sent: u64,
    /// Bytes received
    pub bytes_received: u64,
    /// Inbound datagrams discarded as malformed
    pub decode_failures: u64,
}

/// The LLRPC link: one endpoint heartbeating one configured remote.
pub struct Link {
    /// The bound transport
    endpoint: Endpoint,
    /// Heartbeat destination
    remote_addr: Ipv4Addr,
    /// Outbound header builder (owns the sequence counter)
    encoder: Encoder,
    /// Periodic heartbeat signal source
    heartbeat: HeartbeatTimer,
    /// Cooperative termination flag
    shutdown: ShutdownHandle,
    /// Receive buffer, reused across iterations
    recv_buf: Vec<u8>,
    /// Statistics
    stats: LinkStats,
}

impl Link {
    /// Open the endpoint and arm the heartbeat timer.
    ///
    /// Must be called within a tokio runtime. Fails when the raw socket
    /// cannot be created or bound; nothing is left running on failure.
    pub fn open(config: &LinkConfig, shutdown: ShutdownHandle) -> LinkResult<Self> {
        let endpoint = Endpoint::open(config.local_addr)?;
        let heartbeat = HeartbeatTimer::start(config.heartbeat_interval());

        Ok(Self {
            endpoint,
            remote_addr: config.remote_addr,
            encoder: Encoder::new(),
            heartbeat,
            shutdown,
            recv_buf: vec![0u8; Endpoint::recv_buffer_size()],
            stats: LinkStats::default(),
        })
    }

    /// Local address the endpoint is bound to.
    pub fn local_addr(&self) -> Ipv4Addr {
        self.endpoint.local_addr()
    }

    /// Heartbeat destination.
    pub fn remote_addr(&self) -> Ipv4Addr {
        self.remote_addr
    }

    /// Link statistics.
    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// Run until the shutdown flag is raised, then close the endpoint.
    pub async fn run(&mut self) -> LinkResult<()> {
        tracing::info!(
            "link up: local {} -> remote {}",
            self.endpoint.local_addr(),
            self.remote_addr
        );

        loop {
            if self.shutdown.is_raised() {
                break;
            }

            let heartbeat_due = self.heartbeat.is_due();
            tokio::select! {
                biased;
                _ = self.shutdown.raised() => {}
                ready = self.endpoint.ready(heartbeat_due) => {
                    if let Err(e) = ready {
                        tracing::warn!("readiness wait failed: {}", e);
                        time::sleep(IDLE_WAIT).await;
                    }
                }
                _ = self.heartbeat.due(), if !heartbeat_due => {}
                _ = time::sleep(IDLE_WAIT) => {}
            }

            // Inbound always precedes any heartbeat sent this iteration.
            self.service_inbound();
            self.service_heartbeat().await;
        }

        self.endpoint.close();
        tracing::info!("link down");
        Ok(())
    }

    /// Service at most one inbound message.
    ///
    /// Receive and decode failures are reported and discarded, never
    /// fatal to the loop.
    fn service_inbound(&mut self) {
        match self.endpoint.try_recv_from(&mut self.recv_buf) {
            Ok(Some((peer, payload))) => {
                let received = payload.len() as u64;
                match decode_header(payload) {
                    Ok(header) => {
                        self.stats.messages_received += 1;
                        self.stats.bytes_received += received;
                        tracing::info!("recv {}", format_event(peer, &header));
                    }
                    Err(e) => {
                        self.stats.decode_failures += 1;
                        tracing::warn!("discarding datagram from {}: {}", peer, e);
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("receive failed: {}", e);
            }
        }
    }

    /// Send one ECHO_REQ if a heartbeat is pending.
    ///
    /// The flag is taken atomically first, so timer fires that piled up
    /// during a slow iteration produce a single send.
    async fn service_heartbeat(&mut self) {
        if !self.heartbeat.take() {
            return;
        }

        let header = self.encoder.encode(MessageType::EchoRequest);
        let mut buf = BytesMut::with_capacity(HEADER_SIZE);
        encode_header(&header, &mut buf);

        match self.endpoint.send_to(self.remote_addr, &buf).await {
            Ok(sent) => {
                self.stats.messages_sent += 1;
                self.stats.bytes_sent += sent as u64;
                tracing::info!("send {}", format_event(self.remote_addr, &header));
            }
            Err(e) => {
                tracing::warn!("heartbeat send failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_handle() {
        let handle = ShutdownHandle::new();
        assert!(!handle.is_raised());

        let clone = handle.clone();
        clone.raise();
        assert!(handle.is_raised());
    }

    #[tokio::test]
    async fn test_shutdown_wakes_waiter() {
        let handle = ShutdownHandle::new();
        let clone = handle.clone();

        let waiter = tokio::spawn(async move { clone.raised().await });
        handle.raise();
        waiter.await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires CAP_NET_RAW (run as root)"]
    async fn test_loopback_heartbeat_roundtrip() {
        let config = LinkConfig {
            local_addr: Ipv4Addr::LOCALHOST,
            remote_addr: Ipv4Addr::LOCALHOST,
            heartbeat_interval_ms: 100,
        };

        let shutdown = ShutdownHandle::new();
        let mut link = Link::open(&config, shutdown.clone()).expect("open link");

        let task = tokio::spawn(async move {
            link.run().await.expect("run link");
            link
        });

        time::sleep(Duration::from_millis(450)).await;
        shutdown.raise();
        let link = task.await.expect("join link");

        assert!(link.stats().messages_sent >= 1);
        // Loopback delivers our own ECHO_REQ back to the bound endpoint
        assert!(link.stats().messages_received >= 1);
    }
}
