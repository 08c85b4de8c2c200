//! Network module - Raw-socket transport and the link event loop
//!
//! Provides:
//! - Endpoint ownership of the raw LLRPC socket (open/close/send/receive)
//! - Heartbeat timer signalling periodic outbound sends
//! - The event loop multiplexing inbound arrival against heartbeats

mod endpoint;
mod event_loop;
mod heartbeat;

pub use endpoint::*;
pub use event_loop::*;
pub use heartbeat::*;

use std::net::Ipv4Addr;
use std::time::Duration;

/// Configuration for the link
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Local address to bind the endpoint to
    pub local_addr: Ipv4Addr,
    /// Remote address heartbeats are sent to
    pub remote_addr: Ipv4Addr,
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            local_addr: Ipv4Addr::LOCALHOST,
            remote_addr: Ipv4Addr::LOCALHOST,
            heartbeat_interval_ms: 1000,
        }
    }
}

impl LinkConfig {
    pub fn new(local_addr: Ipv4Addr, remote_addr: Ipv4Addr) -> Self {
        Self {
            local_addr,
            remote_addr,
            ..Default::default()
        }
    }

    /// Heartbeat interval as a [`Duration`].
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}
