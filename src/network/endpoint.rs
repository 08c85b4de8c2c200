//! Raw-socket endpoint for LLRPC
//!
//! Owns the single bound transport resource:
//! - Opens a raw IPv4 socket restricted to the LLRPC protocol number
//! - Thin datagram send/receive against peer host addresses
//! - Readiness futures for the event loop's wait step
//!
//! Raw sockets carry no port concept; peers are addressed by IPv4 host
//! address alone.

use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, ErrorKind};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use thiserror::Error;
use tokio::io::Interest;
use tokio::net::UdpSocket;

use crate::protocol::TRANSPORT_PROTOCOL;

/// Largest datagram the endpoint will accept, IP header included.
const MAX_DATAGRAM: usize = 65535;

/// Endpoint errors
#[derive(Error, Debug)]
pub enum EndpointError {
    #[error("unable to create LLRPC socket: {0}")]
    ResourceUnavailable(#[source] io::Error),

    #[error("unable to bind LLRPC socket to {addr}: {source}")]
    BindFailed { addr: Ipv4Addr, source: io::Error },

    #[error("receive failed: {0}")]
    Receive(#[source] io::Error),

    #[error("send failed: {0}")]
    Send(#[source] io::Error),

    #[error("endpoint is closed")]
    Closed,
}

pub type EndpointResult<T> = Result<T, EndpointError>;

/// A single bound instance of the raw LLRPC transport.
///
/// Exists from [`Endpoint::open`] until [`Endpoint::close`]; the socket is
/// owned exclusively by the caller for the lifetime of the endpoint.
pub struct Endpoint {
    /// The raw socket, registered with the tokio reactor. `None` once closed.
    socket: Option<UdpSocket>,
    /// Local address the socket is bound to
    local_addr: Ipv4Addr,
}

impl Endpoint {
    /// Open an endpoint bound to `local_addr`.
    ///
    /// Acquires a non-blocking raw IPv4 socket restricted to protocol
    /// [`TRANSPORT_PROTOCOL`] and binds it. Creating a raw socket requires
    /// CAP_NET_RAW (or root); failure surfaces as
    /// [`EndpointError::ResourceUnavailable`]. A socket that was created
    /// but cannot be bound is released before returning.
    pub fn open(local_addr: Ipv4Addr) -> EndpointResult<Self> {
        let socket = Socket::new(
            Domain::IPV4,
            Type::RAW,
            Some(Protocol::from(i32::from(TRANSPORT_PROTOCOL))),
        )
        .map_err(EndpointError::ResourceUnavailable)?;

        socket
            .set_nonblocking(true)
            .map_err(EndpointError::ResourceUnavailable)?;

        // Raw sockets have no ports; bind by host address only.
        let bind_addr = SocketAddrV4::new(local_addr, 0);
        socket
            .bind(&bind_addr.into())
            .map_err(|source| EndpointError::BindFailed {
                addr: local_addr,
                source,
            })?;

        // Hand the configured fd to the tokio reactor. The UdpSocket type is
        // a datagram-socket wrapper; the kernel still enforces the raw
        // protocol semantics of the underlying fd.
        let socket = UdpSocket::from_std(socket.into())
            .map_err(EndpointError::ResourceUnavailable)?;

        tracing::debug!("endpoint bound to {}", local_addr);

        Ok(Self {
            socket: Some(socket),
            local_addr,
        })
    }

    /// Local address this endpoint is bound to.
    pub fn local_addr(&self) -> Ipv4Addr {
        self.local_addr
    }

    /// Release the transport resource.
    ///
    /// Safe to call on an endpoint that is already closed.
    pub fn close(&mut self) {
        if let Some(socket) = self.socket.take() {
            drop(socket);
            tracing::debug!("endpoint on {} closed", self.local_addr);
        }
    }

    /// Wait until the endpoint is ready for the requested operations.
    ///
    /// Write-readiness is requested only when `want_write` is set, so an
    /// idle endpoint does not wake the caller on a perpetually-writable
    /// socket.
    pub async fn ready(&self, want_write: bool) -> EndpointResult<()> {
        let socket = self.socket.as_ref().ok_or(EndpointError::Closed)?;
        let interest = if want_write {
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::READABLE
        };
        socket
            .ready(interest)
            .await
            .map(|_| ())
            .map_err(EndpointError::Receive)
    }

    /// Send one datagram to `remote`.
    pub async fn send_to(&self, remote: Ipv4Addr, payload: &[u8]) -> EndpointResult<usize> {
        let socket = self.socket.as_ref().ok_or(EndpointError::Closed)?;
        socket
            .send_to(payload, SocketAddrV4::new(remote, 0))
            .await
            .map_err(EndpointError::Send)
    }

    /// Receive one datagram without blocking.
    ///
    /// Returns `Ok(None)` when nothing is ready or the call was
    /// interrupted; an interrupted receive is "nothing this iteration",
    /// not an error. On data, yields the peer address and the LLRPC
    /// payload with the kernel-delivered IPv4 header stripped.
    pub fn try_recv_from<'a>(
        &self,
        buf: &'a mut [u8],
    ) -> EndpointResult<Option<(Ipv4Addr, &'a [u8])>> {
        let socket = self.socket.as_ref().ok_or(EndpointError::Closed)?;
        match socket.try_recv_from(buf) {
            Ok((len, addr)) => {
                let peer = match addr {
                    SocketAddr::V4(v4) => *v4.ip(),
                    SocketAddr::V6(_) => Ipv4Addr::UNSPECIFIED,
                };
                Ok(Some((peer, strip_ip_header(&buf[..len]))))
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(EndpointError::Receive(e)),
        }
    }

    /// Buffer size callers should receive into.
    pub fn recv_buffer_size() -> usize {
        MAX_DATAGRAM
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.close();
    }
}

/// Strip the IPv4 header a raw socket delivers in front of the payload.
///
/// The header length lives in the low nibble of the first byte, in 32-bit
/// words. A packet shorter than its declared header yields an empty
/// payload, which the codec then reports as a short read.
fn strip_ip_header(packet: &[u8]) -> &[u8] {
    match packet.first() {
        Some(first) => {
            let header_len = usize::from(first & 0x0f) * 4;
            packet.get(header_len..).unwrap_or(&[])
        }
        None => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet_with_ihl5(payload: &[u8]) -> Vec<u8> {
        // Version 4, IHL 5 (20-byte header)
        let mut packet = vec![0u8; 20];
        packet[0] = 0x45;
        packet.extend_from_slice(payload);
        packet
    }

    #[test]
    fn test_strip_standard_header() {
        let packet = packet_with_ihl5(b"hello");
        assert_eq!(strip_ip_header(&packet), b"hello");
    }

    #[test]
    fn test_strip_truncated_packet() {
        // Declares a 20-byte header but only 4 bytes arrived
        let packet = [0x45, 0x00, 0x00, 0x04];
        assert_eq!(strip_ip_header(&packet), &[] as &[u8]);
        assert_eq!(strip_ip_header(&[]), &[] as &[u8]);
    }

    #[test]
    fn test_strip_options_header() {
        // IHL 6 = 24-byte header (one options word)
        let mut packet = vec![0u8; 24];
        packet[0] = 0x46;
        packet.extend_from_slice(b"xy");
        assert_eq!(strip_ip_header(&packet), b"xy");
    }

    // Opening a raw socket needs CAP_NET_RAW, which the test runner may or
    // may not have; exercise whichever path is reachable.
    #[tokio::test]
    async fn test_open_and_double_close() {
        match Endpoint::open(Ipv4Addr::LOCALHOST) {
            Ok(mut endpoint) => {
                assert_eq!(endpoint.local_addr(), Ipv4Addr::LOCALHOST);
                endpoint.close();
                endpoint.close();
                assert!(matches!(
                    endpoint.send_to(Ipv4Addr::LOCALHOST, b"x").await,
                    Err(EndpointError::Closed)
                ));
            }
            Err(e) => {
                assert!(matches!(e, EndpointError::ResourceUnavailable(_)));
            }
        }
    }
}
