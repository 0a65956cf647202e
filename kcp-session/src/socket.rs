//! UDP I/O at the edge of the session.
//!
//! [`Transport`] is the raw-send seam shared by the session (control
//! commands) and the reliable-delivery engine (data segments).
//! [`UdpTransport`] implements it over a connected `tokio::net::UdpSocket`,
//! and [`spawn_receiver`] runs the matching receive loop.  All protocol
//! logic lives elsewhere; this module owns only byte I/O.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use crate::switch_queue::Pusher;

/// Maximum UDP payload size (theoretical limit; in practice kept much smaller).
const MAX_DATAGRAM: usize = 65_535;

/// Non-blocking datagram sender.
///
/// Called from the tick context, so implementations must not block.  A
/// datagram that cannot be sent right now may be dropped; both the handshake
/// and the engine retransmit.
pub trait Transport: Send + Sync {
    fn send(&self, datagram: &[u8]) -> io::Result<()>;
}

/// [`Transport`] over a UDP socket connected to the server.
#[derive(Debug, Clone)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    pub fn new(socket: Arc<UdpSocket>) -> Self {
        Self { socket }
    }

    /// Bind an ephemeral local port of the same address family as `peer`
    /// and connect to it.
    pub async fn connect(peer: SocketAddr) -> io::Result<Self> {
        let local: SocketAddr = if peer.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(peer).await?;
        // try_send reports WouldBlock until the reactor has seen the socket
        // writable once.
        socket.writable().await?;
        log::debug!("[socket] {} → {}", socket.local_addr()?, peer);
        Ok(Self::new(Arc::new(socket)))
    }

    pub fn socket(&self) -> &Arc<UdpSocket> {
        &self.socket
    }
}

impl Transport for UdpTransport {
    fn send(&self, datagram: &[u8]) -> io::Result<()> {
        self.socket.try_send(datagram).map(|_| ())
    }
}

/// First address `host:port` resolves to, or `None` if there is none.
pub async fn resolve(host: &str, port: u16) -> Option<SocketAddr> {
    match tokio::net::lookup_host((host, port)).await {
        Ok(mut addrs) => addrs.next(),
        Err(e) => {
            log::debug!("[socket] lookup {host}:{port} failed: {e}");
            None
        }
    }
}

/// Returns true if the receive error says nothing about the socket itself.
///
/// On a connected UDP socket an ICMP port-unreachable from an earlier send
/// surfaces as `ConnectionRefused` on the next receive; the server may simply
/// not be up yet.
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}

/// Spawn the receive loop: receive a datagram, push it, receive again.
///
/// The task touches nothing but `inbound`.  It ends on the first
/// non-transient error; the session notices via [`JoinHandle::is_finished`].
/// Aborting the handle stops it.
pub fn spawn_receiver(socket: Arc<UdpSocket>, inbound: Pusher<Vec<u8>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            match socket.recv(&mut buf).await {
                Ok(n) => {
                    log::trace!("[recv] {n} bytes");
                    inbound.push(buf[..n].to_vec());
                }
                Err(e) if is_transient(&e) => {
                    log::debug!("[recv] transient error, re-arming: {e}");
                }
                Err(e) => {
                    log::warn!("[recv] receive loop stopped: {e}");
                    break;
                }
            }
        }
    })
}
