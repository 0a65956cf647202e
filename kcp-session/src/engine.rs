//! Contract with the reliable-delivery engine.
//!
//! The session never looks inside the ARQ machinery (windows, retransmission,
//! fragmentation).  It only needs the narrow surface of [`ReliableEngine`]:
//! construct bound to a `conv` and a raw-send function, push outbound
//! payloads, feed inbound datagrams, drive the timer, and drain reassembled
//! messages.
//!
//! [`KcpEngine`] is the production implementation, a thin adapter over the
//! `kcp` crate.

use std::io::{self, Write};
use std::sync::Arc;

use thiserror::Error;

use crate::config::EngineConfig;
use crate::socket::Transport;

/// Errors reported by an engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The engine could not be configured as requested.
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
    /// The engine refused an operation (oversized payload, foreign conv, ...).
    #[error("engine rejected operation: {0}")]
    Rejected(String),
}

/// Operations the session needs from a reliable-delivery engine.
pub trait ReliableEngine: Sized {
    /// Create an engine for session `conv` writing datagrams to `output`.
    fn open(conv: u32, config: &EngineConfig, output: Arc<dyn Transport>)
        -> Result<Self, EngineError>;

    /// Queue an application payload for reliable delivery.
    fn send(&mut self, payload: &[u8]) -> Result<(), EngineError>;

    /// Feed one raw inbound datagram (leading `conv` included).
    fn input(&mut self, datagram: &[u8]) -> Result<(), EngineError>;

    /// Run timers and flush pending output.
    fn update(&mut self, now: u32) -> Result<(), EngineError>;

    /// When `update` should run next, as an absolute timestamp.
    fn check(&self, now: u32) -> u32;

    /// Take the next fully reassembled, in-order message, if any.
    fn recv(&mut self) -> Option<Vec<u8>>;
}

/// Adapts a [`Transport`] to the `Write` sink that `kcp::Kcp` flushes into.
///
/// Send errors are logged and swallowed: to KCP a dropped datagram is just
/// loss, which it already recovers from, while an `Err` would abort the whole
/// flush.
struct TransportWriter {
    transport: Arc<dyn Transport>,
}

impl Write for TransportWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Err(e) = self.transport.send(buf) {
            log::warn!("[engine] dropped {} byte datagram: {e}", buf.len());
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// [`ReliableEngine`] backed by `kcp::Kcp`.
pub struct KcpEngine {
    kcp: kcp::Kcp<TransportWriter>,
}

impl ReliableEngine for KcpEngine {
    fn open(
        conv: u32,
        config: &EngineConfig,
        output: Arc<dyn Transport>,
    ) -> Result<Self, EngineError> {
        let mut kcp = kcp::Kcp::new(conv, TransportWriter { transport: output });
        kcp.set_nodelay(config.nodelay, config.interval, config.resend, config.nc);
        kcp.set_wndsize(config.snd_wnd, config.rcv_wnd);
        kcp.set_mtu(config.mtu)
            .map_err(|e| EngineError::InvalidConfig(format!("mtu {}: {e:?}", config.mtu)))?;
        Ok(Self { kcp })
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), EngineError> {
        self.kcp
            .send(payload)
            .map(|_| ())
            .map_err(|e| EngineError::Rejected(format!("{e:?}")))
    }

    fn input(&mut self, datagram: &[u8]) -> Result<(), EngineError> {
        self.kcp
            .input(datagram)
            .map(|_| ())
            .map_err(|e| EngineError::Rejected(format!("{e:?}")))
    }

    fn update(&mut self, now: u32) -> Result<(), EngineError> {
        self.kcp
            .update(now)
            .map_err(|e| EngineError::Rejected(format!("{e:?}")))
    }

    fn check(&self, now: u32) -> u32 {
        // kcp-rs reports the delay until the next update, not a timestamp.
        now.wrapping_add(self.kcp.check(now))
    }

    fn recv(&mut self) -> Option<Vec<u8>> {
        let size = self.kcp.peeksize().ok()?;
        let mut buf = vec![0u8; size];
        match self.kcp.recv(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Some(buf)
            }
            Err(e) => {
                log::debug!("[engine] recv after peek {size} failed: {e:?}");
                None
            }
        }
    }
}
