//! Up-calls from the session to the host.
//!
//! Every state transition the host cares about produces exactly one
//! [`Event`], delivered synchronously from inside `tick()` (or from the call
//! that caused it).  The handler runs while the session is mutably borrowed,
//! so a host that wants to react by calling back into the session should
//! forward events through a channel and act on them after `tick()` returns:
//!
//! ```
//! use std::sync::mpsc;
//! use kcp_session::{Event, Session, SessionConfig};
//!
//! let (tx, rx) = mpsc::channel::<Event>();
//! let session = Session::new(SessionConfig::default(), move |ev: Event| {
//!     let _ = tx.send(ev);
//! });
//! # drop(session);
//! # assert!(rx.try_recv().is_err());
//! ```

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Connected,
    Disconnected,
    ConnectFailed,
    Message,
}

/// One up-call: `(conv, kind, payload, reason)`.
///
/// `payload` is set for [`EventKind::Message`] only; `reason` for
/// [`EventKind::Disconnected`] and [`EventKind::ConnectFailed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub conv: u32,
    pub kind: EventKind,
    pub payload: Option<Vec<u8>>,
    pub reason: Option<String>,
}

impl Event {
    pub fn connected(conv: u32) -> Self {
        Self { conv, kind: EventKind::Connected, payload: None, reason: None }
    }

    pub fn disconnected(conv: u32, reason: impl Into<String>) -> Self {
        Self { conv, kind: EventKind::Disconnected, payload: None, reason: Some(reason.into()) }
    }

    pub fn connect_failed(conv: u32, reason: impl Into<String>) -> Self {
        Self { conv, kind: EventKind::ConnectFailed, payload: None, reason: Some(reason.into()) }
    }

    pub fn message(conv: u32, payload: Vec<u8>) -> Self {
        Self { conv, kind: EventKind::Message, payload: Some(payload), reason: None }
    }
}

/// Receiver of session events.
pub trait EventHandler {
    fn on_event(&mut self, event: Event);
}

impl<F: FnMut(Event)> EventHandler for F {
    fn on_event(&mut self, event: Event) {
        self(event)
    }
}

/// Reasons attached to `Disconnected` / `ConnectFailed`.
pub mod reason {
    /// Handshake deadline passed.
    pub const TIMEOUT: &str = "Timeout";
    /// Local close.
    pub const CLOSED: &str = "Closed";
    /// Peer sent `Disconnect`.
    pub const REMOTE: &str = "Remote";
    /// Receive task died.
    pub const NETWORK: &str = "Network error";
}
