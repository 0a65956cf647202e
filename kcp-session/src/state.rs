//! Session finite-state machine (FSM) types.
//!
//! This module defines every state a [`crate::session::Session`] can occupy.
//! Transitions live in [`crate::session`]; the legal ones are drawn below so
//! the enum doubles as a map of the protocol.

/// All possible states of the session FSM.
///
/// ```text
///  NONE ──connect──▶ CONNECTING ──ConnectAck──▶ CONNECTED ──close──▶ DISCONNECTING
///    ▲                    │                         │                     │
///    │              connect timeout      peer Disconnect /         peer Disconnect /
///    │                    ▼              disconnect()              disconnect timeout
///    │                 TIMEOUT                      ▼                     │
///    │                                        DISCONNECTED ◀──────────────┘
///    │
///    └──── reset() from any state
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No session; initial state and the result of `reset()`.
    #[default]
    None,
    /// `ConnectReq` is being sent periodically; waiting for `ConnectAck`.
    Connecting,
    /// Handshake complete; the reliable-delivery engine is running.
    Connected,
    /// Local close sent `Disconnect`; waiting for the peer or the grace timeout.
    Disconnecting,
    /// Session ended after having been connected.
    Disconnected,
    /// Handshake gave up.
    Timeout,
}

impl SessionState {
    /// States in which the reliable-delivery engine exists.
    pub fn has_engine(self) -> bool {
        matches!(self, Self::Connected | Self::Disconnecting)
    }

    /// States that hold a socket and need ticking.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected | Self::Disconnecting)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
