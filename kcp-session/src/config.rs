//! Per-session tunables.
//!
//! Protocol constants live here as `Default` values rather than globals, so
//! two sessions in one process can run with different timeouts.

use std::time::Duration;

/// Smallest valid session id.  Smaller leading words are control-command tags.
pub const KCP_MIN_CONV: u32 = 1000;
/// Idle period after which a connected session is considered dead.
pub const KCP_SESSION_TIMEOUT: Duration = Duration::from_millis(10_000);
/// How long the handshake may take before `ConnectFailed`.
pub const KCP_CONNECT_TIMEOUT: Duration = Duration::from_millis(5_000);
/// Spacing between `ConnectReq` retransmissions.
pub const KCP_CONNECT_REQ_INTERVAL: Duration = Duration::from_millis(500);
/// Spacing between heartbeats.
pub const KCP_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(8_000);
/// Grace period in `Disconnecting` before the session is torn down locally.
pub const KCP_DISCONNECT_TIMEOUT: Duration = Duration::from_millis(1_000);

/// Session timing and plane-split parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Leading-word threshold between control and data packets.
    pub min_conv: u32,
    /// Idle timeout for a connected session.
    ///
    /// Reserved for heartbeat scheduling; the session does not act on it yet.
    pub session_timeout: Duration,
    pub connect_timeout: Duration,
    pub connect_req_interval: Duration,
    /// Reserved for heartbeat scheduling, see `session_timeout`.
    pub heartbeat_interval: Duration,
    pub disconnect_timeout: Duration,
    /// Parameters handed to the reliable-delivery engine on handshake.
    pub engine: EngineConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_conv: KCP_MIN_CONV,
            session_timeout: KCP_SESSION_TIMEOUT,
            connect_timeout: KCP_CONNECT_TIMEOUT,
            connect_req_interval: KCP_CONNECT_REQ_INTERVAL,
            heartbeat_interval: KCP_HEARTBEAT_INTERVAL,
            disconnect_timeout: KCP_DISCONNECT_TIMEOUT,
            engine: EngineConfig::default(),
        }
    }
}

/// KCP tuning knobs, named after `ikcp_nodelay` / `ikcp_wndsize` / `ikcp_setmtu`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Disable the minimum RTO floor and back-off.
    pub nodelay: bool,
    /// Internal update interval in milliseconds.
    pub interval: i32,
    /// Fast-retransmit after this many duplicate ACKs (0 = off).
    pub resend: i32,
    /// Disable congestion control.
    pub nc: bool,
    pub mtu: usize,
    pub snd_wnd: u16,
    pub rcv_wnd: u16,
}

impl EngineConfig {
    /// KCP's conservative defaults.
    pub fn normal() -> Self {
        Self {
            nodelay: false,
            interval: 40,
            resend: 0,
            nc: false,
            mtu: 1400,
            snd_wnd: 32,
            rcv_wnd: 128,
        }
    }

    /// Low-latency profile: no delay, 10 ms interval, fast resend, no cwnd.
    pub fn fast() -> Self {
        Self {
            nodelay: true,
            interval: 10,
            resend: 2,
            nc: true,
            ..Self::normal()
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::fast()
    }
}

/// Milliseconds in `d`, saturated to the 32-bit clock range.
pub(crate) fn millis(d: Duration) -> u32 {
    u32::try_from(d.as_millis()).unwrap_or(u32::MAX)
}
