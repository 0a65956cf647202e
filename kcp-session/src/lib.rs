//! `kcp-session` — client-side session layer for KCP over UDP.
//!
//! # Architecture
//!
//! ```text
//!   network (tokio task)                 host thread, every ~10 ms
//!  ┌──────────────────┐   push    ┌──────────────┐  switch/pop  ┌───────────┐
//!  │ socket::receiver │──────────▶│ SwitchQueue  │─────────────▶│  Session  │──▶ EventHandler
//!  └──────────────────┘           └──────────────┘     tick()   └─────┬─────┘
//!           ▲                                                         │
//!           │                         control: command codec ────────┤
//!     UDP datagrams                   data:    ReliableEngine ◀───────┘
//!           │                                         │
//!           └──────────────── Transport ◀─────────────┘
//! ```
//!
//! The first 32-bit word of every datagram decides its plane: below
//! `min_conv` it is a control command, otherwise a KCP segment for the
//! engine.
//!
//! Each module has a single responsibility:
//! - [`command`]      — control-command wire format
//! - [`switch_queue`] — double-buffered hand-off from receive task to tick
//! - [`session`]      — handshake and lifecycle state machine
//! - [`state`]        — finite-state-machine types
//! - [`engine`]       — reliable-delivery engine contract and KCP adapter
//! - [`event`]        — up-calls to the host
//! - [`config`]       — per-session timeouts and engine tuning
//! - [`clock`]        — 32-bit millisecond clock
//! - [`socket`]       — UDP transport and receive loop

pub mod clock;
pub mod command;
pub mod config;
pub mod engine;
pub mod event;
pub mod session;
pub mod socket;
pub mod state;
pub mod switch_queue;

pub use command::{CommandError, CommandKind, ControlCommand};
pub use config::{EngineConfig, SessionConfig};
pub use engine::{EngineError, KcpEngine, ReliableEngine};
pub use event::{Event, EventHandler, EventKind};
pub use session::{Session, SessionError};
pub use state::SessionState;
