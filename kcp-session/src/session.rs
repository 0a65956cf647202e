//! Client session: handshake, lifecycle, and control/data demultiplexing.
//!
//! A [`Session`] is driven entirely by the host calling [`Session::tick`]
//! (every ~10 ms).  Datagrams arrive on a background receive task that only
//! pushes into a [`SwitchQueue`]; each tick switches the queue, drains it,
//! and runs the state machine synchronously.  Nothing here blocks, and no
//! lock guards the state fields: `tick`, `send`, `close` and friends all take
//! `&mut self`, so the borrow checker enforces the single-owner rule.
//!
//! # Handshake
//!
//! ```text
//!  client                               server
//!    │── ConnectReq ──────────────────────▶│   every connect_req_interval
//!    │── ConnectReq ──────────────────────▶│
//!    │◀───────────────── ConnectAck{conv} ──│
//!    │   (engine created, Connected)        │
//!    │◀════ [conv][kcp segment] ═══════════▶│
//! ```
//!
//! Each Connecting tick first looks for an ack, then checks the deadline,
//! then retries.  An ack and the deadline landing in the same tick resolve
//! in favour of the ack.

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::clock::{self, Clock, MonotonicClock};
use crate::command::{self, CommandKind, ControlCommand, COMMAND_LEN};
use crate::config::{millis, SessionConfig};
use crate::engine::{KcpEngine, ReliableEngine};
use crate::event::{reason, Event, EventHandler};
use crate::socket::{self, Transport, UdpTransport};
use crate::state::SessionState;
use crate::switch_queue::{self, Pusher, SwitchQueue};

/// Initial capacity of each switch-queue buffer.
const QUEUE_CAPACITY: usize = 128;

/// Errors returned by session operations.
///
/// Network conditions never produce these; they surface as events.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Operation not allowed in the current state.
    #[error("operation not valid in state {0}")]
    BadState(SessionState),
    /// The server host did not resolve to any address.
    #[error("cannot resolve {0}")]
    Resolve(String),
    /// Binding or connecting the UDP socket failed.
    #[error("socket setup failed: {0}")]
    Io(#[from] std::io::Error),
}

/// A client session over one UDP socket.
///
/// `H` receives [`Event`]s; `E` is the reliable-delivery engine created when
/// the handshake completes.
pub struct Session<H, E = KcpEngine> {
    config: SessionConfig,
    handler: H,
    clock: Box<dyn Clock>,

    state: SessionState,
    /// Server-assigned id; 0 until the handshake completes.
    conv: u32,

    connect_start: u32,
    /// `None` until the first `ConnectReq` of this attempt goes out.
    last_connect_req: Option<u32>,
    disconnect_start: u32,

    /// Engine has fresh input or output and must be updated this tick.
    needs_tick: bool,
    /// Engine's own next update deadline.
    next_deadline: u32,

    engine: Option<E>,
    transport: Option<Arc<dyn Transport>>,
    receiver: Option<JoinHandle<()>>,
    queue: SwitchQueue<Vec<u8>>,
}

impl<H: EventHandler> Session<H> {
    /// Session using the KCP engine and the monotonic clock.
    pub fn new(config: SessionConfig, handler: H) -> Self {
        Self::with_clock(config, handler, MonotonicClock::new())
    }
}

impl<H: EventHandler, E: ReliableEngine> Session<H, E> {
    pub fn with_clock(config: SessionConfig, handler: H, clock: impl Clock + 'static) -> Self {
        let (_, queue) = switch_queue::channel(QUEUE_CAPACITY);
        Self {
            config,
            handler,
            clock: Box::new(clock),
            state: SessionState::None,
            conv: 0,
            connect_start: 0,
            last_connect_req: None,
            disconnect_start: 0,
            needs_tick: false,
            next_deadline: 0,
            engine: None,
            transport: None,
            receiver: None,
            queue,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Server-assigned session id, 0 before the handshake and after `reset`.
    pub fn conv(&self) -> u32 {
        self.conv
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The running engine, present only while Connected or Disconnecting.
    pub fn engine(&self) -> Option<&E> {
        self.engine.as_ref()
    }

    /// Open a UDP socket to `host:port`, start the receive task, and begin
    /// the handshake.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn connect(&mut self, host: &str, port: u16) -> Result<(), SessionError> {
        self.ensure_can_connect()?;
        let peer = socket::resolve(host, port)
            .await
            .ok_or_else(|| SessionError::Resolve(format!("{host}:{port}")))?;
        let transport = UdpTransport::connect(peer).await?;
        let socket = Arc::clone(transport.socket());
        let inbound = self.connect_with(Arc::new(transport))?;
        self.receiver = Some(socket::spawn_receiver(socket, inbound));
        Ok(())
    }

    /// Begin the handshake over a caller-supplied transport.
    ///
    /// Returns the write end of the inbound queue; whatever receives
    /// datagrams for this session pushes them there.
    pub fn connect_with(
        &mut self,
        transport: Arc<dyn Transport>,
    ) -> Result<Pusher<Vec<u8>>, SessionError> {
        self.ensure_can_connect()?;
        self.release();

        let (inbound, queue) = switch_queue::channel(QUEUE_CAPACITY);
        self.queue = queue;
        self.transport = Some(transport);
        self.conv = 0;
        self.last_connect_req = None;
        self.connect_start = self.clock.now_ms();
        self.state = SessionState::Connecting;
        log::debug!("[session] connecting");
        Ok(inbound)
    }

    /// Queue `data` for reliable delivery.
    ///
    /// Returns `false`, and does nothing, unless the session is Connected.
    pub fn send(&mut self, data: impl AsRef<[u8]>) -> bool {
        if self.state != SessionState::Connected {
            log::debug!("[session] send ignored in state {}", self.state);
            return false;
        }
        let Some(engine) = self.engine.as_mut() else {
            return false;
        };
        match engine.send(data.as_ref()) {
            Ok(()) => {
                self.needs_tick = true;
                true
            }
            Err(e) => {
                log::warn!("[session] conv={} send rejected: {e}", self.conv);
                false
            }
        }
    }

    /// Graceful close.
    ///
    /// Connected: sends `Disconnect` and waits in Disconnecting for the peer
    /// or `disconnect_timeout`.  Connecting: abandons the handshake with
    /// `ConnectFailed("Closed")`.  Other states: no-op.
    pub fn close(&mut self) {
        match self.state {
            SessionState::Connected => {
                self.send_command(ControlCommand::disconnect(self.conv));
                self.disconnect_start = self.clock.now_ms();
                self.state = SessionState::Disconnecting;
                log::debug!("[session] conv={} → Disconnect; disconnecting", self.conv);
            }
            SessionState::Connecting => {
                self.release();
                self.state = SessionState::None;
                self.handler.on_event(Event::connect_failed(0, reason::CLOSED));
            }
            _ => {}
        }
    }

    /// Tear the session down locally and report `Disconnected` once.
    ///
    /// No-op unless Connected or Disconnecting, so repeated calls emit a
    /// single event.
    pub fn disconnect(&mut self, why: &str) {
        if !self.state.has_engine() {
            return;
        }
        self.release();
        self.state = SessionState::Disconnected;
        log::debug!("[session] conv={} disconnected: {why}", self.conv);
        self.handler.on_event(Event::disconnected(self.conv, why));
    }

    /// Return to `None` from any state, silently.
    pub fn reset(&mut self) {
        self.release();
        self.state = SessionState::None;
        self.conv = 0;
        self.connect_start = 0;
        self.last_connect_req = None;
        self.disconnect_start = 0;
    }

    /// Process everything received since the last tick and run timers.
    pub fn tick(&mut self) {
        let now = self.clock.now_ms();
        match self.state {
            SessionState::Connecting => self.tick_connecting(now),
            SessionState::Connected | SessionState::Disconnecting => self.tick_connected(now),
            SessionState::None | SessionState::Disconnected | SessionState::Timeout => {}
        }
    }

    // -----------------------------------------------------------------------
    // Handshake
    // -----------------------------------------------------------------------

    fn tick_connecting(&mut self, now: u32) {
        if self.accept_connect_ack() {
            return;
        }

        if self.receiver_finished() {
            self.fail_connect(reason::NETWORK);
            return;
        }

        if clock::elapsed(now, self.connect_start) > millis(self.config.connect_timeout) {
            self.fail_connect(reason::TIMEOUT);
            return;
        }

        let due = match self.last_connect_req {
            None => true,
            Some(last) => clock::elapsed(now, last) > millis(self.config.connect_req_interval),
        };
        if due {
            self.last_connect_req = Some(now);
            self.send_command(ControlCommand::connect_req());
            log::trace!("[session] → ConnectReq");
        }
    }

    /// Drain inbound packets looking for a `ConnectAck`.
    ///
    /// On success the session is Connected and whatever is still queued is
    /// left for the next tick.
    fn accept_connect_ack(&mut self) -> bool {
        self.queue.switch();
        while let Some(buf) = self.queue.pop() {
            let cmd = match self.decode_control(&buf) {
                Some(cmd) => cmd,
                None => continue,
            };
            if cmd.kind != CommandKind::ConnectAck {
                log::trace!("[session] {:?} ignored while connecting", cmd.kind);
                continue;
            }
            if cmd.conv < self.config.min_conv {
                log::debug!("[session] ConnectAck with reserved conv {} dropped", cmd.conv);
                continue;
            }
            return self.establish(cmd.conv);
        }
        false
    }

    fn establish(&mut self, conv: u32) -> bool {
        let Some(transport) = self.transport.clone() else {
            return false;
        };
        match E::open(conv, &self.config.engine, transport) {
            Ok(engine) => {
                self.conv = conv;
                self.engine = Some(engine);
                self.needs_tick = true;
                self.next_deadline = 0;
                self.state = SessionState::Connected;
                log::debug!("[session] ← ConnectAck conv={conv}; connected");
                self.handler.on_event(Event::connected(conv));
            }
            Err(e) => {
                log::warn!("[session] engine for conv={conv} failed to open: {e}");
                self.fail_connect(&e.to_string());
            }
        }
        true
    }

    fn fail_connect(&mut self, why: &str) {
        self.release();
        self.state = if why == reason::TIMEOUT {
            SessionState::Timeout
        } else {
            SessionState::None
        };
        log::debug!("[session] connect failed: {why}");
        self.handler.on_event(Event::connect_failed(0, why));
    }

    // -----------------------------------------------------------------------
    // Connected / Disconnecting
    // -----------------------------------------------------------------------

    fn tick_connected(&mut self, now: u32) {
        self.queue.switch();
        while let Some(buf) = self.queue.pop() {
            self.dispatch(&buf);
            if !self.state.has_engine() {
                return;
            }
        }

        if self.receiver_finished() {
            self.disconnect(reason::NETWORK);
            return;
        }

        self.service_engine(now);

        if self.state == SessionState::Disconnecting
            && clock::elapsed(now, self.disconnect_start) > millis(self.config.disconnect_timeout)
        {
            log::debug!("[session] conv={} no answer to Disconnect; closing", self.conv);
            self.disconnect(reason::CLOSED);
        }
    }

    /// Route one inbound datagram to the control handler or the engine.
    fn dispatch(&mut self, buf: &[u8]) {
        let Some(lead) = command::read_u32(buf) else {
            log::trace!("[session] {} byte runt dropped", buf.len());
            return;
        };

        if lead >= self.config.min_conv {
            let Some(engine) = self.engine.as_mut() else {
                return;
            };
            if let Err(e) = engine.input(buf) {
                log::debug!("[session] conv={} engine dropped datagram: {e}", self.conv);
            }
            self.needs_tick = true;
            return;
        }

        let Some(cmd) = self.decode_control(buf) else {
            return;
        };
        if cmd.conv != self.conv {
            log::debug!(
                "[session] {:?} for conv={} dropped (own conv={})",
                cmd.kind,
                cmd.conv,
                self.conv
            );
            return;
        }
        match cmd.kind {
            CommandKind::Disconnect => {
                let why = if self.state == SessionState::Disconnecting {
                    reason::CLOSED
                } else {
                    reason::REMOTE
                };
                self.disconnect(why);
            }
            CommandKind::Heartbeat => {
                // Scheduling and expiry are not wired up; see
                // `SessionConfig::heartbeat_interval`.
                log::trace!("[session] conv={} ← Heartbeat", self.conv);
            }
            CommandKind::ConnectReq | CommandKind::ConnectAck => {
                log::trace!("[session] {:?} ignored while {}", cmd.kind, self.state);
            }
        }
    }

    /// Update the engine if owed, then surface every ready message.
    fn service_engine(&mut self, now: u32) {
        let conv = self.conv;
        let Some(engine) = self.engine.as_mut() else {
            return;
        };

        if self.needs_tick || clock::reached(now, self.next_deadline) {
            if let Err(e) = engine.update(now) {
                log::warn!("[session] conv={conv} engine update failed: {e}");
            }
            self.next_deadline = engine.check(now);
            self.needs_tick = false;
        }

        while let Some(msg) = engine.recv() {
            self.handler.on_event(Event::message(conv, msg));
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Decode a control-plane datagram, or `None` if it is data or garbage.
    fn decode_control(&self, buf: &[u8]) -> Option<ControlCommand> {
        match command::read_u32(buf) {
            Some(lead) if lead < self.config.min_conv => {}
            _ => {
                log::trace!("[session] non-control datagram ({} bytes) dropped", buf.len());
                return None;
            }
        }
        match ControlCommand::decode(buf) {
            Ok(cmd) => Some(cmd),
            Err(e) => {
                log::debug!("[session] bad control packet dropped: {e}");
                None
            }
        }
    }

    fn send_command(&self, cmd: ControlCommand) {
        let Some(transport) = self.transport.as_ref() else {
            return;
        };
        let mut buf = [0u8; COMMAND_LEN];
        let n = match cmd.encode(&mut buf) {
            Ok(n) => n,
            Err(e) => {
                log::warn!("[session] cannot encode {:?}: {e}", cmd.kind);
                return;
            }
        };
        if let Err(e) = transport.send(&buf[..n]) {
            log::warn!("[session] {:?} not sent: {e}", cmd.kind);
        }
    }

    fn ensure_can_connect(&self) -> Result<(), SessionError> {
        if self.state.is_active() {
            return Err(SessionError::BadState(self.state));
        }
        Ok(())
    }

    fn receiver_finished(&self) -> bool {
        self.receiver.as_ref().is_some_and(JoinHandle::is_finished)
    }

    /// Drop the engine, the socket and everything queued.
    fn release(&mut self) {
        if let Some(handle) = self.receiver.take() {
            handle.abort();
        }
        self.engine = None;
        self.transport = None;
        self.queue.clear();
        self.needs_tick = false;
        self.next_deadline = 0;
    }
}

impl<H, E> Drop for Session<H, E> {
    fn drop(&mut self) {
        if let Some(handle) = self.receiver.take() {
            handle.abort();
        }
    }
}
