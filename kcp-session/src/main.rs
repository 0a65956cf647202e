//! Entry point for `kcp-client`.
//!
//! Connects to a KCP server, sends a greeting once connected, and echoes
//! every message back.  All protocol work is delegated to the library;
//! `main.rs` owns only process setup (logging, argument parsing, the tick
//! loop).

use std::sync::mpsc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use kcp_session::{EngineConfig, Event, EventKind, Session, SessionConfig, SessionState};

/// Echo client for a KCP server with conv-assigning handshake.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Server host.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    /// Server port.
    #[arg(short, long, default_value_t = 4000)]
    port: u16,
    /// Handshake deadline in milliseconds.
    #[arg(long, default_value_t = 5000)]
    connect_timeout_ms: u64,
    /// Tick cadence in milliseconds.
    #[arg(long, default_value_t = 10)]
    tick_ms: u64,
    /// Use KCP's conservative profile instead of the low-latency one.
    #[arg(long)]
    normal: bool,
    /// Greeting sent after connecting.
    #[arg(short, long, default_value = "Hello KCP.")]
    message: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();

    let config = SessionConfig {
        connect_timeout: Duration::from_millis(cli.connect_timeout_ms),
        engine: if cli.normal { EngineConfig::normal() } else { EngineConfig::fast() },
        ..SessionConfig::default()
    };

    let (tx, rx) = mpsc::channel::<Event>();
    let mut session = Session::new(config, move |ev: Event| {
        let _ = tx.send(ev);
    });

    log::info!("Connecting to {}:{}", cli.host, cli.port);
    session.connect(&cli.host, cli.port).await?;

    let mut ticker = tokio::time::interval(Duration::from_millis(cli.tick_ms));
    loop {
        ticker.tick().await;
        session.tick();

        for ev in rx.try_iter() {
            match ev.kind {
                EventKind::Connected => {
                    log::info!("connected, conv={}", ev.conv);
                    session.send(&cli.message);
                }
                EventKind::ConnectFailed => {
                    log::error!("connect failed: {}", ev.reason.unwrap_or_default());
                }
                EventKind::Disconnected => {
                    log::info!("disconnected: {}", ev.reason.unwrap_or_default());
                }
                EventKind::Message => {
                    let payload = ev.payload.unwrap_or_default();
                    log::info!("recv message: {}", String::from_utf8_lossy(&payload));
                    session.send(&payload);
                }
            }
        }

        if !session.state().is_active() {
            break;
        }
    }

    if session.state() == SessionState::Timeout {
        anyhow::bail!("no answer from {}:{}", cli.host, cli.port);
    }
    Ok(())
}
