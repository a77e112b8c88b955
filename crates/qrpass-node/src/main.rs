//! `qrpass` command line node
//!
//! Stands in for the camera and the code display: decoded code text comes in
//! through arguments or stdin, payload text to show goes out on stdout, and
//! logs go to stderr.

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{info, warn};

use qrpass_core::config::load_config;
use qrpass_crypto::PeerIdHash;
use qrpass_node::exchange::{
    CaptureEvent, CodeRenderer, Exchange, ExchangeSession, ScanGate, ScanOutcome,
};
use qrpass_node::gossip::DeliveryCoordinator;
use qrpass_node::service::{prepare_message, store_prepared};
use qrpass_node::storage::{Database, MessageFilter, StoredMessage};

#[derive(Parser, Debug)]
#[command(name = "qrpass")]
#[command(version, about = "QR-Pass node - pass notes between devices through QR codes")]
struct Cli {
    /// Explicit config file (JSON), layered over the global settings
    #[arg(long, global = true, env = "QRPASS_CONFIG")]
    config: Option<PathBuf>,

    /// Message store path
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Directory for the beacon key file
    #[arg(long, global = true)]
    keys_dir: Option<PathBuf>,

    /// Log level filter (e.g. "info", "debug", "warn")
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print this device's beacon payload
    Beacon {
        /// Replace the beacon key first; replies to the old beacon become unreadable
        #[arg(long)]
        rotate: bool,
    },
    /// Classify decoded code text (reads stdin when TEXT is omitted)
    Scan { text: Option<String> },
    /// Seal a note for a beacon's public key, store it and print the response
    Send {
        /// The `epk_b64` value of the recipient's beacon
        #[arg(long)]
        to: String,
        #[arg(long)]
        note: String,
    },
    /// Print undelivered messages for a peer as response payloads
    Pending { peer_id_hash: String },
    /// Mark a message as handed over
    Ack { message_id: String },
    /// List peers seen so far, most recent first
    Encounters,
    /// List stored messages
    Messages {
        /// Only messages for this peer
        #[arg(long)]
        to: Option<String>,
        /// Only undelivered messages
        #[arg(long)]
        pending: bool,
    },
}

/// Writes payloads to stdout, one per line, for an external code display.
struct StdoutRenderer<W: Write> {
    out: W,
}

impl<W: Write> CodeRenderer for StdoutRenderer<W> {
    fn render(&mut self, payload: &str) {
        if let Err(e) = writeln!(self.out, "{payload}") {
            warn!(error = %e, "Failed to write payload");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(path) = &cli.db_path {
        config.storage.database_path = Some(path.clone());
    }
    if let Some(dir) = &cli.keys_dir {
        config.storage.keys_dir = Some(dir.clone());
    }
    if let Some(level) = &cli.log_level {
        config.logging.level.clone_from(level);
    }
    if cli.log_json {
        config.logging.json = true;
    }

    let log_filter = format!("qrpass={0},qrpass_node={0}", config.logging.level);
    qrpass_core::tracing_init::init_tracing(&log_filter, config.logging.json);

    let db_path = config
        .resolved_database_path()
        .context("Cannot determine message store path; pass --db-path")?;
    let keys_dir = config
        .resolved_keys_dir()
        .context("Cannot determine keys directory; pass --keys-dir")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        db = %db_path.display(),
        "Starting qrpass"
    );
    let db = Database::open(&db_path).await?;

    let result = run(cli.command, &db, &keys_dir, config.scan.debounce_ms).await;
    db.close().await;
    result
}

#[allow(clippy::too_many_lines)]
async fn run(
    command: Command,
    db: &Database,
    keys_dir: &std::path::Path,
    debounce_ms: u64,
) -> anyhow::Result<()> {
    let mut out = io::stdout();
    let mut renderer = StdoutRenderer { out: io::stdout() };
    let gossip = DeliveryCoordinator::new(db.clone());

    match command {
        Command::Beacon { rotate } => {
            let mut session = ExchangeSession::open_persistent(keys_dir)?;
            if rotate {
                session.rotate()?;
            }
            info!(peer_id_hash = %session.peer_id_hash(), "Showing beacon");
            renderer.render(&session.beacon()?.to_wire());
        }
        Command::Scan { text } => {
            let text = match text {
                Some(text) => text,
                None => {
                    let mut buf = String::new();
                    io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let session = ExchangeSession::open_persistent(keys_dir)?;
            let gate = ScanGate::new(Duration::from_millis(debounce_ms));
            let mut exchange = Exchange::new(db.clone(), gate);
            let outcome = exchange
                .handle_event(&session, CaptureEvent::Decoded(text), Instant::now())
                .await?;
            report(&mut out, &mut renderer, &outcome)?;
        }
        Command::Send { to, note } => {
            let session = ExchangeSession::open_persistent(keys_dir)?;
            let cleartext = json!({ "note": note });
            let prepared = prepare_message(&to, &cleartext)?;
            let id = store_prepared(db, &prepared, Some(&session.peer_id_hash()), Some(&cleartext))
                .await?;
            writeln!(out, "Stored message {id} for {}", prepared.to_peer_id_hash)?;
            renderer.render(&prepared.to_response()?.to_wire());
        }
        Command::Pending { peer_id_hash } => {
            let pending = gossip
                .pending_for(&PeerIdHash::from_encoded(peer_id_hash))
                .await?;
            if pending.is_empty() {
                writeln!(out, "No pending messages.")?;
            }
            render_pending(&mut out, &mut renderer, &pending)?;
        }
        Command::Ack { message_id } => {
            if gossip.acknowledge(&message_id).await? {
                writeln!(out, "Message {message_id} marked delivered.")?;
            } else {
                writeln!(out, "Message {message_id} was already delivered or does not exist.")?;
            }
        }
        Command::Encounters => {
            let encounters = db.list_encounters().await?;
            if encounters.is_empty() {
                writeln!(out, "No encounters yet.")?;
            } else {
                writeln!(out, "{:<24}  {:<14}  LAST SEEN", "PEER", "FIRST SEEN")?;
                for e in &encounters {
                    writeln!(
                        out,
                        "{:<24}  {:<14}  {}",
                        e.peer_id_hash, e.first_seen_at, e.last_seen_at
                    )?;
                }
            }
        }
        Command::Messages { to, pending } => {
            let filter = MessageFilter {
                to_peer_id_hash: to,
                delivered: pending.then_some(false),
            };
            let messages = db.list_messages(&filter).await?;
            if messages.is_empty() {
                writeln!(out, "No messages found.")?;
            } else {
                writeln!(out, "{:<36}  {:<24}  {:<9}  NOTE", "ID", "TO", "DELIVERED")?;
                for m in &messages {
                    let note = m
                        .cleartext()
                        .map_or_else(|| "-".to_string(), |v| v.to_string());
                    writeln!(
                        out,
                        "{:<36}  {:<24}  {:<9}  {note}",
                        m.id,
                        m.to_peer_id_hash,
                        if m.delivered { "yes" } else { "no" },
                    )?;
                }
            }
        }
    }
    Ok(())
}

fn report<W: Write>(
    out: &mut impl Write,
    renderer: &mut StdoutRenderer<W>,
    outcome: &ScanOutcome,
) -> anyhow::Result<()> {
    if let Some(message) = outcome.user_message() {
        writeln!(out, "{message}")?;
    }
    match outcome {
        ScanOutcome::BeaconSeen {
            peer_id_hash,
            beacon,
            pending,
            ..
        } => {
            writeln!(out, "Peer: {peer_id_hash}")?;
            if let Some(id) = beacon.id() {
                writeln!(out, "Beacon label: {id}")?;
            }
            writeln!(out, "Reply with: qrpass send --to {} --note <text>", beacon.epk_b64())?;
            render_pending(out, renderer, pending)?;
        }
        ScanOutcome::Decrypted { cleartext, .. } => {
            writeln!(out, "{cleartext}")?;
        }
        _ => {}
    }
    Ok(())
}

fn render_pending<W: Write>(
    out: &mut impl Write,
    renderer: &mut StdoutRenderer<W>,
    pending: &[StoredMessage],
) -> anyhow::Result<()> {
    for message in pending {
        match message.as_response() {
            Some(response) => {
                writeln!(out, "Message {}:", message.id)?;
                renderer.render(&response.to_wire());
            }
            None => warn!(message_id = %message.id, "Message cannot be shown as a response"),
        }
    }
    Ok(())
}
