//! Local WebSocket feed of published snapshots.

use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::broadcast;
use tokio_tungstenite::accept_async;
use tracing::{debug, info, warn};
use tungstenite::Message;

use crate::sink::SnapshotSink;
use crate::snapshot::EvaluationSnapshot;

#[derive(Debug, Serialize)]
pub struct TelemetryPacket<'a> {
    pub msg_type: &'static str, // "SNAPSHOT"
    pub timestamp: i64,         // publish time (ms)
    pub snapshot: &'a EvaluationSnapshot,
}

impl<'a> TelemetryPacket<'a> {
    pub fn snapshot(snapshot: &'a EvaluationSnapshot) -> Self {
        Self {
            msg_type: "SNAPSHOT",
            timestamp: snapshot.completed_at.timestamp_millis(),
            snapshot,
        }
    }
}

/// Pushes every snapshot as JSON to connected WebSocket clients.
pub struct TelemetryServer {
    tx: broadcast::Sender<String>,
    // Replayed to clients that connect between ticks.
    latest: Arc<RwLock<Option<String>>>,
    local_addr: SocketAddr,
}

impl TelemetryServer {
    /// Binds `addr` and starts accepting clients in the background.
    pub async fn bind(addr: impl ToSocketAddrs) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        // Lossy ring buffer: a slow client misses packets, the scheduler never blocks.
        let (tx, _rx) = broadcast::channel(64);
        let latest = Arc::new(RwLock::new(None));

        info!("📡 [Telemetry] Server running on ws://{}", local_addr);
        let tx_clone = tx.clone();
        let latest_clone = latest.clone();
        tokio::spawn(async move {
            while let Ok((stream, peer)) = listener.accept().await {
                debug!("📡 [Telemetry] Client connected: {}", peer);
                let tx_inner = tx_clone.clone();
                let latest_inner = latest_clone.clone();
                tokio::spawn(async move {
                    handle_connection(stream, tx_inner, latest_inner).await;
                });
            }
        });

        Ok(Self { tx, latest, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn send(&self, packet: TelemetryPacket<'_>) {
        let msg = match serde_json::to_string(&packet) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("📡 [Telemetry] Failed to serialize snapshot: {}", e);
                return;
            }
        };
        if let Ok(mut latest) = self.latest.write() {
            *latest = Some(msg.clone());
        }
        // Err only means nobody is listening right now.
        let _ = self.tx.send(msg);
    }
}

impl SnapshotSink for TelemetryServer {
    fn publish(&self, snapshot: &Arc<EvaluationSnapshot>) {
        self.send(TelemetryPacket::snapshot(snapshot));
    }
}

async fn handle_connection(
    stream: TcpStream,
    tx: broadcast::Sender<String>,
    latest: Arc<RwLock<Option<String>>>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let (mut ws_sender, _ws_receiver) = ws_stream.split();
    let mut rx = tx.subscribe();

    let replay = latest.read().ok().and_then(|l| l.clone());
    if let Some(msg) = replay {
        if ws_sender.send(Message::Text(msg.into())).await.is_err() {
            return;
        }
    }

    loop {
        match rx.recv().await {
            Ok(msg) => {
                if ws_sender.send(Message::Text(msg.into())).await.is_err() {
                    // Client went away.
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("📡 [Telemetry] Client lagged, skipped {} snapshots", skipped);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => {
                break;
            }
        }
    }
}
