//! WebSocket progress channel.
//!
//! Clients connect to `/ws` and exchange `{"event": ..., "data": ...}` frames.
//!
//! ```text
//!  client ──start-analysis──▶ Connection ──spawn──▶ run task
//!                                                     │ AnalysisEvent
//!                                                     ▼
//!  client ◀──writer task◀── outbox ◀────────────── RunSink ──▶ workshop room
//!                                                              (other members)
//! ```
//!
//! Each run executes on its own task, so a connection can keep sending
//! (join, leave, another workshop's run) while analysis is in progress.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use taskscope_core::orchestrator::CancelFlag;
use taskscope_core::{AnalysisEvent, AnalysisOptions, EventSink};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::rooms::{RoomFrame, RoomRegistry};
use crate::state::AppState;

// ─────────────────────────────────────────────────────────────────────────────
// Wire format
// ─────────────────────────────────────────────────────────────────────────────

/// Inbound message from the client
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    StartAnalysis(StartAnalysis),
    JoinWorkshop(WorkshopRef),
    LeaveWorkshop(WorkshopRef),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAnalysis {
    pub workshop_id: String,
    #[serde(default)]
    pub file_ids: Vec<String>,
    #[serde(default)]
    pub domains: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkshopRef {
    pub workshop_id: String,
}

#[derive(Serialize)]
struct Envelope<'a, T> {
    event: &'a str,
    data: T,
}

/// Serialize one outbound frame
pub fn frame<T: Serialize>(event: &str, data: T) -> String {
    serde_json::to_string(&Envelope { event, data }).unwrap_or_else(|e| {
        warn!(event, error = %e, "Failed to serialize frame");
        json!({ "event": "error", "data": { "message": "internal serialization error" } })
            .to_string()
    })
}

/// Outbound frame for an orchestrator event
pub fn event_frame(event: &AnalysisEvent) -> String {
    match event {
        AnalysisEvent::Progress { percent, message } => frame(
            "analysis-progress",
            json!({ "percent": percent, "message": message }),
        ),
        AnalysisEvent::FileStarted { file_id, filename } => frame(
            "file-analysis-start",
            json!({ "fileId": file_id, "filename": filename }),
        ),
        AnalysisEvent::TaskFound { task } => frame("task-analyzed", task),
        AnalysisEvent::FileCompleted {
            file_id,
            filename,
            task_count,
        } => frame(
            "file-analysis-complete",
            json!({ "fileId": file_id, "filename": filename, "taskCount": task_count }),
        ),
    }
}

fn error_frame(err: &taskscope_core::Error) -> String {
    frame("error", json!({ "message": err.to_string(), "error": err.code() }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Run sink
// ─────────────────────────────────────────────────────────────────────────────

/// Delivers a run's frames to the initiating connection and the workshop room
struct RunSink {
    outbox: mpsc::UnboundedSender<String>,
    rooms: Arc<RoomRegistry>,
    workshop_id: String,
    origin: Uuid,
}

impl RunSink {
    fn send(&self, frame: String) {
        self.rooms
            .publish(&self.workshop_id, self.origin, Arc::from(frame.as_str()));
        // The initiator may have disconnected; room members still get frames
        let _ = self.outbox.send(frame);
    }
}

impl EventSink for RunSink {
    fn emit(&self, event: AnalysisEvent) {
        self.send(event_frame(&event));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection
// ─────────────────────────────────────────────────────────────────────────────

struct Connection {
    id: Uuid,
    state: Arc<AppState>,
    outbox: mpsc::UnboundedSender<String>,
    /// Room forwarders by workshop ID
    rooms: HashMap<String, JoinHandle<()>>,
    runs: Vec<(CancelFlag, JoinHandle<()>)>,
    cancel_on_disconnect: bool,
}

impl Connection {
    fn new(state: Arc<AppState>, outbox: mpsc::UnboundedSender<String>) -> Self {
        let cancel_on_disconnect = state.config.cancel_on_disconnect;
        Self {
            id: Uuid::new_v4(),
            state,
            outbox,
            rooms: HashMap::new(),
            runs: Vec::new(),
            cancel_on_disconnect,
        }
    }

    fn send(&self, frame: String) {
        let _ = self.outbox.send(frame);
    }

    fn handle_text(&mut self, text: &str) {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(ClientMessage::StartAnalysis(req)) => self.start_analysis(req),
            Ok(ClientMessage::JoinWorkshop(r)) => self.join(r.workshop_id),
            Ok(ClientMessage::LeaveWorkshop(r)) => self.leave(r.workshop_id),
            Err(e) => {
                debug!(connection_id = %self.id, error = %e, "Invalid client message");
                self.send(frame(
                    "error",
                    json!({ "message": format!("invalid message: {}", e), "error": "BAD_MESSAGE" }),
                ));
            }
        }
    }

    fn start_analysis(&mut self, req: StartAnalysis) {
        self.runs.retain(|(_, handle)| !handle.is_finished());

        let cancel = CancelFlag::new();
        let options = AnalysisOptions {
            file_ids: req.file_ids,
            domains: req.domains,
            cancel: Some(cancel.clone()),
        };
        let sink = RunSink {
            outbox: self.outbox.clone(),
            rooms: self.state.rooms.clone(),
            workshop_id: req.workshop_id.clone(),
            origin: self.id,
        };
        let orchestrator = self.state.orchestrator.clone();
        let workshop_id = req.workshop_id;
        info!(connection_id = %self.id, workshop_id = %workshop_id, "Analysis requested");

        let handle = tokio::spawn(async move {
            match orchestrator
                .analyze_workshop(&workshop_id, &options, &sink)
                .await
            {
                Ok(summary) => sink.send(frame("analysis-complete", &summary)),
                Err(e) => sink.send(frame(
                    "analysis-error",
                    json!({ "message": e.to_string(), "error": e.code() }),
                )),
            }
        });
        self.runs.push((cancel, handle));
    }

    fn join(&mut self, workshop_id: String) {
        if let Err(e) = self.state.orchestrator.get_workshop(&workshop_id) {
            self.send(error_frame(&e));
            return;
        }
        if !self.rooms.contains_key(&workshop_id) {
            let rx = self.state.rooms.join(&workshop_id);
            let forwarder = forward_room(rx, self.id, self.outbox.clone());
            self.rooms.insert(workshop_id.clone(), forwarder);
        }
        debug!(connection_id = %self.id, workshop_id = %workshop_id, "Joined workshop room");
        self.send(frame(
            "workshop-joined",
            json!({
                "workshopId": workshop_id,
                "members": self.state.rooms.members(&workshop_id),
            }),
        ));
    }

    fn leave(&mut self, workshop_id: String) {
        if let Some(forwarder) = self.rooms.remove(&workshop_id) {
            forwarder.abort();
        }
        self.send(frame("workshop-left", json!({ "workshopId": workshop_id })));
    }

    fn close(self) {
        for forwarder in self.rooms.values() {
            forwarder.abort();
        }
        if self.cancel_on_disconnect {
            for (cancel, handle) in &self.runs {
                if !handle.is_finished() {
                    cancel.cancel();
                }
            }
        }
    }
}

/// Copy room frames from other connections into this connection's outbox
fn forward_room(
    rx: broadcast::Receiver<RoomFrame>,
    me: Uuid,
    outbox: mpsc::UnboundedSender<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut frames = BroadcastStream::new(rx);
        while let Some(item) = frames.next().await {
            match item {
                Ok(room_frame) if room_frame.origin == me => {}
                Ok(room_frame) => {
                    if outbox.send(room_frame.frame.to_string()).is_err() {
                        break;
                    }
                }
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(connection_id = %me, skipped, "Room subscriber lagged");
                }
            }
        }
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Handler
// ─────────────────────────────────────────────────────────────────────────────

/// Upgrade to a WebSocket. The auth middleware has already run.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut socket_tx, mut socket_rx) = socket.split();
    let (outbox, mut outbox_rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbox_rx.recv().await {
            if socket_tx.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    let mut conn = Connection::new(state.clone(), outbox);
    let open = state.ws_connections.fetch_add(1, Ordering::SeqCst) + 1;
    info!(connection_id = %conn.id, connections = open, "WebSocket client connected");

    while let Some(msg) = socket_rx.next().await {
        match msg {
            Ok(Message::Text(text)) => conn.handle_text(text.as_str()),
            Ok(Message::Close(_)) => break,
            // Binary, ping and pong are ignored
            Ok(_) => {}
            Err(e) => {
                debug!(connection_id = %conn.id, error = %e, "WebSocket receive failed");
                break;
            }
        }
    }

    let id = conn.id;
    conn.close();
    writer.abort();
    state.ws_connections.fetch_sub(1, Ordering::SeqCst);
    info!(connection_id = %id, "WebSocket client disconnected");
}
