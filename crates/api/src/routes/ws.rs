//! Live event WebSocket
//!
//! Actor headers are optional here. Alert events follow the same category
//! visibility as the alert list: critical alerts reach privileged observers
//! only.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, warn};

use broadcast::{BroadcastEvent, BroadcastRegistry, EventKind};
use storage::Category;

use crate::auth::CurrentActor;
use crate::AppState;

pub async fn events(
    State(state): State<Arc<AppState>>,
    actor: Option<CurrentActor>,
    ws: WebSocketUpgrade,
) -> Response {
    let registry = state.registry.clone();
    let privileged = actor.is_some_and(|CurrentActor(actor)| actor.role.is_privileged());
    ws.on_upgrade(move |socket| handle_socket(socket, registry, privileged))
}

/// Whether an observer may see the event
fn visible_to(event: &BroadcastEvent, privileged: bool) -> bool {
    match event.kind {
        EventKind::SensorUpdate => true,
        EventKind::AlertCreated | EventKind::AlertUpdated => {
            privileged
                || event.data["category"]
                    .as_str()
                    .and_then(|c| c.parse::<Category>().ok())
                    .is_some_and(Category::is_public)
        }
    }
}

/// Forward registry events until either side goes away
async fn handle_socket(mut socket: WebSocket, registry: BroadcastRegistry, privileged: bool) {
    let mut observer = match registry.connect().await {
        Ok(observer) => observer,
        Err(e) => {
            warn!("Rejecting event socket: {}", e);
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };
    let id = observer.id();
    debug!(%id, privileged, "Event socket connected");

    loop {
        tokio::select! {
            event = observer.recv() => {
                // None means the registry dropped us as a slow consumer
                let Some(event) = event else { break };
                if !visible_to(&event, privileged) {
                    continue;
                }
                let payload = match event.to_json() {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(%id, "Failed to encode event: {}", e);
                        continue;
                    }
                };
                if socket.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
            message = socket.recv() => {
                match message {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    if let Err(e) = registry.unregister(id).await {
        debug!(%id, "Unregister after disconnect failed: {}", e);
    }
    debug!(%id, "Event socket closed");
}
