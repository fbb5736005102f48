//! Per-connection recognition sessions.
//!
//! Each accepted websocket runs this loop in its own task: receive one
//! binary frame, run the recognition pipeline on a blocking worker, send one
//! text reply, repeat. At most one frame is in flight per connection, which
//! makes replies arrive in request order; other connections proceed
//! independently. A peer that disappears mid-send is an expected outcome,
//! handled by closing this session quietly.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use bytes::Bytes;

use crate::recognize::recognize_frame;
use crate::server::state::AppState;
use crate::types::UNKNOWN_LABEL;

/// Websocket upgrade handler for `GET /recognize`.
pub async fn ws_recognize(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| session(socket, state))
}

async fn session(mut socket: WebSocket, state: Arc<AppState>) {
    tracing::debug!("recognition session opened");

    while let Some(message) = socket.recv().await {
        let message = match message {
            Ok(message) => message,
            Err(err) => {
                tracing::debug!(error = %err, "connection error, closing session");
                break;
            }
        };

        let reply = match message {
            Message::Binary(frame) => Some(process_frame(state.clone(), frame).await),
            Message::Text(_) => {
                Some(error_reply("UNSUPPORTED_MESSAGE", "expected a binary image frame"))
            }
            // Ping/pong are answered by the protocol layer.
            Message::Ping(_) | Message::Pong(_) => None,
            Message::Close(_) => break,
        };

        if let Some(reply) = reply {
            if socket.send(Message::Text(reply.into())).await.is_err() {
                // Peer already closed; not a service error.
                tracing::debug!("peer closed before reply could be delivered");
                break;
            }
        }
    }

    tracing::debug!("recognition session closed");
}

/// Run one frame on a blocking worker. The classifier is only read, so no
/// lock is held across the call and sibling connections are unaffected.
async fn process_frame(state: Arc<AppState>, frame: Bytes) -> String {
    metrics::counter!("frames_received_total").increment(1);

    match tokio::task::spawn_blocking(move || frame_reply(&state, &frame)).await {
        Ok(reply) => reply,
        Err(err) => {
            tracing::error!(error = %err, "frame worker failed");
            error_reply("INTERNAL_ERROR", "frame processing failed")
        }
    }
}

/// Serialize the outcome of one frame: either the prediction array or an
/// error marker. Failures are scoped to the frame; the session continues.
pub(crate) fn frame_reply(state: &AppState, bytes: &[u8]) -> String {
    match recognize_frame(
        &state.classifier,
        state.extractor.as_ref(),
        state.config.distance_threshold,
        bytes,
    ) {
        Ok(predictions) => {
            let unknown = predictions
                .iter()
                .filter(|p| p.name == UNKNOWN_LABEL)
                .count();
            metrics::counter!("frames_processed_total").increment(1);
            metrics::counter!("faces_unknown_total").increment(unknown as u64);
            metrics::counter!("faces_recognized_total")
                .increment((predictions.len() - unknown) as u64);

            match serde_json::to_string(&predictions) {
                Ok(reply) => reply,
                Err(err) => {
                    tracing::error!(error = %err, "prediction serialization failed");
                    error_reply("INTERNAL_ERROR", "reply serialization failed")
                }
            }
        }
        Err(err) => {
            metrics::counter!("frame_errors_total", "code" => err.code()).increment(1);
            tracing::warn!(code = err.code(), error = %err, "frame failed");
            error_reply(err.code(), &err.to_string())
        }
    }
}

fn error_reply(code: &str, message: &str) -> String {
    serde_json::json!({
        "error": {
            "code": code,
            "message": message,
        }
    })
    .to_string()
}
