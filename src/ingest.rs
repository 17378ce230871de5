//! Streaming upload endpoint.
//!
//! One WebSocket connection carries one upload: a sequence of binary
//! [`UploadFrame`]s holding chunks, closed by an `end` frame. The server
//! answers with a single [`UploadStatus`] and closes the socket.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use bytes::Bytes;
use futures::{SinkExt, Stream, StreamExt};
use prost::Message as ProstMessage;
use std::fmt::Display;
use tracing::{debug, instrument};

use crate::error::SessionError;
use crate::proto::{upload_frame::Payload, UploadFrame, UploadRequest, UploadStatus};
use crate::session::STREAM_PREFIX;
use crate::state::AppState;

/// Create the ingestion router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/upload", get(upload_ws))
        .with_state(state)
}

async fn upload_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_upload(socket, state))
}

#[derive(Debug)]
pub(crate) enum Inbound {
    Chunk(UploadRequest),
    End,
}

/// Decodes one binary frame. Anything undecodable is a stream error.
pub(crate) fn decode_frame(data: Bytes) -> Result<Inbound, SessionError> {
    let frame = UploadFrame::decode(data)
        .map_err(|err| SessionError::transport(format!("malformed frame: {err}")))?;

    match frame.payload {
        Some(Payload::Chunk(chunk)) => Ok(Inbound::Chunk(chunk)),
        Some(Payload::End(_)) => Ok(Inbound::End),
        None => Err(SessionError::transport("frame without payload")),
    }
}

/// Next upload frame from the socket. Text, ping and pong messages carry
/// nothing for the upload and are skipped.
async fn next_inbound<S, E>(inbound: &mut S) -> Result<Inbound, SessionError>
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        match inbound.next().await {
            Some(Ok(Message::Binary(data))) => return decode_frame(data),
            Some(Ok(Message::Close(_))) | None => {
                return Err(SessionError::transport("stream closed before end of upload"))
            }
            Some(Ok(_)) => continue,
            Some(Err(err)) => return Err(SessionError::transport(err.to_string())),
        }
    }
}

#[instrument(skip_all)]
async fn handle_upload(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let status = receive_upload(&mut receiver, &state).await;

    let reply = Message::Binary(status.encode_to_vec().into());
    if let Err(err) = sender.send(reply).await {
        debug!(message = "Failed to deliver upload status", error = %err);
        return;
    }
    let _ = sender.send(Message::Close(None)).await;
}

/// Drives one upload session from the inbound half of a socket until the
/// client sends `end`, the stream fails, or the session does.
async fn receive_upload<S, E>(inbound: &mut S, state: &AppState) -> UploadStatus
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let mut session = state.session(STREAM_PREFIX);

    loop {
        match next_inbound(inbound).await {
            Ok(Inbound::Chunk(chunk)) => {
                if let Err(err) = session.receive(&chunk.filename, &chunk.content).await {
                    return UploadStatus::failed(&err, session.video_id());
                }
            }
            Ok(Inbound::End) => {
                return match session.finish().await {
                    Ok(admitted) => UploadStatus::admitted(admitted.video_id),
                    Err(err) => UploadStatus::failed(&err, None),
                };
            }
            Err(err) => {
                let status = UploadStatus::failed(&err, session.video_id());
                session.abort(&err);
                return status;
            }
        }
    }
}
