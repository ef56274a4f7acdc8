use crate::game::types::ActorId;
use crate::protocol::{decode_client_message, ClientMessage, ServerMessage};
use crate::session::registry::SessionRegistry;
use crate::session::{Session, SessionError};
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use uuid::Uuid;

struct Attachment {
    session: Arc<Session>,
    player: Option<ActorId>,
}

pub async fn handle_socket(socket: WebSocket, registry: Arc<SessionRegistry>) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let connection_id = Uuid::new_v4();

    let mut send_task = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if sender.send(Message::Text(payload)).await.is_err() {
                return;
            }
        }
        let _ = sender.close().await;
    });

    let attachment = handshake(&mut receiver, &registry, connection_id, &tx).await;
    // The session holds its own sender from here on; once it goes away the
    // send task drains and closes the socket.
    drop(tx);
    let Some(attachment) = attachment else {
        let _ = send_task.await;
        return;
    };

    loop {
        tokio::select! {
            _ = &mut send_task => break,
            result = receiver.next() => {
                let Some(Ok(message)) = result else { break };
                match message {
                    Message::Text(text) => {
                        if !forward_play(&attachment, connection_id, &text) {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    attachment.session.detach(connection_id);
    send_task.abort();
}

/// Waits for the first text frame and attaches the connection as creator,
/// player or observer. Failures are reported to the client before returning
/// `None`.
async fn handshake(
    receiver: &mut SplitStream<WebSocket>,
    registry: &SessionRegistry,
    connection_id: Uuid,
    tx: &UnboundedSender<String>,
) -> Option<Attachment> {
    let text = loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => break text,
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
            Some(Ok(_)) => continue,
        }
    };

    let Some(message) = decode_client_message(&text) else {
        send_error(tx, "expected a create, join or observe message");
        return None;
    };

    let result = match message {
        ClientMessage::Create {
            session_id,
            rows,
            cols,
        } => create_and_observe(registry, &session_id, rows, cols, connection_id, tx),
        ClientMessage::Join {
            session_id,
            user_id,
        } => join(registry, &session_id, user_id, connection_id, tx).await,
        ClientMessage::Observe { session_id, .. } => registry.get(&session_id).and_then(|session| {
            session.observe(connection_id, tx.clone())?;
            Ok(Attachment {
                session,
                player: None,
            })
        }),
        ClientMessage::Play { .. } => {
            send_error(tx, "join a session before playing");
            return None;
        }
    };

    match result {
        Ok(attachment) => Some(attachment),
        Err(error) => {
            tracing::debug!(%connection_id, %error, "handshake rejected");
            send_error(tx, &error.to_string());
            None
        }
    }
}

fn create_and_observe(
    registry: &SessionRegistry,
    session_id: &str,
    rows: Option<i32>,
    cols: Option<i32>,
    connection_id: Uuid,
    tx: &UnboundedSender<String>,
) -> Result<Attachment, SessionError> {
    let session = registry.create(session_id, rows, cols)?;
    if let Ok(payload) = (ServerMessage::Created {
        session_id: session.name(),
    })
    .encode()
    {
        let _ = tx.send(payload);
    }
    session.observe(connection_id, tx.clone())?;
    Ok(Attachment {
        session,
        player: None,
    })
}

async fn join(
    registry: &SessionRegistry,
    session_id: &str,
    user_id: ActorId,
    connection_id: Uuid,
    tx: &UnboundedSender<String>,
) -> Result<Attachment, SessionError> {
    let session = registry.get(session_id)?;
    session.join(connection_id, user_id, tx.clone()).await?;
    Ok(Attachment {
        session,
        player: Some(user_id),
    })
}

/// Returns false once the session is gone.
fn forward_play(attachment: &Attachment, connection_id: Uuid, text: &str) -> bool {
    let Some(ClientMessage::Play { user_id, direction }) = decode_client_message(text) else {
        return true;
    };
    let Some(actor_id) = attachment.player else { return true };
    if user_id != actor_id {
        tracing::debug!(user_id, actor_id, "ignoring play for another snake");
        return true;
    }
    attachment
        .session
        .enqueue_input(connection_id, actor_id, direction)
        .is_ok()
}

fn send_error(tx: &UnboundedSender<String>, message: &str) {
    if let Ok(payload) = (ServerMessage::Error { message }).encode() {
        let _ = tx.send(payload);
    }
}
