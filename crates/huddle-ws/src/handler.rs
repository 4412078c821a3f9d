use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Duration;

use huddle_core::registry::RegistryError;
use huddle_core::{auth, identity, sanitize, AppState};
use huddle_models::gateway::*;
use huddle_models::{Identity, Participant, PeerInfo, UserType};

use crate::ratelimit::ChatRateLimiter;
use crate::session::Session;

const AUTH_TIMEOUT: Duration = Duration::from_secs(30);

/// Drives one signaling connection end to end. The first frame must be
/// `auth`; anything else, or silence past the timeout, closes the socket
/// without creating any state. Teardown runs exactly once on any exit.
pub async fn handle_connection(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let identity =
        match tokio::time::timeout(AUTH_TIMEOUT, wait_for_auth(&mut receiver, &state)).await {
            Ok(Some(identity)) => identity,
            _ => {
                let rejection = ServerEvent::error("authentication failed", CODE_AUTH_FAILED);
                if let Ok(text) = serde_json::to_string(&rejection) {
                    let _ = sender.send(Message::Text(text.into())).await;
                }
                let _ = sender.close().await;
                return;
            }
        };

    let session = Session::new(identity);
    tracing::info!(
        conn_id = %session.conn_id,
        user_id = %session.identity.user_id,
        user_type = session.identity.user_type.as_str(),
        "signaling connection authenticated"
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    state.connections.register(&session.conn_id, tx).await;

    let mut joined_room: Option<String> = None;
    let mut chat_limiter = ChatRateLimiter::new();

    loop {
        tokio::select! {
            frame = receiver.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientEvent>(&text) {
                            Ok(event) => {
                                handle_event(
                                    &state,
                                    &session,
                                    &mut joined_room,
                                    &mut chat_limiter,
                                    event,
                                )
                                .await;
                            }
                            Err(err) => {
                                tracing::debug!(conn_id = %session.conn_id, %err, "dropping malformed frame");
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        tracing::debug!(conn_id = %session.conn_id, %err, "transport error, closing");
                        break;
                    }
                }
            }
            outbound = rx.recv() => {
                match outbound {
                    Some(event) => match serde_json::to_string(&event) {
                        Ok(text) => {
                            if sender.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => {
                            tracing::error!(conn_id = %session.conn_id, %err, "failed to encode outbound event");
                        }
                    },
                    None => break,
                }
            }
        }
    }

    disconnect(&state, &session).await;
}

async fn wait_for_auth(
    receiver: &mut (impl StreamExt<Item = Result<Message, axum::Error>> + Unpin),
    state: &AppState,
) -> Option<Identity> {
    while let Some(Ok(msg)) = receiver.next().await {
        if let Message::Text(text) = msg {
            let Ok(ClientEvent::Auth(payload)) = serde_json::from_str::<ClientEvent>(&text)
            else {
                return None;
            };
            let credentials = identity::Credentials {
                token: payload.token,
                guest_session: payload.guest_session,
            };
            return identity::resolve(&state.db, &state.config.jwt_secret, &credentials)
                .await
                .ok();
        }
    }
    None
}

pub(crate) async fn handle_event(
    state: &AppState,
    session: &Session,
    joined_room: &mut Option<String>,
    chat_limiter: &mut ChatRateLimiter,
    event: ClientEvent,
) {
    match event {
        ClientEvent::Auth(_) => {
            tracing::debug!(conn_id = %session.conn_id, "ignoring repeated auth frame");
        }
        ClientEvent::Join(join) => handle_join(state, session, joined_room, join).await,
        ClientEvent::Message(chat) => {
            handle_chat(state, session, joined_room.as_deref(), chat_limiter, chat).await;
        }
        ClientEvent::Offer(payload) => {
            let event = ServerEvent::Offer(RelayedOffer {
                offer: payload.offer,
                from: session.conn_id.clone(),
                username: Some(session.identity.username.clone()),
            });
            relay(state, &session.conn_id, &payload.to, event).await;
        }
        ClientEvent::Answer(payload) => {
            let event = ServerEvent::Answer(RelayedAnswer {
                answer: payload.answer,
                from: session.conn_id.clone(),
            });
            relay(state, &session.conn_id, &payload.to, event).await;
        }
        ClientEvent::IceCandidate(payload) => {
            let event = ServerEvent::IceCandidate(RelayedIceCandidate {
                candidate: payload.candidate,
                from: session.conn_id.clone(),
            });
            relay(state, &session.conn_id, &payload.to, event).await;
        }
    }
}

async fn handle_join(
    state: &AppState,
    session: &Session,
    joined_room: &mut Option<String>,
    join: JoinPayload,
) {
    // Registered joins re-verify the token on every join, not just at the
    // handshake, so a revoked or expired token cannot ride an old socket
    // into new rooms.
    if join.user_type == UserType::Registered {
        let valid = join
            .token
            .as_deref()
            .and_then(|t| auth::validate_token(t, &state.config.jwt_secret).ok())
            .is_some_and(|claims| Some(claims.sub) == session.identity.account_id());
        if !valid {
            let event = ServerEvent::error("authentication failed", CODE_AUTH_FAILED);
            state.connections.send_to(&session.conn_id, event).await;
            return;
        }
    }

    // Membership is recorded under the server-verified identity, never the
    // client-asserted fields from the join payload.
    let outcome = state
        .registry
        .join_room(
            &session.conn_id,
            &join.room_id,
            &session.identity.user_id,
            &session.identity.username,
            session.identity.user_type,
        )
        .await;

    match outcome {
        Ok(outcome) => {
            *joined_room = Some(join.room_id.clone());
            let peers: Vec<PeerInfo> = outcome
                .participants
                .iter()
                .filter(|p| p.conn_id != session.conn_id)
                .map(peer_info)
                .collect();
            state
                .connections
                .send_to(&session.conn_id, ServerEvent::ExistingUsers(peers))
                .await;
            broadcast(
                state,
                &outcome.participants,
                &session.conn_id,
                ServerEvent::UserJoined(session.peer_info()),
            )
            .await;
            tracing::info!(
                conn_id = %session.conn_id,
                room_id = %join.room_id,
                participants = outcome.participants.len(),
                "participant joined room"
            );
        }
        Err(RegistryError::RoomNotFound) => {
            let event = ServerEvent::error("room not found", CODE_ROOM_NOT_FOUND);
            state.connections.send_to(&session.conn_id, event).await;
        }
        Err(err) => {
            tracing::warn!(conn_id = %session.conn_id, room_id = %join.room_id, %err, "join failed");
            let event = ServerEvent::error("failed to join room", CODE_JOIN_ROOM_ERROR);
            state.connections.send_to(&session.conn_id, event).await;
        }
    }
}

async fn handle_chat(
    state: &AppState,
    session: &Session,
    joined_room: Option<&str>,
    chat_limiter: &mut ChatRateLimiter,
    chat: ChatPayload,
) {
    let Some(room_id) = joined_room else {
        tracing::debug!(conn_id = %session.conn_id, "dropping chat from connection outside any room");
        return;
    };
    if chat.room != room_id {
        tracing::debug!(
            conn_id = %session.conn_id,
            claimed = %chat.room,
            actual = %room_id,
            "chat addressed to a room the sender is not in"
        );
    }

    let clean = sanitize::sanitize_message(&chat.message);
    if clean.is_empty() {
        return;
    }
    if !chat_limiter.check() {
        let event = ServerEvent::error("too many messages, slow down", CODE_RATE_LIMIT_EXCEEDED);
        state.connections.send_to(&session.conn_id, event).await;
        return;
    }

    // Stamped with the server-verified username, not the one the client sent.
    let event = ServerEvent::ReceiveMessage(ReceiveMessagePayload {
        message: clean,
        username: session.identity.username.clone(),
        id: session.conn_id.clone(),
    });
    let participants = state.registry.participants(room_id).await;
    broadcast(state, &participants, &session.conn_id, event).await;
}

/// Addressed point-to-point forward. No room-membership check: target ids
/// are only learned through existing-users/user-joined events, which scope
/// them to the room already. A vanished target drops the event.
async fn relay(state: &AppState, from: &str, to: &str, event: ServerEvent) {
    if !state.connections.send_to(to, event).await {
        tracing::debug!(from, to, "dropping signal for disconnected target");
    }
}

pub(crate) async fn disconnect(state: &AppState, session: &Session) {
    state.connections.unregister(&session.conn_id).await;
    if let Some(vacated) = state.registry.leave_room(&session.conn_id).await {
        let remaining = state.registry.participants(&vacated.room_id).await;
        broadcast(
            state,
            &remaining,
            &session.conn_id,
            ServerEvent::UserLeft(UserLeftPayload {
                socket_id: session.conn_id.clone(),
            }),
        )
        .await;
        tracing::info!(
            conn_id = %session.conn_id,
            room_id = %vacated.room_id,
            "participant disconnected"
        );
    }
}

async fn broadcast(state: &AppState, participants: &[Participant], exclude: &str, event: ServerEvent) {
    for participant in participants {
        if participant.conn_id == exclude {
            continue;
        }
        state
            .connections
            .send_to(&participant.conn_id, event.clone())
            .await;
    }
}

fn peer_info(participant: &Participant) -> PeerInfo {
    PeerInfo {
        id: participant.conn_id.clone(),
        username: participant.username.clone(),
        user_type: participant.user_type,
    }
}
