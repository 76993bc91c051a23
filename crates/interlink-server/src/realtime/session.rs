//! One WebSocket session: handshake authentication, a writer task fed by the
//! registry queue, and a reader loop that turns client frames into actions.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tracing::{debug, warn};

use interlink_shared::protocol::{ClientEvent, ServerEvent, StatusPayload, TypingPayload};
use interlink_shared::room::room_key;
use interlink_shared::UserId;
use interlink_store::Account;

use crate::api::AppState;
use crate::auth::AuthUser;
use crate::realtime::dispatcher::SendCommand;
use crate::realtime::registry::Connection;

/// `GET /ws`. The credential is checked by the extractor before the upgrade,
/// so a rejected handshake never registers a connection.
pub async fn ws_handler(
    State(state): State<AppState>,
    AuthUser(account): AuthUser,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| run_session(socket, state, account))
}

async fn run_session(socket: WebSocket, state: AppState, account: Account) {
    let (conn, mut outbound) = state
        .registry
        .register(account.id, account.role, account.full_name())
        .await;
    let (mut sink, mut stream) = socket.split();
    debug!(conn = %conn.id, user = %conn.user_id, role = %conn.role, "session started");

    let writer = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, event = event.name(), "failed to encode event");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => handle_event(&state, &account, &conn, event).await,
                Err(e) => {
                    debug!(conn = %conn.id, error = %e, "malformed frame");
                    state
                        .registry
                        .emit_to_connection(conn.id, ServerEvent::error("Invalid event"))
                        .await;
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(conn = %conn.id, error = %e, "socket error");
                break;
            }
        }
    }

    state.registry.unregister(conn.id).await;
    writer.abort();
}

/// Act on one decoded client event. Errors are reported to the originating
/// connection only.
pub async fn handle_event(state: &AppState, account: &Account, conn: &Connection, event: ClientEvent) {
    let registry = &state.registry;

    match event {
        ClientEvent::JoinConversation(target) => {
            registry.join_conversation(conn, &target.other_user_id).await;
        }
        ClientEvent::LeaveConversation(target) => {
            registry.leave_conversation(conn, &target.other_user_id).await;
        }
        ClientEvent::SendMessage(req) => {
            let command = SendCommand {
                recipient_id: req.to_user_id,
                body: req.message,
                kind: req.message_type,
                attachment: req.attachment,
            };
            if let Err(e) = state.dispatcher.send(account, Some(conn), command).await {
                debug!(conn = %conn.id, error = %e, "send rejected");
                registry
                    .emit_to_connection(
                        conn.id,
                        ServerEvent::error(e.client_message("Failed to send message")),
                    )
                    .await;
            }
        }
        ClientEvent::TypingStart(target) => relay_typing(state, conn, &target.to_user_id, true).await,
        ClientEvent::TypingStop(target) => relay_typing(state, conn, &target.to_user_id, false).await,
        ClientEvent::MarkMessagesRead(req) => {
            if let Err(e) = state
                .reconciler
                .mark_read_realtime(&account.id, &req.from_user_id)
                .await
            {
                warn!(conn = %conn.id, error = %e, "mark read failed");
                registry
                    .emit_to_connection(
                        conn.id,
                        ServerEvent::error(e.client_message("Failed to mark messages as read")),
                    )
                    .await;
            }
        }
        ClientEvent::UpdateStatus(update) => {
            registry
                .broadcast_except(
                    conn.id,
                    &ServerEvent::UserStatusUpdate(StatusPayload {
                        user_id: account.id,
                        status: update.status,
                    }),
                )
                .await;
        }
        ClientEvent::Ping => {
            registry.emit_to_connection(conn.id, ServerEvent::Pong).await;
        }
    }
}

async fn relay_typing(state: &AppState, conn: &Connection, to: &UserId, is_typing: bool) {
    state
        .registry
        .emit_to_room(
            &room_key(&conn.user_id, to),
            &ServerEvent::UserTyping(TypingPayload {
                user_id: conn.user_id,
                user_name: conn.display_name.clone(),
                is_typing,
            }),
            Some(conn.id),
        )
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use interlink_shared::protocol::{
        ConversationTarget, MarkReadRequest, SendMessageRequest, StatusUpdate, TypingTarget,
    };
    use interlink_shared::types::Role;

    use crate::test_support::{drain, TestHarness};

    fn send_event(to: UserId, body: &str) -> ClientEvent {
        ClientEvent::SendMessage(SendMessageRequest {
            to_user_id: to,
            message: body.to_string(),
            message_type: None,
            attachment: None,
        })
    }

    #[tokio::test]
    async fn test_conversation_flow_between_two_sessions() {
        let harness = TestHarness::new();
        let state = &harness.state;
        let a = harness.account(Role::Student, "Ada", "Lovelace").await;
        let b = harness.account(Role::Company, "Acme Robotics", "").await;
        let (conn_a, mut rx_a) = harness.connect(&a).await;
        let (conn_b, mut rx_b) = harness.connect(&b).await;

        handle_event(state, &a, &conn_a, ClientEvent::JoinConversation(ConversationTarget { other_user_id: b.id })).await;
        handle_event(state, &b, &conn_b, ClientEvent::JoinConversation(ConversationTarget { other_user_id: a.id })).await;

        handle_event(state, &a, &conn_a, ClientEvent::TypingStart(TypingTarget { to_user_id: b.id })).await;
        match drain(&mut rx_b).as_slice() {
            [ServerEvent::UserTyping(p)] => {
                assert_eq!(p.user_id, a.id);
                assert_eq!(p.user_name, "Ada Lovelace");
                assert!(p.is_typing);
            }
            other => panic!("unexpected events: {other:?}"),
        }
        // Typing is never echoed back to the typist.
        assert!(drain(&mut rx_a).is_empty());

        handle_event(state, &a, &conn_a, send_event(b.id, "Hello")).await;
        let events_b = drain(&mut rx_b);
        assert!(matches!(events_b.as_slice(), [ServerEvent::NewMessage(_)]));
        let events_a = drain(&mut rx_a);
        assert!(matches!(
            events_a.as_slice(),
            [ServerEvent::NewMessage(_), ServerEvent::MessageSent(_)]
        ));

        handle_event(state, &b, &conn_b, ClientEvent::MarkMessagesRead(MarkReadRequest { from_user_id: a.id })).await;
        match drain(&mut rx_a).as_slice() {
            [ServerEvent::MessagesRead(p)] => assert_eq!(p.read_by, b.id),
            other => panic!("unexpected events: {other:?}"),
        }
        assert_eq!(state.reconciler.unread_count(&b.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_validation_error_reaches_origin_only() {
        let harness = TestHarness::new();
        let state = &harness.state;
        let a = harness.account(Role::Student, "Ada", "Lovelace").await;
        let b = harness.account(Role::Company, "Acme Robotics", "").await;
        let (conn_a, mut rx_a) = harness.connect(&a).await;
        let (_conn_b, mut rx_b) = harness.connect(&b).await;

        handle_event(state, &a, &conn_a, send_event(b.id, "   ")).await;

        match drain(&mut rx_a).as_slice() {
            [ServerEvent::Error(e)] => assert_eq!(e.message, "Message cannot be empty"),
            other => panic!("unexpected events: {other:?}"),
        }
        assert!(drain(&mut rx_b).is_empty());
        assert_eq!(state.db.lock().await.message_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_leave_stops_room_delivery() {
        let harness = TestHarness::new();
        let state = &harness.state;
        let a = harness.account(Role::Student, "Ada", "Lovelace").await;
        let b = harness.account(Role::Company, "Acme Robotics", "").await;
        let (conn_a, _rx_a) = harness.connect(&a).await;
        let (conn_b, mut rx_b) = harness.connect(&b).await;

        handle_event(state, &a, &conn_a, ClientEvent::JoinConversation(ConversationTarget { other_user_id: b.id })).await;
        handle_event(state, &b, &conn_b, ClientEvent::JoinConversation(ConversationTarget { other_user_id: a.id })).await;
        handle_event(state, &b, &conn_b, ClientEvent::LeaveConversation(ConversationTarget { other_user_id: a.id })).await;

        handle_event(state, &a, &conn_a, send_event(b.id, "still there?")).await;
        assert!(drain(&mut rx_b).is_empty());
    }

    #[tokio::test]
    async fn test_status_broadcast_and_ping() {
        let harness = TestHarness::new();
        let state = &harness.state;
        let a = harness.account(Role::Student, "Ada", "Lovelace").await;
        let b = harness.account(Role::Admin, "Grace", "Hopper").await;
        let (conn_a, mut rx_a) = harness.connect(&a).await;
        let (_conn_b, mut rx_b) = harness.connect(&b).await;

        handle_event(state, &a, &conn_a, ClientEvent::UpdateStatus(StatusUpdate { status: "away".into() })).await;
        match drain(&mut rx_b).as_slice() {
            [ServerEvent::UserStatusUpdate(p)] => {
                assert_eq!(p.user_id, a.id);
                assert_eq!(p.status, "away");
            }
            other => panic!("unexpected events: {other:?}"),
        }
        assert!(drain(&mut rx_a).is_empty());

        handle_event(state, &a, &conn_a, ClientEvent::Ping).await;
        assert!(matches!(drain(&mut rx_a).as_slice(), [ServerEvent::Pong]));
    }

    #[tokio::test]
    async fn test_disconnect_broadcasts_offline() {
        let harness = TestHarness::new();
        let a = harness.account(Role::Student, "Ada", "Lovelace").await;
        let b = harness.account(Role::Company, "Acme Robotics", "").await;
        let (conn_a, _rx_a) = harness.connect(&a).await;
        let (_conn_b, mut rx_b) = harness.connect(&b).await;

        harness.state.registry.unregister(conn_a.id).await;

        match drain(&mut rx_b).as_slice() {
            [ServerEvent::UserOffline(p)] => assert_eq!(p.user_id, a.id),
            other => panic!("unexpected events: {other:?}"),
        }
        assert!(harness.state.registry.find_live_connection(&a.id).await.is_none());
    }
}
