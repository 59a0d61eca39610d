//! Session gateway - authenticated WebSocket sessions
//!
//! GET /api/ws?token=<JWT>
//! Auth: the JWT travels in a query parameter because browser
//! WebSockets cannot set custom headers.
//!
//! Protocol:
//! - server -> client: [`ServerFrame`] (Ready, Event, ActionResult, Error)
//! - client -> server: [`ClientFrame`] (actions mirroring the REST
//!   surface, plus Ping)
//!
//! One gateway session per connection. The session registers with the
//! registry on upgrade, pumps its event queue onto the wire in arrival
//! order, relays inbound action frames into the engines, and is
//! disconnected after a configured idle window without any inbound
//! frame. Reconnection is stateless: there is no replay, the client
//! re-fetches current state over HTTP.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio::time::{Duration, Instant, interval, sleep};

use shared::frame::{ClientFrame, ServerFrame};

use crate::auth::{CurrentUser, JwtError};
use crate::core::ServerState;
use crate::trades::TradeError;
use crate::utils::AppError;

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/ws", get(handle_ws))
}

#[derive(Deserialize)]
pub struct WsAuthQuery {
    token: String,
}

/// GET /api/ws?token=<JWT>
pub async fn handle_ws(
    State(state): State<ServerState>,
    Query(query): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    // Authenticate once at connection time; a bad credential refuses
    // the upgrade outright.
    let claims = state.jwt_service.validate_token(&query.token).map_err(|e| {
        tracing::debug!("Gateway WS JWT validation failed: {e}");
        match e {
            JwtError::ExpiredToken => AppError::token_expired(),
            _ => AppError::invalid_token("Invalid token"),
        }
    })?;
    let user = CurrentUser::from(claims);

    Ok(ws.on_upgrade(move |socket| gateway_session(socket, state, user)))
}

async fn gateway_session(socket: WebSocket, state: ServerState, user: CurrentUser) {
    let (mut sink, mut stream) = socket.split();
    let (handle, mut queue_rx) = state.registry.register(&user.id);

    tracing::info!(user_id = %user.id, session_id = %handle.session_id(), "Gateway session connected");

    let ready = ServerFrame::Ready {
        epoch: state.epoch().to_string(),
        user_id: user.id.clone(),
        session_id: handle.session_id().to_string(),
    };
    if send_frame(&mut sink, &ready).await.is_err() {
        state.registry.deregister(&user.id, handle.session_id());
        return;
    }

    let idle_window = Duration::from_secs(state.config.session_idle_timeout_secs);
    let mut ping_interval = interval(Duration::from_secs(state.config.session_ping_interval_secs));
    ping_interval.tick().await; // skip immediate

    let idle = sleep(idle_window);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            _ = state.shutdown_token().cancelled() => {
                tracing::info!(user_id = %user.id, "Gateway session shutting down");
                break;
            }

            _ = &mut idle => {
                tracing::info!(user_id = %user.id, "Session idle timeout, disconnecting");
                break;
            }

            _ = ping_interval.tick() => {
                if sink.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }

            frame = queue_rx.recv() => {
                match frame {
                    Ok(frame) => {
                        if send_frame(&mut sink, &frame).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Queue overflowed and shed its oldest frames.
                        // Capacity signal only: the client reconciles
                        // through authoritative reads.
                        tracing::warn!(
                            user_id = %user.id,
                            skipped = n,
                            "Session queue overflow, oldest events dropped"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        idle.as_mut().reset(Instant::now() + idle_window);
                        match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(ClientFrame::Ping) => {}
                            Ok(frame) => {
                                // The action completes even if the
                                // socket dies while it runs; only the
                                // reply send can fail.
                                let reply = dispatch_action(&state, &user, frame).await;
                                if send_frame(&mut sink, &reply).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                let reply = ServerFrame::Error {
                                    message: format!("Malformed frame: {e}"),
                                };
                                if send_frame(&mut sink, &reply).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Pong(_))) | Some(Ok(Message::Ping(_))) => {
                        idle.as_mut().reset(Instant::now() + idle_window);
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    state.registry.deregister(&user.id, handle.session_id());
    tracing::info!(user_id = %user.id, session_id = %handle.session_id(), "Gateway session disconnected");
}

/// Relay a client action frame into the engines
async fn dispatch_action(
    state: &ServerState,
    user: &CurrentUser,
    frame: ClientFrame,
) -> ServerFrame {
    match frame {
        ClientFrame::Propose {
            action_id,
            item_id,
            conversation_id,
        } => {
            let result = state
                .proposals
                .propose(&user.id, &item_id, conversation_id)
                .await;
            action_result(action_id, result)
        }
        ClientFrame::AcceptProposal {
            action_id,
            request_id,
        } => {
            let result = state.proposals.accept(&request_id, &user.id).await.map(
                |(buy_request, transaction)| {
                    serde_json::json!({
                        "buy_request": buy_request,
                        "transaction": transaction,
                    })
                },
            );
            action_result(action_id, result)
        }
        ClientFrame::RejectProposal {
            action_id,
            request_id,
        } => action_result(action_id, state.proposals.reject(&request_id, &user.id).await),
        ClientFrame::CancelProposal {
            action_id,
            request_id,
        } => action_result(action_id, state.proposals.cancel(&request_id, &user.id).await),
        ClientFrame::SetMeetup {
            action_id,
            transaction_id,
            time,
            place,
        } => action_result(
            action_id,
            state
                .transactions
                .set_meetup(&transaction_id, &user.id, time, &place)
                .await,
        ),
        ClientFrame::ConfirmCompletion {
            action_id,
            transaction_id,
        } => action_result(
            action_id,
            state
                .transactions
                .confirm_completion(&transaction_id, &user.id)
                .await,
        ),
        ClientFrame::ConfirmCancellation {
            action_id,
            transaction_id,
        } => action_result(
            action_id,
            state
                .transactions
                .confirm_cancellation(&transaction_id, &user.id)
                .await,
        ),
        ClientFrame::Ping => ServerFrame::ActionResult {
            action_id: String::new(),
            success: true,
            error: None,
            data: None,
        },
    }
}

fn action_result<T: serde::Serialize>(
    action_id: String,
    result: Result<T, TradeError>,
) -> ServerFrame {
    match result {
        Ok(data) => ServerFrame::ActionResult {
            action_id,
            success: true,
            error: None,
            data: serde_json::to_value(data).ok(),
        },
        Err(e) => ServerFrame::ActionResult {
            action_id,
            success: false,
            error: Some(e.to_string()),
            data: None,
        },
    }
}

async fn send_frame<S>(sink: &mut S, frame: &ServerFrame) -> Result<(), ()>
where
    S: futures::Sink<Message, Error = axum::Error> + Unpin,
{
    let json = serde_json::to_string(frame).map_err(|_| ())?;
    sink.send(Message::Text(json.into())).await.map_err(|_| ())
}
