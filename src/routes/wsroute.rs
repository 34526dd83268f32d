use crate::error::{AppError, AppResult};
use crate::middleware::guards::load_actor;
use crate::services::{ConversationService, MessageService};
use crate::state::AppState;
use crate::websocket::message_types::{ClientEvent, ServerEvent};
use crate::websocket::{ConnectionId, SessionCommand};
use actix::{Actor, ActorContext, ActorFutureExt, AsyncContext, StreamHandler};
use actix_middleware::validate_token;
use actix_web::{get, web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

fn extract_token(req: &HttpRequest) -> Option<String> {
    // browsers cannot set headers on websocket upgrades, so the token
    // usually arrives as a query parameter
    let from_query = req
        .query_string()
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "token")
        .map(|(_, value)| value.to_owned());
    if from_query.is_some() {
        return from_query;
    }
    req.headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned)
}

#[get("/ws")]
pub async fn ws_connect(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let token = extract_token(&req).ok_or(AppError::Unauthorized)?;
    let token_data = validate_token(&token).map_err(|_| AppError::Unauthorized)?;
    let user_id =
        Uuid::parse_str(&token_data.claims.sub).map_err(|_| AppError::Unauthorized)?;
    load_actor(&state, user_id).await?;

    ws::start(WsSession::new(user_id, state.clone()), &req, stream)
        .map_err(|e| AppError::BadRequest(format!("websocket handshake failed: {e}")))
}

/// One live socket for one authenticated user.
///
/// On start the session registers with the connection registry (superseding
/// any previous socket for the same user) and marks the user online. All
/// server pushes arrive through the registry's command stream; client frames
/// arrive through the websocket stream.
pub struct WsSession {
    user_id: Uuid,
    conn_id: ConnectionId,
    state: web::Data<AppState>,
    hb: Instant,
}

impl WsSession {
    pub fn new(user_id: Uuid, state: web::Data<AppState>) -> Self {
        Self {
            user_id,
            conn_id: Uuid::nil(),
            state,
            hb: Instant::now(),
        }
    }

    fn heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                warn!(user_id = %act.user_id, "heartbeat timed out, closing session");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn send_event(&self, ctx: &mut ws::WebsocketContext<Self>, event: &ServerEvent) {
        match serde_json::to_string(event) {
            Ok(text) => ctx.text(text),
            Err(e) => warn!(user_id = %self.user_id, error = %e, "event serialization failed"),
        }
    }

    fn handle_client_event(&mut self, event: ClientEvent, ctx: &mut ws::WebsocketContext<Self>) {
        let state = self.state.clone();
        let user_id = self.user_id;
        let typing_ttl = Duration::from_secs(state.config.typing_ttl_secs);

        match event {
            ClientEvent::Typing {
                conversation_id,
                is_typing,
            } => {
                state
                    .presence
                    .set_typing(conversation_id, user_id, is_typing, typing_ttl);
                state.registry.broadcast_to_conversation(
                    conversation_id,
                    &ServerEvent::Typing {
                        conversation_id,
                        user_id,
                        is_typing,
                    },
                    Some(user_id),
                );
            }
            ClientEvent::Unsubscribe { conversation_id } => {
                state.registry.unsubscribe(conversation_id, user_id);
            }
            ClientEvent::Subscribe { conversation_id } => {
                let fut = async move {
                    let conversation = ConversationService::find_by_id(&state.db, conversation_id)
                        .await?
                        .ok_or(AppError::NotFound)?;
                    if !conversation.is_participant(user_id) {
                        return Err(AppError::Forbidden);
                    }
                    state.registry.subscribe(conversation_id, user_id);
                    Ok(())
                };
                self.spawn_with_error_report(fut, ctx);
            }
            ClientEvent::MarkRead { conversation_id } => {
                let fut = async move {
                    MessageService::mark_conversation_read(&state.db, conversation_id, user_id)
                        .await?;
                    Ok(())
                };
                self.spawn_with_error_report(fut, ctx);
            }
            ClientEvent::SendMessage {
                conversation_id,
                content,
            } => {
                let fut = async move {
                    state
                        .deliver_message(conversation_id, user_id, &content)
                        .await?;
                    Ok(())
                };
                self.spawn_with_error_report(fut, ctx);
            }
        }
    }

    /// Run an async handler on the actor; failures come back to this client
    /// as an `error` event instead of killing the session.
    fn spawn_with_error_report(
        &self,
        fut: impl std::future::Future<Output = AppResult<()>> + 'static,
        ctx: &mut ws::WebsocketContext<Self>,
    ) {
        let fut = actix::fut::wrap_future::<_, Self>(fut).map(|result, act, ctx| {
            if let Err(e) = result {
                debug!(user_id = %act.user_id, error = %e, "client event rejected");
                act.send_event(
                    ctx,
                    &ServerEvent::error(
                        match e {
                            AppError::NotFound => "not_found",
                            AppError::Forbidden => "forbidden",
                            AppError::BadRequest(_) => "bad_request",
                            _ => "internal",
                        },
                        e.to_string(),
                    ),
                );
            }
        });
        ctx.spawn(fut);
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let (conn_id, rx) = self.state.registry.register(self.user_id);
        self.conn_id = conn_id;
        ctx.add_stream(rx);
        self.heartbeat(ctx);

        if self.state.presence.set_online(self.user_id) {
            self.state.registry.broadcast_all(
                &ServerEvent::Presence {
                    user_id: self.user_id,
                    is_online: true,
                },
                Some(self.user_id),
            );
        }
        info!(user_id = %self.user_id, conn_id = %conn_id, "websocket session started");
        self.send_event(
            ctx,
            &ServerEvent::Connected {
                user_id: self.user_id,
            },
        );
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        // a superseded session carries a stale conn_id here, so it does not
        // evict its replacement or flip the user offline
        if self.state.registry.unregister(self.user_id, self.conn_id) {
            self.state.presence.set_offline(self.user_id);
            self.state.registry.broadcast_all(
                &ServerEvent::Presence {
                    user_id: self.user_id,
                    is_online: false,
                },
                Some(self.user_id),
            );
        }
        info!(user_id = %self.user_id, conn_id = %self.conn_id, "websocket session stopped");
    }
}

/// Server pushes routed through the registry.
impl StreamHandler<SessionCommand> for WsSession {
    fn handle(&mut self, command: SessionCommand, ctx: &mut Self::Context) {
        match command {
            SessionCommand::Deliver(event) => self.send_event(ctx, &event),
            SessionCommand::Shutdown => {
                debug!(user_id = %self.user_id, "session superseded by a newer connection");
                ctx.close(Some(ws::CloseReason {
                    code: ws::CloseCode::Policy,
                    description: Some("superseded by a newer connection".into()),
                }));
                ctx.stop();
            }
        }
    }
}

/// Client frames.
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(payload)) => {
                self.hb = Instant::now();
                ctx.pong(&payload);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.hb = Instant::now();
                match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => self.handle_client_event(event, ctx),
                    Err(e) => {
                        self.send_event(
                            ctx,
                            &ServerEvent::error("bad_event", format!("unparseable event: {e}")),
                        );
                    }
                }
            }
            Ok(ws::Message::Binary(_)) => {
                self.send_event(
                    ctx,
                    &ServerEvent::error("bad_event", "binary frames are not supported"),
                );
            }
            Ok(ws::Message::Close(reason)) => {
                debug!(user_id = %self.user_id, ?reason, "client closed connection");
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => {}
            Err(e) => {
                warn!(user_id = %self.user_id, error = %e, "websocket protocol error");
                ctx.stop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn token_from_query_parameter_wins() {
        let req = TestRequest::default()
            .uri("/ws?token=query-token")
            .insert_header(("Authorization", "Bearer header-token"))
            .to_http_request();
        assert_eq!(extract_token(&req).as_deref(), Some("query-token"));
    }

    #[test]
    fn token_falls_back_to_bearer_header() {
        let req = TestRequest::default()
            .uri("/ws")
            .insert_header(("Authorization", "Bearer header-token"))
            .to_http_request();
        assert_eq!(extract_token(&req).as_deref(), Some("header-token"));
    }

    #[test]
    fn missing_token_yields_none() {
        let req = TestRequest::default().uri("/ws?foo=bar").to_http_request();
        assert_eq!(extract_token(&req), None);
    }
}
