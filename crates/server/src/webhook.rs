//! Slash-command webhook.
//!
//! - `POST /vote` - form-encoded or JSON slash-command callback
//!
//! Any other method on `/vote` is answered with 400. Successful commands
//! return `{response_type, text}`; failures return `{message}` with a status
//! derived from the interface error.

use std::sync::Arc;

use axum::{
    extract::{FromRequest, Request, State},
    http::{header, HeaderValue, StatusCode},
    routing::post,
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

use votingbot_chat::commands::{CommandEnvelope, CommandRouter, SlashCommandPayload};
use votingbot_chat::responses::ChatResponse;
use votingbot_core::engine::PollEngine;
use votingbot_core::errors::{ApplicationError, InterfaceError};

#[derive(Clone)]
pub struct WebhookState {
    commands: Arc<CommandRouter<PollEngine>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

type ErrorResponse = (StatusCode, Json<ErrorBody>);

pub fn router(engine: PollEngine) -> Router {
    let state = WebhookState { commands: Arc::new(CommandRouter::new(engine)) };
    Router::new().route("/vote", post(vote).fallback(unsupported_method)).with_state(state)
}

/// `*` allows every origin; anything else is an explicit allow-list.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed_origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(
                    event_name = "system.cors.invalid_origin",
                    correlation_id = "bootstrap",
                    origin = %origin,
                    "ignoring CORS origin that is not a valid header value"
                );
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Slash-command body accepted as JSON or as a urlencoded form.
pub struct CommandBody(pub SlashCommandPayload);

impl<S> FromRequest<S> for CommandBody
where
    S: Send + Sync,
{
    type Rejection = ErrorResponse;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim_start().to_ascii_lowercase().starts_with("application/json"))
            .unwrap_or(false);

        let decoded = if is_json {
            Json::<SlashCommandPayload>::from_request(req, state)
                .await
                .map(|Json(payload)| payload)
                .map_err(|rejection| rejection.body_text())
        } else {
            Form::<SlashCommandPayload>::from_request(req, state)
                .await
                .map(|Form(payload)| payload)
                .map_err(|rejection| rejection.body_text())
        };

        decoded.map(CommandBody).map_err(|detail| {
            warn!(
                event_name = "webhook.vote.malformed_body",
                correlation_id = "unassigned",
                detail = %detail,
                "rejecting malformed slash-command body"
            );
            bad_request(format!("malformed request body: {detail}"))
        })
    }
}

pub async fn vote(
    State(state): State<WebhookState>,
    CommandBody(payload): CommandBody,
) -> Result<Json<ChatResponse>, ErrorResponse> {
    let correlation_id = Uuid::new_v4().to_string();
    let envelope = CommandEnvelope::from_payload(payload, correlation_id.clone());

    match state.commands.route(&envelope).await {
        Ok(response) => {
            info!(
                event_name = "webhook.vote.completed",
                correlation_id = %correlation_id,
                user_id = %envelope.user_id,
                "slash command handled"
            );
            Ok(Json(response))
        }
        Err(error) => Err(error_response(error, &correlation_id)),
    }
}

async fn unsupported_method() -> ErrorResponse {
    bad_request("only POST is supported on /vote".to_string())
}

fn error_response(error: ApplicationError, correlation_id: &str) -> ErrorResponse {
    let detail = error.to_string();
    let interface = error.into_interface(correlation_id);
    let status = status_code(&interface);

    if status.is_server_error() {
        error!(
            event_name = "webhook.vote.failed",
            correlation_id = %correlation_id,
            retryable = interface.is_retryable(),
            error = %detail,
            "slash command failed"
        );
    } else {
        warn!(
            event_name = "webhook.vote.rejected",
            correlation_id = %correlation_id,
            status = status.as_u16(),
            error = %detail,
            "slash command rejected"
        );
    }

    (status, Json(ErrorBody { message: interface.user_message().to_string() }))
}

fn status_code(error: &InterfaceError) -> StatusCode {
    match error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::Forbidden { .. } => StatusCode::FORBIDDEN,
        InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
        InterfaceError::ServiceUnavailable { .. }
        | InterfaceError::Indeterminate { .. }
        | InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn bad_request(message: String) -> ErrorResponse {
    (StatusCode::BAD_REQUEST, Json(ErrorBody { message }))
}
