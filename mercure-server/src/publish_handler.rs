//! The ambient publish endpoint: a thin, independently-invariant-free
//! wrapper that turns a form-encoded POST into an `Update` and hands it to
//! the transport. Not part of the fan-out engine's guarantees (those live
//! in [`crate::transport::Transport::dispatch`] and the matching predicate).

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use mercure_core::{Error, Event, Role, Update};

use crate::hub::HubState;
use crate::subscribe_handler::{bearer_token, parse_query};

/// The parsed form body of a publish request. `topic` is repeatable, which
/// `serde_urlencoded` (and so `axum::Form`) cannot deserialize into a
/// `Vec<String>`, so the raw body is decoded by hand the same way
/// [`crate::subscribe_handler::parse_query`] decodes the subscribe query
/// string.
#[derive(Debug, Default)]
pub struct PublishForm {
    topics: Vec<String>,
    data: String,
    private: bool,
    id: String,
    event_type: String,
    retry: u64,
}

impl PublishForm {
    fn from_body(body: &str) -> Self {
        let mut form = PublishForm::default();
        for (key, value) in parse_query(body) {
            match key.as_str() {
                "topic" => form.topics.push(value),
                "data" => form.data = value,
                "private" => form.private = value == "on" || value == "true" || value == "1",
                "id" => form.id = value,
                "type" => form.event_type = value,
                "retry" => form.retry = value.parse().unwrap_or(0),
                _ => {}
            }
        }
        form
    }
}

pub(crate) struct HandlerError(Error, bool);

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = if self.1 {
            format!("{}\n", self.0)
        } else {
            self.0.client_message()
        };
        (status, body).into_response()
    }
}

pub async fn publish(
    State(state): State<Arc<HubState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, HandlerError> {
    let form = PublishForm::from_body(&String::from_utf8_lossy(&body));
    let token = bearer_token(&headers);
    let authorization = state
        .publisher_authorizer
        .authorize(token.as_deref(), Role::Publisher)
        .map_err(|e| {
            if let Some(metrics) = &state.metrics {
                metrics.record_auth_failure("publish");
            }
            HandlerError(e, state.debug)
        })?;
    let _ = authorization;

    if form.topics.is_empty() {
        return Err(HandlerError(Error::MissingTopic, state.debug));
    }

    let mut event = Event::new(form.id, form.data);
    if !form.event_type.is_empty() {
        event = event.with_type(form.event_type);
    }
    if form.retry > 0 {
        event = event.with_retry(form.retry);
    }

    let update = Update::multi(form.topics.clone(), event, form.private);
    state
        .transport
        .dispatch(update)
        .await
        .map_err(|e| HandlerError(e, state.debug))?;
    if let Some(metrics) = &state.metrics {
        for topic in &form.topics {
            metrics.record_dispatch(topic);
        }
    }

    Ok((StatusCode::OK, headers_with_id()).into_response())
}

fn headers_with_id() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, "text/plain; charset=utf-8".parse().unwrap());
    headers
}
