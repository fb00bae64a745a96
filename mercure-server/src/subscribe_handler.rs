//! The subscribe endpoint: authorizes the request, registers a
//! [`Subscriber`], optionally replays history, then streams live updates as
//! hand-framed SSE records until the client disconnects.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{RawQuery, State};
use bytes::Bytes;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use mercure_core::{Error, Role};
use percent_encoding::percent_decode_str;
use tokio::sync::mpsc;

use crate::hub::HubState;
use crate::sse::{frame_event, COMMENT_LINE};
use crate::subscriber::Subscriber;

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

/// Wraps [`mercure_core::Error`] so it can be returned directly from the
/// handler and converted into the exact plain-text response §6/§7 require.
/// `debug` selects between the terse client message and the error's full
/// `Display` text, per the `debug` configuration key (§6).
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

/// True if `subscriber_id` is authorized to have its connect/disconnect
/// activity broadcast on the reserved subscription-events meta-topic: either
/// it holds the `*` claim, or its authorized selectors match at least one of
/// its own per-topic subscription-event topics (§4.7 step 5).
fn authorized_for_subscription_events(
    matcher: &mercure_core::TopicMatcher,
    subscriber_id: &str,
    requested_selectors: &[String],
    authorized_selectors: &[String],
    all_topics: bool,
) -> bool {
    all_topics
        || requested_selectors.iter().any(|topic| {
            let reserved_topic = crate::subscription_events::subscription_topic(subscriber_id, topic);
            matcher.matches(authorized_selectors, &reserved_topic)
        })
}

pub(crate) fn parse_query(raw: &str) -> Vec<(String, String)> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next().unwrap_or("");
            let value = parts.next().unwrap_or("");
            let decode = |s: &str| {
                percent_decode_str(&s.replace('+', " "))
                    .decode_utf8_lossy()
                    .into_owned()
            };
            (decode(key), decode(value))
        })
        .collect()
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        if let Ok(s) = value.to_str() {
            if let Some(token) = s.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }
    if let Some(value) = headers.get(header::COOKIE) {
        if let Ok(s) = value.to_str() {
            for cookie in s.split(';') {
                let cookie = cookie.trim();
                if let Some(token) = cookie.strip_prefix("mercureAuthorization=") {
                    return Some(token.to_string());
                }
            }
        }
    }
    None
}

pub async fn subscribe(
    State(state): State<Arc<HubState>>,
    headers: HeaderMap,
    RawQuery(raw_query): RawQuery,
) -> Result<Response, HandlerError> {
    let token = bearer_token(&headers);
    let authorization = state
        .subscriber_authorizer
        .authorize(token.as_deref(), Role::Subscriber)
        .map_err(|e| {
            if let Some(metrics) = &state.metrics {
                metrics.record_auth_failure("subscribe");
            }
            HandlerError(e, state.debug)
        })?;

    let params = raw_query.as_deref().map(parse_query).unwrap_or_default();
    let requested_selectors: Vec<String> = params
        .iter()
        .filter(|(k, _)| k == "topic")
        .map(|(_, v)| v.clone())
        .collect();
    if requested_selectors.is_empty() {
        return Err(HandlerError(Error::MissingTopic, state.debug));
    }

    let last_event_id = params
        .iter()
        .find(|(k, _)| k == "Last-Event-ID")
        .map(|(_, v)| v.clone())
        .or_else(|| {
            headers
                .get("Last-Event-ID")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        });

    let subscriber_id = format!("sub-{}", NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed));
    let all_topics = authorization.all_topics();
    let (subscriber, mut handle) = Subscriber::new(
        subscriber_id.clone(),
        None,
        requested_selectors.clone(),
        authorization.selectors.clone(),
        all_topics,
        last_event_id.clone(),
        state.subscriber_queue_capacity,
    );

    if let Some(metrics) = &state.metrics {
        for topic in &requested_selectors {
            metrics.record_subscribe(topic);
        }
    }

    // Registration must succeed before we commit a 200 response: once the
    // stream starts, a later failure can no longer be reported as 503.
    if state.dispatch_subscriptions
        && authorized_for_subscription_events(&state.matcher, &subscriber.id, &requested_selectors, &subscriber.authorized_selectors, all_topics)
    {
        let _ = state
            .subscription_events
            .dispatch_lifecycle(&subscriber.id, &requested_selectors, &subscriber.authorized_selectors, true)
            .await;
    }
    if state.transport.add_subscriber(subscriber.clone()).await.is_err() {
        return Err(HandlerError(Error::TransportUnavailable, state.debug));
    }

    let (out_tx, out_rx) = mpsc::channel::<Bytes>(8);
    // Commit status 200 and defeat proxy buffering before any slow step.
    let _ = out_tx.send(Bytes::from_static(COMMENT_LINE.as_bytes())).await;

    let state_for_task = state.clone();
    tokio::spawn(async move {
        run_subscriber(state_for_task, subscriber, &mut handle, requested_selectors, out_tx).await;
    });

    let stream = futures::stream::unfold(out_rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (Ok::<_, std::convert::Infallible>(chunk), rx))
    });

    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = StatusCode::OK;
    let response_headers = response.headers_mut();
    response_headers.insert(header::CONTENT_TYPE, "text/event-stream; charset=utf-8".parse().unwrap());
    response_headers.insert(header::CACHE_CONTROL, "no-cache".parse().unwrap());
    response_headers.insert(header::CONNECTION, "keep-alive".parse().unwrap());
    response_headers.insert("X-Accel-Buffering", "no".parse().unwrap());
    Ok(response)
}

async fn run_subscriber(
    state: Arc<HubState>,
    subscriber: Subscriber,
    handle: &mut crate::subscriber::SubscriberHandle,
    requested_selectors: Vec<String>,
    out_tx: mpsc::Sender<Bytes>,
) {
    if let Some(last_event_id) = &subscriber.last_event_id {
        if state.transport.supports_history() {
            if let Err(e) = state.transport.dispatch_history(&subscriber, last_event_id).await {
                tracing::warn!(subscriber = %subscriber.id, error = %e, "history replay failed");
            }
        }
    }

    let mut heartbeat = if state.heartbeat_interval.is_zero() {
        None
    } else {
        Some(tokio::time::interval(state.heartbeat_interval))
    };

    loop {
        let outcome = if let Some(ticker) = heartbeat.as_mut() {
            tokio::select! {
                update = handle.inbox_rx.recv() => Outcome::Update(update),
                _ = ticker.tick() => Outcome::Heartbeat,
                changed = handle.disconnected_rx.changed() => Outcome::Disconnected(changed.is_err() || *handle.disconnected_rx.borrow()),
                _ = out_tx.closed() => Outcome::RequestCancelled,
            }
        } else {
            tokio::select! {
                update = handle.inbox_rx.recv() => Outcome::Update(update),
                changed = handle.disconnected_rx.changed() => Outcome::Disconnected(changed.is_err() || *handle.disconnected_rx.borrow()),
                _ = out_tx.closed() => Outcome::RequestCancelled,
            }
        };

        match outcome {
            Outcome::Update(Some(update)) => {
                if !crate::matching::accepts(&state.matcher, &subscriber, &update) {
                    continue;
                }
                if out_tx.send(Bytes::from(frame_event(&update.event))).await.is_err() {
                    break;
                }
            }
            Outcome::Update(None) => break,
            Outcome::Heartbeat => {
                if out_tx.send(Bytes::from_static(COMMENT_LINE.as_bytes())).await.is_err() {
                    break;
                }
            }
            Outcome::Disconnected(true) => break,
            Outcome::Disconnected(false) => {}
            Outcome::RequestCancelled => break,
        }
    }

    state.transport.remove_subscriber(&subscriber.id).await;
    if state.dispatch_subscriptions
        && authorized_for_subscription_events(
            &state.matcher,
            &subscriber.id,
            &requested_selectors,
            &subscriber.authorized_selectors,
            subscriber.all_topics,
        )
    {
        let _ = state
            .subscription_events
            .dispatch_lifecycle(&subscriber.id, &requested_selectors, &subscriber.authorized_selectors, false)
            .await;
    }
}

enum Outcome {
    Update(Option<mercure_core::Update>),
    Heartbeat,
    Disconnected(bool),
    RequestCancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_query_splits_repeated_topic_params() {
        let params = parse_query("topic=http://example.com/books/1&topic=string");
        let topics: Vec<&str> = params.iter().filter(|(k, _)| k == "topic").map(|(_, v)| v.as_str()).collect();
        assert_eq!(topics, vec!["http://example.com/books/1", "string"]);
    }

    #[test]
    fn parse_query_decodes_percent_escapes() {
        let params = parse_query("topic=%2Ffoos%2F1");
        assert_eq!(params[0].1, "/foos/1");
    }

    #[test]
    fn bearer_token_prefers_authorization_header_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        headers.insert(header::COOKIE, "mercureAuthorization=xyz".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc".to_string()));
    }

    #[test]
    fn bearer_token_falls_back_to_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "other=1; mercureAuthorization=xyz".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("xyz".to_string()));
    }
}
