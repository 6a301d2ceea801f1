use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

use super::HttpState;
use super::error::ApiError;

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

/// Log every 4xx and 5xx with the error chain the handler attached.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();
    let started = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let (source, chain) = response
        .extensions_mut()
        .remove::<ErrorReport>()
        .map(|report| (report.source, report.messages))
        .unwrap_or(("unknown", Vec::new()));
    let detail = chain.first().map(String::as_str).unwrap_or("no diagnostic available");

    macro_rules! failure {
        ($level:ident, $message:literal) => {
            $level!(
                target = "clubsite::http::response",
                request_id = %request_id,
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                status = status.as_u16(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                source,
                detail,
                chain = ?chain,
                $message,
            )
        };
    }

    if status.is_server_error() {
        failure!(error, "request failed");
    } else {
        failure!(warn, "client request error");
    }

    response
}

/// Reads pass through; every other method needs a configured admin token.
pub async fn require_admin(
    State(state): State<HttpState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if matches!(
        *request.method(),
        Method::GET | Method::HEAD | Method::OPTIONS
    ) {
        return next.run(request).await;
    }

    let token = extract_bearer(&request).or_else(|| {
        request
            .headers()
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    });

    match state.auth.verify(token.as_deref()) {
        Ok(()) => next.run(request).await,
        Err(err) => ApiError::from(err).into_response(),
    }
}

fn extract_bearer(request: &Request<Body>) -> Option<String> {
    let raw = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let bearer = raw.strip_prefix("Bearer ")?;
    Some(bearer.to_string())
}
