//! HTTP routing: health check, authorization gate, forwarding.

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::debug;

use super::client_ip::resolve_client;
use crate::domain::models::{ClientAddress, GateDecision};
use crate::infrastructure::proxy::Forwarder;
use crate::services::{has_dot_segments, AuthorizationGate};

/// Shared state handed to every request
#[derive(Clone)]
pub struct AppState {
    pub gate: AuthorizationGate,
    pub forwarder: Forwarder,
    pub trust_forwarded_headers: bool,
}

/// Build the application router
///
/// `GET /ping` is answered locally. Every other request passes the gate
/// and is then forwarded to the backend.
pub fn router(state: AppState) -> Router {
    let gated = Router::new()
        .fallback(forward)
        .layer(middleware::from_fn_with_state(state.clone(), authorize))
        .with_state(state);

    Router::new()
        .route("/ping", get(ping).fallback_service(gated.clone()))
        .fallback_service(gated)
        .layer(TraceLayer::new_for_http())
}

async fn ping() -> StatusCode {
    StatusCode::OK
}

/// Gate middleware: 401 on denial, 503 when sessions cannot be confirmed
///
/// Paths with dot segments are refused with 400 before classification,
/// since the backend would resolve them to a path other than the one judged.
async fn authorize(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    mut request: Request,
    next: Next,
) -> Response {
    if has_dot_segments(request.uri().path()) {
        debug!(path = %request.uri().path(), "refused path with dot segments");
        return StatusCode::BAD_REQUEST.into_response();
    }

    if !state
        .gate
        .requires_gating(request.method(), request.uri().path())
    {
        return next.run(request).await;
    }

    let client = resolve_client(peer, request.headers(), state.trust_forwarded_headers);

    match state.gate.authorize(client).await {
        Ok(GateDecision::Pass(reason)) => {
            debug!(%client, path = %request.uri().path(), reason = reason.as_str(), "gated request allowed");
            request.extensions_mut().insert(client);
            next.run(request).await
        }
        Ok(GateDecision::Deny) => {
            debug!(%client, path = %request.uri().path(), "gated request denied");
            StatusCode::UNAUTHORIZED.into_response()
        }
        Err(_) => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

async fn forward(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    let client = if state.forwarder.adds_forwarded_headers() {
        let resolved = request.extensions().get::<ClientAddress>().copied();
        Some(resolved.unwrap_or_else(|| {
            resolve_client(peer, request.headers(), state.trust_forwarded_headers)
        }))
    } else {
        None
    };
    state.forwarder.handle(request, client).await
}
