// HTTP API exposed to the panel
//
// The panel fronts this service: it authenticates the session itself and
// forwards the panel user id in the `X-User-Id` header.

use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::daemon::DaemonClient;
use crate::error::GatewayError;
use crate::links::LinkStore;
use crate::providers::ProviderRegistry;

mod plugins;
mod polymart;

/// Shared state handed to every handler.
pub struct AppState {
    pub config: Config,
    pub registry: ProviderRegistry,
    pub links: LinkStore,
    /// Absent when the daemon settings are incomplete; installs 500 then.
    pub daemon: Option<DaemonClient>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/plugins", get(plugins::search))
        .route("/plugins/versions", get(plugins::versions))
        .route("/plugins/install", post(plugins::install))
        .route("/plugins/polymart/link", post(polymart::link))
        .route("/plugins/polymart/callback", get(polymart::callback))
        .route("/plugins/polymart/disconnect", post(polymart::disconnect))
        .route("/plugins/polymart/is-linked", get(polymart::is_linked))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Map a gateway error onto the API boundary.
fn error_response(err: GatewayError) -> (StatusCode, String) {
    let status = match &err {
        GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
        GatewayError::InstallFailed { .. } => StatusCode::BAD_REQUEST,
        GatewayError::UpstreamTransport(_) | GatewayError::UpstreamBadResponse { .. } => {
            StatusCode::BAD_GATEWAY
        }
        GatewayError::Configuration(_) | GatewayError::Storage(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string())
}

/// Panel user id forwarded by the fronting panel.
fn user_id(headers: &HeaderMap) -> Result<i64, (StatusCode, String)> {
    optional_user_id(headers).ok_or((
        StatusCode::BAD_REQUEST,
        "missing or invalid X-User-Id header".to_string(),
    ))
}

fn optional_user_id(headers: &HeaderMap) -> Option<i64> {
    headers.get("x-user-id")?.to_str().ok()?.parse().ok()
}
