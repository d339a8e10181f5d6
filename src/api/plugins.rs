// Search, version listing and install endpoints

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::constants::MAX_PAGE_SIZE;
use crate::error::GatewayError;
use crate::providers::{Provider, SearchParams};

use super::{error_response, optional_user_id, AppState};

#[derive(Deserialize)]
pub struct SearchQuery {
    provider: Provider,
    page: u32,
    page_size: u32,
    #[serde(default)]
    search_query: String,
    #[serde(default)]
    minecraft_version: String,
}

/// Stored Polymart token of the requesting user, when there is one. Every
/// other provider ignores it.
fn polymart_token(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<String>, (StatusCode, String)> {
    match optional_user_id(headers) {
        Some(user) => state.links.token_for_user(user).map_err(error_response),
        None => Ok(None),
    }
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if query.page == 0 {
        return Err((StatusCode::BAD_REQUEST, "page must be at least 1".into()));
    }
    if query.page_size == 0 || query.page_size > MAX_PAGE_SIZE {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("page_size must be between 1 and {MAX_PAGE_SIZE}"),
        ));
    }

    let page_size = match query.provider.page_size_cap() {
        Some(cap) => query.page_size.min(cap),
        None => query.page_size,
    };

    let token = polymart_token(&state, &headers)?;
    let provider = state.registry.provider(query.provider, token);

    let params = SearchParams {
        query: query.search_query,
        page: query.page,
        page_size,
        minecraft_version: query.minecraft_version,
    };
    log::debug!(
        "searching {} for '{}' (page {}, size {})",
        provider.name(),
        params.query,
        params.page,
        params.page_size
    );
    let results = provider.search(&params).await;

    let count = results.plugins.len();
    Ok(Json(json!({
        "object": "list",
        "data": results.plugins,
        "meta": {
            "pagination": {
                "total": results.total,
                "count": count,
                "per_page": page_size,
                "current_page": query.page,
                "total_pages": results.total.div_ceil(u64::from(page_size)),
                "links": {},
            },
        },
    })))
}

#[derive(Deserialize)]
pub struct VersionsQuery {
    provider: Provider,
    plugin_id: String,
}

pub async fn versions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<VersionsQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let token = polymart_token(&state, &headers)?;
    let provider = state.registry.provider(query.provider, token);

    let versions = provider
        .versions(&query.plugin_id)
        .await
        .map_err(error_response)?;

    Ok(Json(versions))
}

#[derive(Deserialize)]
pub struct InstallRequest {
    provider: Provider,
    plugin_id: String,
    version_id: String,
}

pub async fn install(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<InstallRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    let token = polymart_token(&state, &headers)?;
    let provider = state.registry.provider(request.provider, token);

    let download_url = provider
        .download_url(&request.plugin_id, &request.version_id)
        .await
        .map_err(error_response)?;
    log::info!(
        "installing {} plugin {} version {}",
        provider.name(),
        request.plugin_id,
        request.version_id
    );

    let daemon = state
        .daemon
        .as_ref()
        .ok_or_else(|| error_response(GatewayError::Configuration("PG_DAEMON_URL")))?;

    if let Err(err) = daemon.pull(&download_url).await {
        log::error!("daemon pull of {download_url} failed: {err}");
        return Err(error_response(GatewayError::InstallFailed { download_url }));
    }

    Ok(StatusCode::NO_CONTENT)
}
