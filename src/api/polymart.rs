// Polymart account-linking endpoints
//
// The handshake walks Unlinked -> Pending (state nonce stored) -> Linked
// (token stored); disconnect drops every row back to Unlinked.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect};
use axum::Json;
use rand::RngCore;
use serde::Deserialize;
use serde_json::json;

use crate::error::GatewayError;

use super::{error_response, user_id, AppState};

/// Length in bytes of the link-state nonce.
const STATE_NONCE_BYTES: usize = 50;

fn random_state() -> String {
    let mut bytes = [0u8; STATE_NONCE_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Start the account-linking handshake and hand back the authorization URL
/// the browser must follow.
pub async fn link(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = user_id(&headers)?;

    let nonce = random_state();
    state
        .links
        .insert_pending(user, &nonce)
        .map_err(error_response)?;

    let return_url = format!("{}/plugins/polymart/callback", state.config.public_url);
    let redirect_url = state
        .registry
        .polymart(None)
        .authorize_user(state.config.public_host(), &return_url, &nonce)
        .await
        .map_err(error_response)?;

    Ok(Json(json!({ "redirect_url": redirect_url })))
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    success: String,
    token: String,
    state: String,
}

/// Polymart redirects the browser here after the user accepts or refuses.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let link = state
        .links
        .find_by_state(&query.state)
        .map_err(error_response)?
        .ok_or_else(|| error_response(GatewayError::NotFound("link state".to_string())))?;

    if query.success == "1" {
        state
            .links
            .set_token(link.id, &query.token)
            .map_err(error_response)?;
    } else {
        // A refused authorization can never complete; drop the row so
        // pending states neither pile up nor stay replayable.
        state.links.delete(link.id).map_err(error_response)?;
    }

    Ok(Redirect::to(&format!(
        "{}/plugins?provider=polymart",
        state.config.panel_url
    )))
}

/// Invalidate and forget every link of the user. Upstream invalidation is
/// best-effort; local rows are removed regardless.
pub async fn disconnect(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, (StatusCode, String)> {
    let user = user_id(&headers)?;

    let provider = state.registry.polymart(None);
    for link in state.links.links_for_user(user).map_err(error_response)? {
        let Some(token) = link.token else { continue };
        if let Err(err) = provider.invalidate_token(&token).await {
            log::warn!("failed to invalidate Polymart auth token: {err}");
        }
    }

    state.links.delete_for_user(user).map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn is_linked(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = user_id(&headers)?;
    let linked = state.links.is_linked(user).map_err(error_response)?;
    Ok(Json(linked))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_nonce_is_hex_of_fifty_bytes() {
        let nonce = random_state();
        assert_eq!(nonce.len(), STATE_NONCE_BYTES * 2);
        assert!(nonce.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn state_nonces_do_not_repeat() {
        assert_ne!(random_state(), random_state());
    }
}
