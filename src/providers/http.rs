// Shared HTTP client utilities for the provider adapters

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::error::GatewayError;

/// Fixed timeout for every outbound call; none of the marketplaces
/// documents one.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the shared outbound client with the panel-identifying User-Agent.
pub fn build_client(user_agent: &str) -> Client {
    Client::builder()
        .user_agent(user_agent)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .expect("failed to build HTTP client")
}

/// Build a client that does not follow redirects, for probing `Location`
/// headers without downloading the target.
pub fn build_probe_client(user_agent: &str) -> Client {
    Client::builder()
        .user_agent(user_agent)
        .timeout(REQUEST_TIMEOUT)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("failed to build HTTP client")
}

/// Send a request and deserialize the JSON body.
pub async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    context: &str,
) -> Result<T, GatewayError> {
    let response = request.send().await?;
    let response = check_status(response, context).await?;

    response.json().await.map_err(|err| {
        if err.is_decode() {
            log::error!("Failed to decode upstream response while {context}: {err}");
            GatewayError::UpstreamBadResponse {
                context: context.to_string(),
                detail: "undecodable response body".to_string(),
            }
        } else {
            GatewayError::UpstreamTransport(err)
        }
    })
}

/// Reject non-2xx responses. The raw upstream body is logged for
/// diagnosability; the returned error never carries it, so upstream error
/// pages cannot leak to the end user.
pub async fn check_status(response: Response, context: &str) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    log::error!("Received bad response while {context}: HTTP {status}, body: {body}");

    Err(GatewayError::UpstreamBadResponse {
        context: context.to_string(),
        detail: format!("HTTP {status}"),
    })
}
