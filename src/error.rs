// Error types shared across the gateway

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("upstream request failed: {0}")]
    UpstreamTransport(#[from] reqwest::Error),

    #[error("bad response from upstream while {context}: {detail}")]
    UpstreamBadResponse { context: String, detail: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("missing configuration: {0}")]
    Configuration(&'static str),

    #[error(
        "Looks like we couldn't download this plugin automatically. \
         You should still be able to download it in your browser at {download_url}"
    )]
    InstallFailed { download_url: String },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl GatewayError {
    /// Upstream answered 2xx but the body was missing something we need.
    pub fn malformed(context: &str, detail: impl Into<String>) -> Self {
        GatewayError::UpstreamBadResponse {
            context: context.to_string(),
            detail: detail.into(),
        }
    }
}
