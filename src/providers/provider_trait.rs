// Trait definition for marketplace providers

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::providers::models::{PluginVersion, SearchResults};

/// Search parameters forwarded to a provider.
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub query: String,
    /// 1-indexed page number.
    pub page: u32,
    /// Already clamped to the provider's cap by the gateway.
    pub page_size: u32,
    /// Empty when the caller does not filter by Minecraft version.
    pub minecraft_version: String,
}

/// Common contract implemented by every marketplace client.
#[async_trait]
pub trait PluginProvider: Send + Sync {
    /// Provider name (e.g. "modrinth"), used in log context.
    fn name(&self) -> &'static str;

    /// Fetch one page of search results.
    ///
    /// Never fails: upstream failures are logged server-side and collapse
    /// into an empty page, so one broken marketplace cannot take down the
    /// whole listing.
    async fn search(&self, params: &SearchParams) -> SearchResults;

    /// List the installable versions of a plugin.
    async fn versions(&self, plugin_id: &str) -> Result<Vec<PluginVersion>, GatewayError>;

    /// Resolve the concrete download URL for a version. May cost an extra
    /// upstream round trip; must fail when no usable URL comes back.
    async fn download_url(
        &self,
        plugin_id: &str,
        version_id: &str,
    ) -> Result<String, GatewayError>;
}
