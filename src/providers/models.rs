// Normalized marketplace records shared by every provider adapter

use serde::Serialize;

/// One search hit, normalized from whatever shape the marketplace returns.
///
/// The `id` is provider-scoped: it only means something when paired with the
/// provider that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct PluginSummary {
    pub id: String,
    pub name: String,
    pub short_description: String,
    /// Marketplace page for the plugin.
    pub url: String,
    pub icon_url: Option<String>,
    /// When set, the marketplace forbids direct installation and the user
    /// must be sent to this URL instead (premium or externally hosted
    /// resources).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
}

/// One installable version of a plugin.
#[derive(Debug, Clone, Serialize)]
pub struct PluginVersion {
    pub id: String,
    pub name: String,
    /// Compatible Minecraft versions, for providers that expose them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_versions: Option<Vec<String>>,
    /// Absent when the provider only resolves the URL at install time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

/// One page of search results plus the provider-declared (or capped) total.
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub plugins: Vec<PluginSummary>,
    pub total: u64,
}
