// SpigotMC provider (via the unauthenticated Spiget API)

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::GatewayError;
use crate::providers::http;
use crate::providers::models::{PluginSummary, PluginVersion, SearchResults};
use crate::providers::provider_trait::{PluginProvider, SearchParams};

const DEFAULT_BASE_URL: &str = "https://api.spiget.org/v2";
const RESOURCE_PAGE_BASE_URL: &str = "https://www.spigotmc.org/resources";
const SITE_BASE_URL: &str = "https://www.spigotmc.org";
const ICON_BASE_URL: &str = "https://spigotmc.org";
const DEFAULT_ICON_URL: &str =
    "https://static.spigotmc.org/styles/spigot/xenresource/resource_icon.png";

// SpigotMC serves assets without CORS headers, so every icon is routed
// through a public relay before the browser sees it.
const CORS_RELAY_URL: &str = "https://corsproxy.io/?";

#[derive(Debug, Deserialize)]
struct Resource {
    id: i64,
    name: String,
    /// Short tagline shown in listings.
    tag: String,
    #[serde(default)]
    icon: Option<Icon>,
    #[serde(default)]
    external: bool,
    #[serde(default)]
    premium: bool,
    #[serde(default)]
    file: Option<ResourceFile>,
}

#[derive(Debug, Deserialize, Default)]
struct Icon {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResourceFile {
    #[serde(default)]
    url: Option<String>,
    #[serde(rename = "externalUrl", default)]
    external_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LatestVersion {
    id: i64,
    name: String,
}

/// Pick the best icon source (site-relative URL, inline data URI, stock
/// fallback) and wrap it in the CORS relay.
fn icon_url(icon: Option<&Icon>) -> String {
    let url = icon
        .and_then(|i| i.url.as_deref())
        .filter(|u| !u.is_empty())
        .map(|u| format!("{ICON_BASE_URL}/{u}"))
        .or_else(|| {
            icon.and_then(|i| i.data.clone())
                .filter(|d| !d.is_empty())
        })
        .unwrap_or_else(|| DEFAULT_ICON_URL.to_string());

    format!("{CORS_RELAY_URL}{}", urlencoding::encode(&url))
}

/// A resource gets browser-side download routing only when its file lives
/// on an external page we cannot fetch from (an HTML page or a Hangar
/// listing) and it is not paywalled.
fn external_url(resource: &Resource) -> Option<String> {
    if !resource.external || resource.premium {
        return None;
    }
    let file = resource.file.as_ref()?;
    let target = file.external_url.as_deref().unwrap_or("");
    if !(target.ends_with("html") || target.contains("hangar")) {
        return None;
    }
    let page = file.url.as_deref()?;
    Some(format!("{SITE_BASE_URL}/{page}"))
}

pub struct SpigotMcProvider {
    client: Client,
    /// Redirect-probing client (redirects disabled).
    probe: Client,
    base_url: String,
}

impl SpigotMcProvider {
    pub fn new(client: Client, probe: Client) -> Self {
        Self {
            client,
            probe,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Probe `url` for a redirect without following it. A missing
    /// `Location` header (or a failed probe) means the URL already points
    /// at the file.
    async fn resolve_redirect(&self, url: &str) -> Option<String> {
        let response = self.probe.head(url).send().await.ok()?;
        response
            .headers()
            .get(reqwest::header::LOCATION)?
            .to_str()
            .ok()
            .map(str::to_string)
    }

    async fn try_search(&self, params: &SearchParams) -> Result<SearchResults, GatewayError> {
        // Spiget has no free-text search over the "free resources" listing;
        // an empty query switches endpoints.
        let path = if params.query.is_empty() {
            "resources/free".to_string()
        } else {
            format!("search/resources/{}", urlencoding::encode(&params.query))
        };

        let request = self
            .client
            .get(format!("{}/{path}", self.base_url))
            .query(&[
                ("size", params.page_size.to_string()),
                ("page", params.page.to_string()),
                ("sort", "-downloads".to_string()),
            ]);

        let resources: Vec<Resource> =
            http::send_json(request, "fetching SpigotMC plugins").await?;

        let plugins: Vec<PluginSummary> = resources
            .iter()
            .map(|r| PluginSummary {
                id: r.id.to_string(),
                name: r.name.clone(),
                short_description: r.tag.clone(),
                url: format!("{RESOURCE_PAGE_BASE_URL}/{}", r.id),
                icon_url: Some(icon_url(r.icon.as_ref())),
                external_url: external_url(r),
            })
            .collect();

        // Spiget reports no overall hit count; the page is all we know.
        let total = plugins.len() as u64;
        Ok(SearchResults { plugins, total })
    }
}

#[async_trait]
impl PluginProvider for SpigotMcProvider {
    fn name(&self) -> &'static str {
        "spigotmc"
    }

    async fn search(&self, params: &SearchParams) -> SearchResults {
        match self.try_search(params).await {
            Ok(results) => results,
            Err(err) => {
                log::warn!("SpigotMC search failed: {err}");
                SearchResults::default()
            }
        }
    }

    async fn versions(&self, plugin_id: &str) -> Result<Vec<PluginVersion>, GatewayError> {
        let request = self.client.get(format!(
            "{}/resources/{plugin_id}/versions/latest",
            self.base_url
        ));
        let latest: LatestVersion =
            http::send_json(request, "fetching SpigotMC plugin versions").await?;

        // Only the latest file is ever downloadable through Spiget.
        Ok(vec![PluginVersion {
            id: latest.id.to_string(),
            name: latest.name,
            game_versions: None,
            download_url: None,
        }])
    }

    async fn download_url(
        &self,
        plugin_id: &str,
        _version_id: &str,
    ) -> Result<String, GatewayError> {
        // Spiget can only hand out the latest file; the version id is
        // accepted for interface parity and ignored.
        let request = self
            .client
            .get(format!("{}/resources/{plugin_id}", self.base_url));
        let resource: Resource =
            http::send_json(request, "fetching SpigotMC resource details").await?;

        let download_url = resource
            .file
            .as_ref()
            .and_then(|f| f.external_url.clone())
            .unwrap_or_else(|| format!("{}/resources/{plugin_id}/download", self.base_url));

        // Both endpoints usually answer with a redirect to the actual file;
        // hand the daemon the final URL so it downloads the file, not the
        // redirect page.
        Ok(self
            .resolve_redirect(&download_url)
            .await
            .unwrap_or(download_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(external: bool, premium: bool, file: Option<ResourceFile>) -> Resource {
        Resource {
            id: 9089,
            name: "EssentialsX".to_string(),
            tag: "The essential plugin suite".to_string(),
            icon: None,
            external,
            premium,
            file,
        }
    }

    #[test]
    fn icon_from_site_relative_url() {
        let icon = Icon {
            url: Some("data/resource_icons/9/9089.jpg".to_string()),
            data: None,
        };
        let url = icon_url(Some(&icon));
        assert!(url.starts_with(CORS_RELAY_URL));
        assert!(url.contains("spigotmc.org%2Fdata%2Fresource_icons"));
    }

    #[test]
    fn icon_falls_back_to_inline_data_then_stock() {
        let icon = Icon {
            url: None,
            data: Some("data:image/png;base64,AAAA".to_string()),
        };
        assert_eq!(
            icon_url(Some(&icon)),
            format!(
                "{CORS_RELAY_URL}{}",
                urlencoding::encode("data:image/png;base64,AAAA")
            )
        );

        assert_eq!(
            icon_url(None),
            format!("{CORS_RELAY_URL}{}", urlencoding::encode(DEFAULT_ICON_URL))
        );
    }

    #[test]
    fn external_url_only_for_external_page_hosted_files() {
        let qualifying = resource(
            true,
            false,
            Some(ResourceFile {
                url: Some("resources/example.9089/download?version=1".to_string()),
                external_url: Some("https://example.com/plugin.html".to_string()),
            }),
        );
        assert_eq!(
            external_url(&qualifying).as_deref(),
            Some("https://www.spigotmc.org/resources/example.9089/download?version=1")
        );

        // Direct jar hosting does not qualify.
        let direct = resource(
            true,
            false,
            Some(ResourceFile {
                url: Some("resources/x/download".to_string()),
                external_url: Some("https://example.com/plugin.jar".to_string()),
            }),
        );
        assert!(external_url(&direct).is_none());

        // Premium resources never get an external route.
        let premium = resource(
            true,
            true,
            Some(ResourceFile {
                url: Some("resources/x/download".to_string()),
                external_url: Some("https://example.com/plugin.html".to_string()),
            }),
        );
        assert!(external_url(&premium).is_none());

        // Internally hosted files do not qualify either.
        let internal = resource(false, false, None);
        assert!(external_url(&internal).is_none());
    }

    #[test]
    fn hangar_hosted_externals_qualify() {
        let hangar = resource(
            true,
            false,
            Some(ResourceFile {
                url: Some("resources/viaversion.19254/download".to_string()),
                external_url: Some("https://hangar.papermc.io/ViaVersion/ViaVersion".to_string()),
            }),
        );
        assert!(external_url(&hangar).is_some());
    }
}
