// CurseForge provider (api.curseforge.com, key-authenticated)

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::GatewayError;
use crate::providers::http;
use crate::providers::models::{PluginSummary, PluginVersion, SearchResults};
use crate::providers::provider_trait::{PluginProvider, SearchParams};

const DEFAULT_BASE_URL: &str = "https://api.curseforge.com/v1";

/// CurseForge game id for Minecraft.
const MINECRAFT_GAME_ID: u32 = 432;
/// Section id for Bukkit plugins.
const PLUGINS_CLASS_ID: u32 = 5;
/// Fixed listing sort: popularity.
const SORT_POPULARITY: u32 = 2;
/// The search endpoint rejects requests with `index + pageSize > 10000`.
const MAX_SEARCH_WINDOW: u64 = 10_000;

/// Hard page-size limit of the search endpoint.
pub const MAX_PAGE_SIZE: u32 = 50;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: Vec<Mod>,
    pagination: Pagination,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(rename = "totalCount")]
    total_count: u64,
}

#[derive(Debug, Deserialize)]
struct Mod {
    id: i64,
    name: String,
    summary: String,
    links: ModLinks,
    logo: Option<Logo>,
}

#[derive(Debug, Deserialize)]
struct ModLinks {
    #[serde(rename = "websiteUrl")]
    website_url: String,
}

#[derive(Debug, Deserialize)]
struct Logo {
    #[serde(rename = "thumbnailUrl")]
    thumbnail_url: String,
}

#[derive(Debug, Deserialize)]
struct FilesResponse {
    data: Vec<ModFile>,
}

#[derive(Debug, Deserialize)]
struct FileResponse {
    data: ModFile,
}

#[derive(Debug, Deserialize)]
struct ModFile {
    id: i64,
    #[serde(rename = "displayName")]
    display_name: String,
    #[serde(rename = "gameVersions")]
    game_versions: Vec<String>,
    #[serde(rename = "downloadUrl")]
    download_url: Option<String>,
}

pub struct CurseForgeProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl CurseForgeProvider {
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn get(&self, path: &str) -> Result<reqwest::RequestBuilder, GatewayError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(GatewayError::Configuration("PG_CURSEFORGE_API_KEY"))?;
        Ok(self
            .client
            .get(format!("{}/{path}", self.base_url))
            .header("X-API-Key", key))
    }

    /// The search window is bounded upstream, so the reported total must be
    /// clamped to the last page that can actually be requested.
    fn capped_total(page_size: u32, upstream_total: u64) -> u64 {
        let page_size = u64::from(page_size);
        let max_pages = (MAX_SEARCH_WINDOW - page_size) / page_size + 1;
        (max_pages * page_size).min(upstream_total)
    }

    async fn try_search(&self, params: &SearchParams) -> Result<SearchResults, GatewayError> {
        let mut request = self.get("mods/search")?.query(&[
            ("index", ((params.page - 1) * params.page_size).to_string()),
            ("pageSize", params.page_size.to_string()),
            ("gameId", MINECRAFT_GAME_ID.to_string()),
            ("classId", PLUGINS_CLASS_ID.to_string()),
            ("searchFilter", params.query.clone()),
            ("sortField", SORT_POPULARITY.to_string()),
            ("sortOrder", "desc".to_string()),
        ]);
        if !params.minecraft_version.is_empty() {
            request = request.query(&[("gameVersion", params.minecraft_version.as_str())]);
        }

        let response: SearchResponse =
            http::send_json(request, "fetching CurseForge plugins").await?;

        let plugins = response
            .data
            .into_iter()
            .map(|m| PluginSummary {
                id: m.id.to_string(),
                name: m.name,
                short_description: m.summary,
                url: m.links.website_url,
                icon_url: m.logo.map(|l| l.thumbnail_url),
                external_url: None,
            })
            .collect();

        Ok(SearchResults {
            plugins,
            total: Self::capped_total(params.page_size, response.pagination.total_count),
        })
    }
}

#[async_trait]
impl PluginProvider for CurseForgeProvider {
    fn name(&self) -> &'static str {
        "curseforge"
    }

    async fn search(&self, params: &SearchParams) -> SearchResults {
        match self.try_search(params).await {
            Ok(results) => results,
            Err(err) => {
                log::warn!("CurseForge search failed: {err}");
                SearchResults::default()
            }
        }
    }

    async fn versions(&self, plugin_id: &str) -> Result<Vec<PluginVersion>, GatewayError> {
        let request = self.get(&format!("mods/{plugin_id}/files"))?;
        let response: FilesResponse =
            match http::send_json(request, "fetching CurseForge plugin versions").await {
                Ok(response) => response,
                Err(err) => {
                    log::warn!("CurseForge version listing failed: {err}");
                    return Ok(Vec::new());
                }
            };

        Ok(response
            .data
            .into_iter()
            .map(|f| PluginVersion {
                id: f.id.to_string(),
                name: f.display_name,
                game_versions: Some(f.game_versions),
                download_url: f.download_url,
            })
            .collect())
    }

    async fn download_url(
        &self,
        plugin_id: &str,
        version_id: &str,
    ) -> Result<String, GatewayError> {
        let context = "fetching CurseForge plugin file";
        let request = self.get(&format!("mods/{plugin_id}/files/{version_id}"))?;
        let response: FileResponse = http::send_json(request, context).await?;

        let url = response
            .data
            .download_url
            .ok_or_else(|| GatewayError::malformed(context, "file carries no download URL"))?;

        // The edge CDN blocks server-side fetches; the mirror host does not.
        Ok(url.replace("edge", "mediafiles"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_capped_to_search_window() {
        // 200 pages of 50 are reachable before index + pageSize > 10000.
        assert_eq!(CurseForgeProvider::capped_total(50, 1_000_000), 10_000);
        assert_eq!(CurseForgeProvider::capped_total(10, 1_000_000), 10_000);
        // An uneven page size leaves the last partial window unreachable.
        assert_eq!(CurseForgeProvider::capped_total(30, 1_000_000), 9_990);
    }

    #[test]
    fn total_below_window_passes_through() {
        assert_eq!(CurseForgeProvider::capped_total(50, 137), 137);
        assert_eq!(CurseForgeProvider::capped_total(50, 0), 0);
    }

    #[test]
    fn search_response_maps_optional_logo() {
        let raw = r#"{
            "data": [
                {
                    "id": 31043,
                    "name": "WorldEdit",
                    "summary": "In-game map editor",
                    "links": {"websiteUrl": "https://www.curseforge.com/minecraft/bukkit-plugins/worldedit"},
                    "logo": {"thumbnailUrl": "https://media.forgecdn.net/thumb.png"}
                },
                {
                    "id": 31044,
                    "name": "NoLogo",
                    "summary": "No icon here",
                    "links": {"websiteUrl": "https://example.com"},
                    "logo": null
                }
            ],
            "pagination": {"totalCount": 2}
        }"#;

        let response: SearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.data.len(), 2);
        assert_eq!(response.data[0].logo.as_ref().unwrap().thumbnail_url, "https://media.forgecdn.net/thumb.png");
        assert!(response.data[1].logo.is_none());
    }
}
