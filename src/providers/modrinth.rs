// Modrinth provider (api.modrinth.com)

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::GatewayError;
use crate::providers::http;
use crate::providers::models::{PluginSummary, PluginVersion, SearchResults};
use crate::providers::provider_trait::{PluginProvider, SearchParams};

const DEFAULT_BASE_URL: &str = "https://api.modrinth.com/v2";
const PLUGIN_PAGE_BASE_URL: &str = "https://modrinth.com/plugin";

/// How long the upstream loader-tag list is reused before re-fetching.
const LOADER_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Vec<Hit>,
    total_hits: u64,
}

#[derive(Debug, Deserialize)]
struct Hit {
    project_id: String,
    slug: String,
    title: String,
    description: String,
    icon_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Version {
    id: String,
    name: String,
    game_versions: Vec<String>,
    files: Vec<VersionFile>,
}

#[derive(Debug, Deserialize)]
struct VersionFile {
    url: String,
}

#[derive(Debug, Deserialize)]
struct LoaderTag {
    name: String,
    supported_project_types: Vec<String>,
}

/// Loader names that can host plugins, kept from the full upstream tag
/// list (which also covers mod and modpack loaders).
fn plugin_loaders(tags: Vec<LoaderTag>) -> Vec<String> {
    tags.into_iter()
        .filter(|tag| tag.supported_project_types.iter().any(|t| t == "plugin"))
        .map(|tag| tag.name)
        .collect()
}

fn normalize_hits(hits: Vec<Hit>) -> Vec<PluginSummary> {
    hits.into_iter()
        .map(|hit| PluginSummary {
            id: hit.project_id,
            name: hit.title,
            short_description: hit.description,
            url: format!("{PLUGIN_PAGE_BASE_URL}/{}", hit.slug),
            icon_url: hit.icon_url.filter(|url| !url.is_empty()),
            external_url: None,
        })
        .collect()
}

/// Search facet expression: plugins that run server-side, optionally
/// narrowed to one Minecraft version.
fn facets(minecraft_version: &str) -> String {
    let mut facets = String::from(r#"[["project_type:plugin"],["server_side!=unsupported"]"#);
    if !minecraft_version.is_empty() {
        facets.push_str(&format!(r#",["versions:{minecraft_version}"]"#));
    }
    facets.push(']');
    facets
}

/// Lazily refreshed, time-expiring copy of the upstream loader-tag list.
pub struct LoaderTagCache {
    ttl: Duration,
    inner: Mutex<Option<CachedLoaders>>,
}

struct CachedLoaders {
    loaders: Vec<String>,
    fetched_at: Instant,
}

impl LoaderTagCache {
    pub fn new() -> Self {
        Self::with_ttl(LOADER_CACHE_TTL)
    }

    fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(None),
        }
    }

    fn get(&self) -> Option<Vec<String>> {
        let guard = self.inner.lock().expect("loader cache poisoned");
        let cached = guard.as_ref()?;
        if cached.fetched_at.elapsed() >= self.ttl {
            return None;
        }
        Some(cached.loaders.clone())
    }

    fn store(&self, loaders: Vec<String>) {
        let mut guard = self.inner.lock().expect("loader cache poisoned");
        *guard = Some(CachedLoaders {
            loaders,
            fetched_at: Instant::now(),
        });
    }
}

impl Default for LoaderTagCache {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ModrinthProvider {
    client: Client,
    base_url: String,
    loader_cache: LoaderTagCache,
}

impl ModrinthProvider {
    pub fn new(client: Client, loader_cache: LoaderTagCache) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            loader_cache,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn loaders(&self) -> Result<Vec<String>, GatewayError> {
        if let Some(loaders) = self.loader_cache.get() {
            return Ok(loaders);
        }

        let request = self.client.get(format!("{}/tag/loader", self.base_url));
        let tags: Vec<LoaderTag> =
            http::send_json(request, "fetching Modrinth loader tags").await?;

        let loaders = plugin_loaders(tags);
        self.loader_cache.store(loaders.clone());
        Ok(loaders)
    }

    async fn try_search(&self, params: &SearchParams) -> Result<SearchResults, GatewayError> {
        let request = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("offset", ((params.page - 1) * params.page_size).to_string()),
                ("facets", facets(&params.minecraft_version)),
                ("limit", params.page_size.to_string()),
                ("query", params.query.clone()),
                ("index", "relevance".to_string()),
            ]);

        let response: SearchResponse =
            http::send_json(request, "fetching Modrinth plugins").await?;

        Ok(SearchResults {
            plugins: normalize_hits(response.hits),
            total: response.total_hits,
        })
    }
}

#[async_trait]
impl PluginProvider for ModrinthProvider {
    fn name(&self) -> &'static str {
        "modrinth"
    }

    async fn search(&self, params: &SearchParams) -> SearchResults {
        match self.try_search(params).await {
            Ok(results) => results,
            Err(err) => {
                log::warn!("Modrinth search failed: {err}");
                SearchResults::default()
            }
        }
    }

    async fn versions(&self, plugin_id: &str) -> Result<Vec<PluginVersion>, GatewayError> {
        let loaders = self.loaders().await?;
        let loaders = loaders
            .iter()
            .map(|l| format!("\"{l}\""))
            .collect::<Vec<_>>()
            .join(",");

        let request = self
            .client
            .get(format!("{}/project/{plugin_id}/version", self.base_url))
            .query(&[("loaders", format!("[{loaders}]"))]);

        let versions: Vec<Version> =
            http::send_json(request, "fetching Modrinth plugin versions").await?;

        Ok(versions
            .into_iter()
            .map(|v| PluginVersion {
                id: v.id,
                name: v.name,
                game_versions: Some(v.game_versions),
                download_url: v.files.into_iter().next().map(|f| f.url),
            })
            .collect())
    }

    async fn download_url(
        &self,
        plugin_id: &str,
        version_id: &str,
    ) -> Result<String, GatewayError> {
        let context = "fetching Modrinth plugin file";
        let request = self.client.get(format!(
            "{}/project/{plugin_id}/version/{version_id}",
            self.base_url
        ));
        let version: Version = http::send_json(request, context).await?;

        version
            .files
            .into_iter()
            .next()
            .map(|f| f.url)
            .ok_or_else(|| GatewayError::malformed(context, "version carries no files"))
    }
}
