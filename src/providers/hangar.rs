// Hangar provider (hangar.papermc.io, the PaperMC plugin repository)

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::GatewayError;
use crate::providers::http;
use crate::providers::models::{PluginSummary, PluginVersion, SearchResults};
use crate::providers::provider_trait::{PluginProvider, SearchParams};

const DEFAULT_BASE_URL: &str = "https://hangar.papermc.io/api/v1";
const PROJECT_PAGE_BASE_URL: &str = "https://hangar.papermc.io";

/// Upstream rejects page sizes above 25; the gateway clamps before calling.
pub const MAX_PAGE_SIZE: u32 = 25;

/// How many versions the install dialog gets to pick from.
const VERSION_PAGE_LIMIT: u32 = 25;

#[derive(Debug, Deserialize)]
struct ProjectsResponse {
    pagination: Pagination,
    result: Vec<Project>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct Project {
    name: String,
    description: String,
    namespace: Namespace,
    #[serde(rename = "avatarUrl")]
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Namespace {
    owner: String,
    slug: String,
}

#[derive(Debug, Deserialize)]
struct VersionsResponse {
    result: Vec<Version>,
}

// BTreeMap keeps the per-platform listing order stable across calls.
#[derive(Debug, Deserialize)]
struct Version {
    name: String,
    downloads: BTreeMap<String, Download>,
}

#[derive(Debug, Deserialize)]
struct VersionDetail {
    downloads: BTreeMap<String, Download>,
}

#[derive(Debug, Deserialize)]
struct Download {
    #[serde(rename = "downloadUrl")]
    download_url: Option<String>,
    #[serde(rename = "externalUrl")]
    external_url: Option<String>,
}

/// A Hangar version id packs the platform and the version name into one
/// key, since a single version ships separate files per platform.
fn version_key(platform: &str, version_name: &str) -> String {
    format!("{platform}-{version_name}")
}

/// Recover platform and version name from a composite id. Splits on the
/// first `-`; platform names never contain one, version names may.
fn split_version_key(version_id: &str) -> Result<(&str, &str), GatewayError> {
    version_id
        .split_once('-')
        .ok_or_else(|| GatewayError::NotFound(format!("Hangar version '{version_id}'")))
}

fn flatten_versions(versions: Vec<Version>) -> Vec<PluginVersion> {
    let mut flattened = Vec::new();
    for version in versions {
        let Version { name, downloads } = version;
        for (platform, download) in downloads {
            flattened.push(PluginVersion {
                id: version_key(&platform, &name),
                name: format!("{name} ({platform})"),
                game_versions: None,
                download_url: download.download_url,
            });
        }
    }
    flattened
}

pub struct HangarProvider {
    client: Client,
    base_url: String,
}

impl HangarProvider {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn try_search(&self, params: &SearchParams) -> Result<SearchResults, GatewayError> {
        let mut request = self
            .client
            .get(format!("{}/projects", self.base_url))
            .query(&[
                ("limit", params.page_size.to_string()),
                ("offset", ((params.page - 1) * params.page_size).to_string()),
            ]);
        if !params.query.is_empty() {
            request = request.query(&[("query", params.query.as_str())]);
        }

        let response: ProjectsResponse =
            http::send_json(request, "fetching Hangar plugins").await?;

        let plugins = response
            .result
            .into_iter()
            .map(|p| PluginSummary {
                id: p.name.clone(),
                name: p.name,
                short_description: p.description,
                url: format!(
                    "{PROJECT_PAGE_BASE_URL}/{}/{}",
                    p.namespace.owner, p.namespace.slug
                ),
                icon_url: p.avatar_url,
                external_url: None,
            })
            .collect();

        Ok(SearchResults {
            plugins,
            total: response.pagination.count,
        })
    }
}

#[async_trait]
impl PluginProvider for HangarProvider {
    fn name(&self) -> &'static str {
        "hangar"
    }

    async fn search(&self, params: &SearchParams) -> SearchResults {
        match self.try_search(params).await {
            Ok(results) => results,
            Err(err) => {
                log::warn!("Hangar search failed: {err}");
                SearchResults::default()
            }
        }
    }

    async fn versions(&self, plugin_id: &str) -> Result<Vec<PluginVersion>, GatewayError> {
        let request = self
            .client
            .get(format!("{}/projects/{plugin_id}/versions", self.base_url))
            .query(&[
                ("limit", VERSION_PAGE_LIMIT.to_string()),
                ("offset", "0".to_string()),
            ]);

        let response: VersionsResponse =
            match http::send_json(request, "fetching Hangar plugin versions").await {
                Ok(response) => response,
                Err(err) => {
                    log::warn!("Hangar version listing failed: {err}");
                    return Ok(Vec::new());
                }
            };

        Ok(flatten_versions(response.result))
    }

    async fn download_url(
        &self,
        plugin_id: &str,
        version_id: &str,
    ) -> Result<String, GatewayError> {
        let context = "fetching Hangar plugin file";
        let (platform, version_name) = split_version_key(version_id)?;

        let request = self.client.get(format!(
            "{}/projects/{plugin_id}/versions/{version_name}",
            self.base_url
        ));
        let mut response: VersionDetail = http::send_json(request, context).await?;

        let download = response
            .downloads
            .remove(platform)
            .ok_or_else(|| GatewayError::NotFound(format!("Hangar download for platform '{platform}'")))?;

        download
            .download_url
            .or(download.external_url)
            .ok_or_else(|| GatewayError::malformed(context, "version carries no download URL"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_key_round_trips() {
        let id = version_key("PAPER", "1.2.0");
        assert_eq!(split_version_key(&id).unwrap(), ("PAPER", "1.2.0"));
    }

    #[test]
    fn version_key_round_trips_with_dash_in_version_name() {
        let id = version_key("WATERFALL", "2.0-SNAPSHOT-rc1");
        assert_eq!(
            split_version_key(&id).unwrap(),
            ("WATERFALL", "2.0-SNAPSHOT-rc1")
        );
    }

    #[test]
    fn malformed_version_key_is_rejected() {
        assert!(split_version_key("nodash").is_err());
    }

    #[test]
    fn versions_flatten_one_entry_per_platform_download() {
        let raw = r#"{
            "result": [
                {
                    "name": "5.1.0",
                    "downloads": {
                        "PAPER": {"downloadUrl": "https://hangar.papermc.io/dl/paper.jar", "externalUrl": null},
                        "VELOCITY": {"downloadUrl": null, "externalUrl": "https://example.com/velocity.jar"}
                    }
                }
            ]
        }"#;

        let response: VersionsResponse = serde_json::from_str(raw).unwrap();
        let versions = flatten_versions(response.result);

        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].id, "PAPER-5.1.0");
        assert_eq!(versions[0].name, "5.1.0 (PAPER)");
        assert_eq!(
            versions[0].download_url.as_deref(),
            Some("https://hangar.papermc.io/dl/paper.jar")
        );
        // External downloads resolve at install time, not in the listing.
        assert_eq!(versions[1].id, "VELOCITY-5.1.0");
        assert!(versions[1].download_url.is_none());
    }
}
