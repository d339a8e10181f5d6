// Polymart provider (api.polymart.org, JSON POST API)
//
// Polymart is the one marketplace with an account-linking handshake: a
// connected user gets premium resources in search results and can resolve
// premium downloads. The adapter is therefore built per request, carrying
// the requesting user's stored link token.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::GatewayError;
use crate::providers::http;
use crate::providers::models::{PluginSummary, PluginVersion, SearchResults};
use crate::providers::provider_trait::{PluginProvider, SearchParams};

const DEFAULT_BASE_URL: &str = "https://api.polymart.org/v1";

/// Upstream caps search pages at 50 results.
pub const MAX_PAGE_SIZE: u32 = 50;

/// How many updates the install dialog gets to pick from.
const VERSION_PAGE_LIMIT: u32 = 50;

/// Polymart is loose about scalar types; ids arrive as numbers or strings.
fn de_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// Success flags arrive as booleans, numbers or strings depending on the
/// endpoint.
fn de_truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0" || s == "false"),
        _ => false,
    })
}

#[derive(Serialize)]
struct SearchBody<'a> {
    start: u32,
    limit: u32,
    /// `"0"` hides premium listings; omitted entirely for linked users.
    #[serde(skip_serializing_if = "Option::is_none")]
    premium: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
    query: &'a str,
}

#[derive(Serialize)]
struct UpdatesBody<'a> {
    resource_id: &'a str,
    start: u32,
    limit: u32,
}

#[derive(Serialize)]
struct DownloadBody<'a> {
    resource_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
}

#[derive(Serialize)]
struct AuthorizeBody<'a> {
    service: &'a str,
    return_url: &'a str,
    return_token: bool,
    state: &'a str,
}

#[derive(Serialize)]
struct InvalidateBody<'a> {
    token: &'a str,
}

/// Every Polymart payload is nested under a `response` key.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    response: T,
}

#[derive(Debug, Deserialize)]
struct SearchInner {
    result: Vec<Resource>,
    total: u64,
}

#[derive(Debug, Deserialize)]
struct Resource {
    #[serde(deserialize_with = "de_string_or_number")]
    id: String,
    title: String,
    subtitle: String,
    url: String,
    #[serde(rename = "thumbnailURL")]
    thumbnail_url: Option<String>,
    #[serde(rename = "canDownload", deserialize_with = "de_truthy")]
    can_download: bool,
}

#[derive(Debug, Deserialize)]
struct UpdatesInner {
    updates: Vec<Update>,
}

#[derive(Debug, Deserialize)]
struct Update {
    #[serde(deserialize_with = "de_string_or_number")]
    id: String,
    version: String,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DownloadInner {
    #[serde(deserialize_with = "de_truthy")]
    success: bool,
    result: Option<DownloadResult>,
}

#[derive(Debug, Deserialize)]
struct DownloadResult {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthorizeInner {
    #[serde(deserialize_with = "de_truthy")]
    success: bool,
    result: Option<AuthorizeResult>,
}

#[derive(Debug, Deserialize)]
struct AuthorizeResult {
    url: Option<String>,
}

/// Display name for an update: the bare version, or "version - title" when
/// the update carries a distinct title.
fn update_display_name(version: &str, title: Option<&str>) -> String {
    match title {
        Some(title) if !title.is_empty() && title != version => {
            format!("{version} - {title}")
        }
        _ => version.to_string(),
    }
}

pub struct PolymartProvider {
    client: Client,
    base_url: String,
    /// Link token of the requesting user, when their account is connected.
    token: Option<String>,
}

impl PolymartProvider {
    pub fn new(client: Client, token: Option<String>) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            token,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(format!("{}/{path}", self.base_url))
    }

    async fn try_search(&self, params: &SearchParams) -> Result<SearchResults, GatewayError> {
        let body = SearchBody {
            start: (params.page - 1) * params.page_size,
            limit: params.page_size,
            premium: if self.token.is_some() { None } else { Some("0") },
            token: self.token.as_deref(),
            query: &params.query,
        };

        let response: Envelope<SearchInner> =
            http::send_json(self.post("search").json(&body), "fetching Polymart plugins").await?;

        let plugins = response
            .response
            .result
            .into_iter()
            .map(|r| {
                // Resources the caller cannot download directly route the
                // user to the resource page instead.
                let external_url = (!r.can_download).then(|| r.url.clone());
                PluginSummary {
                    id: r.id,
                    name: r.title,
                    short_description: r.subtitle,
                    url: r.url,
                    icon_url: r.thumbnail_url,
                    external_url,
                }
            })
            .collect();

        Ok(SearchResults {
            plugins,
            total: response.response.total,
        })
    }

    /// Ask Polymart to start the account-linking handshake. Returns the URL
    /// the user's browser must be sent to.
    pub async fn authorize_user(
        &self,
        service: &str,
        return_url: &str,
        state: &str,
    ) -> Result<String, GatewayError> {
        let context = "requesting Polymart user authorization";
        let body = AuthorizeBody {
            service,
            return_url,
            return_token: false,
            state,
        };

        let response: Envelope<AuthorizeInner> =
            http::send_json(self.post("authorizeUser").json(&body), context).await?;

        if !response.response.success {
            return Err(GatewayError::malformed(
                context,
                "upstream refused the authorization request",
            ));
        }
        response
            .response
            .result
            .and_then(|r| r.url)
            .ok_or_else(|| GatewayError::malformed(context, "no redirect URL returned"))
    }

    /// Revoke a link token upstream. Callers treat failures as non-fatal.
    pub async fn invalidate_token(&self, token: &str) -> Result<(), GatewayError> {
        let request = self.post("invalidateAuthToken").json(&InvalidateBody { token });
        let response = request.send().await?;
        http::check_status(response, "invalidating Polymart auth token").await?;
        Ok(())
    }
}

#[async_trait]
impl PluginProvider for PolymartProvider {
    fn name(&self) -> &'static str {
        "polymart"
    }

    async fn search(&self, params: &SearchParams) -> SearchResults {
        match self.try_search(params).await {
            Ok(results) => results,
            Err(err) => {
                log::warn!("Polymart search failed: {err}");
                SearchResults::default()
            }
        }
    }

    async fn versions(&self, plugin_id: &str) -> Result<Vec<PluginVersion>, GatewayError> {
        let body = UpdatesBody {
            resource_id: plugin_id,
            start: 0,
            limit: VERSION_PAGE_LIMIT,
        };

        let response: Envelope<UpdatesInner> = http::send_json(
            self.post("getResourceUpdates").json(&body),
            "fetching Polymart plugin versions",
        )
        .await?;

        Ok(response
            .response
            .updates
            .into_iter()
            .map(|u| PluginVersion {
                id: u.id,
                name: update_display_name(&u.version, u.title.as_deref()),
                game_versions: None,
                // Resolved at install time via getDownloadURL.
                download_url: None,
            })
            .collect())
    }

    async fn download_url(
        &self,
        plugin_id: &str,
        _version_id: &str,
    ) -> Result<String, GatewayError> {
        // Polymart cannot mint links for a specific version; the version id
        // is accepted for interface parity and ignored.
        let context = "fetching Polymart plugin file";
        let body = DownloadBody {
            resource_id: plugin_id,
            token: self.token.as_deref(),
        };

        let response: Envelope<DownloadInner> =
            http::send_json(self.post("getDownloadURL").json(&body), context).await?;

        if !response.response.success {
            return Err(GatewayError::malformed(
                context,
                "upstream refused to issue a download URL",
            ));
        }
        response
            .response
            .result
            .and_then(|r| r.url)
            .ok_or_else(|| GatewayError::malformed(context, "no download URL returned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_name_plain_when_title_matches_or_missing() {
        assert_eq!(update_display_name("1.4.2", None), "1.4.2");
        assert_eq!(update_display_name("1.4.2", Some("1.4.2")), "1.4.2");
        assert_eq!(update_display_name("1.4.2", Some("")), "1.4.2");
    }

    #[test]
    fn update_name_combines_distinct_title() {
        assert_eq!(
            update_display_name("1.4.2", Some("The Aquatic Update")),
            "1.4.2 - The Aquatic Update"
        );
    }

    #[test]
    fn search_body_hides_premium_without_token() {
        let body = SearchBody {
            start: 0,
            limit: 25,
            premium: Some("0"),
            token: None,
            query: "essentials",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["premium"], "0");
        assert!(json.get("token").is_none());
    }

    #[test]
    fn search_body_sends_token_for_linked_users() {
        let body = SearchBody {
            start: 50,
            limit: 50,
            premium: None,
            token: Some("abc123"),
            query: "",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("premium").is_none());
        assert_eq!(json["token"], "abc123");
    }

    #[test]
    fn resource_ids_accept_numbers_and_strings() {
        let raw = r#"{
            "response": {
                "result": [
                    {"id": 629, "title": "A", "subtitle": "a", "url": "https://polymart.org/r/629",
                     "thumbnailURL": null, "canDownload": 1},
                    {"id": "630", "title": "B", "subtitle": "b", "url": "https://polymart.org/r/630",
                     "thumbnailURL": "https://polymart.org/t.png", "canDownload": false}
                ],
                "total": 2
            }
        }"#;

        let envelope: Envelope<SearchInner> = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.response.result[0].id, "629");
        assert!(envelope.response.result[0].can_download);
        assert_eq!(envelope.response.result[1].id, "630");
        assert!(!envelope.response.result[1].can_download);
    }
}
