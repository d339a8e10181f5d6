// Marketplace provider adapters and dispatch

use std::sync::Arc;

use reqwest::Client;
use serde::{Deserialize, Serialize};

pub mod curseforge;
pub mod hangar;
pub mod http;
pub mod models;
pub mod modrinth;
pub mod polymart;
pub mod provider_trait;
pub mod spigotmc;

pub use provider_trait::{PluginProvider, SearchParams};

use crate::config::Config;
use curseforge::CurseForgeProvider;
use hangar::HangarProvider;
use modrinth::{LoaderTagCache, ModrinthProvider};
use polymart::PolymartProvider;
use spigotmc::SpigotMcProvider;

/// The marketplaces the panel can browse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    CurseForge,
    Hangar,
    Modrinth,
    Polymart,
    SpigotMc,
}

impl Provider {
    pub fn name(self) -> &'static str {
        match self {
            Provider::CurseForge => "curseforge",
            Provider::Hangar => "hangar",
            Provider::Modrinth => "modrinth",
            Provider::Polymart => "polymart",
            Provider::SpigotMc => "spigotmc",
        }
    }

    /// Hard page-size limit imposed by the marketplace, when there is one.
    pub fn page_size_cap(self) -> Option<u32> {
        match self {
            Provider::CurseForge => Some(curseforge::MAX_PAGE_SIZE),
            Provider::Hangar => Some(hangar::MAX_PAGE_SIZE),
            Provider::Polymart => Some(polymart::MAX_PAGE_SIZE),
            Provider::Modrinth | Provider::SpigotMc => None,
        }
    }
}

/// Process-wide adapter instances.
///
/// The four stateless providers are built once and shared. Polymart is
/// built per request because it carries the requesting user's link token.
pub struct ProviderRegistry {
    curseforge: Arc<CurseForgeProvider>,
    hangar: Arc<HangarProvider>,
    modrinth: Arc<ModrinthProvider>,
    spigotmc: Arc<SpigotMcProvider>,
    client: Client,
    polymart_base_url: Option<String>,
}

impl ProviderRegistry {
    pub fn new(config: &Config) -> Self {
        let client = http::build_client(&config.user_agent());
        let probe = http::build_probe_client(&config.user_agent());

        Self::from_parts(
            CurseForgeProvider::new(client.clone(), config.curseforge_api_key.clone()),
            HangarProvider::new(client.clone()),
            ModrinthProvider::new(client.clone(), LoaderTagCache::new()),
            SpigotMcProvider::new(client.clone(), probe),
            client,
            None,
        )
    }

    /// Assemble a registry from already-configured adapters. The optional
    /// base URL applies to the per-request Polymart adapters.
    pub fn from_parts(
        curseforge: CurseForgeProvider,
        hangar: HangarProvider,
        modrinth: ModrinthProvider,
        spigotmc: SpigotMcProvider,
        client: Client,
        polymart_base_url: Option<String>,
    ) -> Self {
        Self {
            curseforge: Arc::new(curseforge),
            hangar: Arc::new(hangar),
            modrinth: Arc::new(modrinth),
            spigotmc: Arc::new(spigotmc),
            client,
            polymart_base_url,
        }
    }

    /// Select the adapter for a provider. `polymart_token` is the stored
    /// link token of the requesting user; only Polymart looks at it.
    pub fn provider(&self, kind: Provider, polymart_token: Option<String>) -> Arc<dyn PluginProvider> {
        match kind {
            Provider::CurseForge => self.curseforge.clone(),
            Provider::Hangar => self.hangar.clone(),
            Provider::Modrinth => self.modrinth.clone(),
            Provider::SpigotMc => self.spigotmc.clone(),
            Provider::Polymart => Arc::new(self.polymart(polymart_token)),
        }
    }

    /// Build a Polymart adapter bound to one user's token.
    pub fn polymart(&self, token: Option<String>) -> PolymartProvider {
        let provider = PolymartProvider::new(self.client.clone(), token);
        match &self.polymart_base_url {
            Some(base) => provider.with_base_url(base.clone()),
            None => provider,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parses_from_lowercase_names() {
        for name in ["curseforge", "hangar", "modrinth", "polymart", "spigotmc"] {
            let provider: Provider = serde_json::from_value(serde_json::json!(name)).unwrap();
            assert_eq!(provider.name(), name);
        }
    }

    #[test]
    fn unknown_provider_is_rejected()  {
        assert!(serde_json::from_value::<Provider>(serde_json::json!("bukkit")).is_err());
    }

    #[test]
    fn page_size_caps_match_upstream_limits() {
        assert_eq!(Provider::CurseForge.page_size_cap(), Some(50));
        assert_eq!(Provider::Hangar.page_size_cap(), Some(25));
        assert_eq!(Provider::Polymart.page_size_cap(), Some(50));
        assert_eq!(Provider::Modrinth.page_size_cap(), None);
        assert_eq!(Provider::SpigotMc.page_size_cap(), None);
    }
}
