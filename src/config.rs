// Environment-driven configuration

use std::env;

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Public base URL of this service, used for the Polymart return URL
    /// and the outbound User-Agent.
    pub public_url: String,
    /// Base URL of the panel UI, target of the post-link redirect.
    pub panel_url: String,
    pub curseforge_api_key: Option<String>,
    pub daemon_url: Option<String>,
    pub daemon_token: Option<String>,
    pub server_uuid: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let public_url = trim_url(
            env::var("PG_PUBLIC_URL").unwrap_or_else(|_| "http://localhost:8480".to_string()),
        );
        let panel_url = env::var("PG_PANEL_URL")
            .map(trim_url)
            .unwrap_or_else(|_| public_url.clone());

        Self {
            public_url,
            panel_url,
            curseforge_api_key: env::var("PG_CURSEFORGE_API_KEY").ok(),
            daemon_url: env::var("PG_DAEMON_URL").ok().map(trim_url),
            daemon_token: env::var("PG_DAEMON_TOKEN").ok(),
            server_uuid: env::var("PG_SERVER_UUID").ok(),
        }
    }

    /// Outbound User-Agent identifying the panel to the marketplaces.
    pub fn user_agent(&self) -> String {
        format!(
            "{}/{} ({})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            self.public_url
        )
    }

    /// Hostname of the public URL, as reported to Polymart.
    pub fn public_host(&self) -> &str {
        let rest = self
            .public_url
            .strip_prefix("https://")
            .or_else(|| self.public_url.strip_prefix("http://"))
            .unwrap_or(&self.public_url);
        let host = rest.split('/').next().unwrap_or(rest);
        host.split(':').next().unwrap_or(host)
    }
}

fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_public_url(url: &str) -> Config {
        Config {
            public_url: url.to_string(),
            panel_url: url.to_string(),
            curseforge_api_key: None,
            daemon_url: None,
            daemon_token: None,
            server_uuid: None,
        }
    }

    #[test]
    fn public_host_strips_scheme_path_and_port() {
        assert_eq!(
            config_with_public_url("https://panel.example.com").public_host(),
            "panel.example.com"
        );
        assert_eq!(
            config_with_public_url("http://panel.example.com:8480/gateway").public_host(),
            "panel.example.com"
        );
        assert_eq!(
            config_with_public_url("panel.example.com").public_host(),
            "panel.example.com"
        );
    }

    #[test]
    fn user_agent_names_the_service_and_public_url() {
        let agent = config_with_public_url("https://panel.example.com").user_agent();
        assert!(agent.starts_with("plugin-gateway/"));
        assert!(agent.ends_with("(https://panel.example.com)"));
    }
}
