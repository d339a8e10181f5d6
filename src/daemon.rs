// Client for the game-server daemon's remote file pull

use reqwest::Client;
use serde::Serialize;

use crate::config::Config;
use crate::constants::PLUGIN_INSTALL_DIR;
use crate::error::GatewayError;
use crate::providers::http;

#[derive(Serialize)]
struct PullRequest<'a> {
    url: &'a str,
    directory: &'a str,
    /// Name the staged file from the upstream Content-Disposition header.
    use_header: bool,
    /// Block until the file is fully staged.
    foreground: bool,
}

pub struct DaemonClient {
    client: Client,
    base_url: String,
    token: String,
    server: String,
}

impl DaemonClient {
    /// Build a client when the daemon settings are complete; installs stay
    /// disabled otherwise.
    pub fn from_config(client: Client, config: &Config) -> Option<Self> {
        Some(Self {
            client,
            base_url: config.daemon_url.clone()?,
            token: config.daemon_token.clone()?,
            server: config.server_uuid.clone()?,
        })
    }

    /// Ask the daemon to fetch `url` into the plugin directory and wait for
    /// the transfer to finish.
    pub async fn pull(&self, url: &str) -> Result<(), GatewayError> {
        let body = PullRequest {
            url,
            directory: PLUGIN_INSTALL_DIR,
            use_header: true,
            foreground: true,
        };

        let request = self
            .client
            .post(format!(
                "{}/api/servers/{}/files/pull",
                self.base_url, self.server
            ))
            .bearer_auth(&self.token)
            .json(&body);

        let response = request.send().await?;
        http::check_status(response, "requesting a plugin pull from the daemon").await?;
        Ok(())
    }
}
