mod cli;

use std::sync::Arc;

use clap::Parser;

use cli::Cli;
use plugin_gateway::api::{self, AppState};
use plugin_gateway::config::Config;
use plugin_gateway::daemon::DaemonClient;
use plugin_gateway::links::LinkStore;
use plugin_gateway::providers::{http, ProviderRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::from_env();

    let links = LinkStore::open(&cli.database)?;
    let registry = ProviderRegistry::new(&config);
    let daemon = DaemonClient::from_config(http::build_client(&config.user_agent()), &config);
    if daemon.is_none() {
        log::warn!("daemon settings incomplete; plugin installs are disabled");
    }

    let state = Arc::new(AppState {
        config,
        registry,
        links,
        daemon,
    });
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&cli.bind).await?;
    log::info!("listening on {}", cli.bind);
    axum::serve(listener, app).await?;

    Ok(())
}
