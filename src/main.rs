use domain::configuration::Configuration;
use domain::gateway::ms_graph;
use domain::host::memory::MemoryHost;
use domain::host::Host;
use domain::{EventPublisher, LogEventHandler};
use log::*;
use service::{config::Config, logging::Logger};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config as &Config);

    info!(
        "Starting MS Teams Meetings service [{:?}] for {}",
        config.runtime_env(),
        config.site_url()
    );

    // The host platform is reached in process; its plugin settings come from Config.
    let host = Arc::new(MemoryHost::with_open_directory());
    host.set_plugin_config(seed_configuration(&config)).await;

    let events = EventPublisher::new().with_handler(Arc::new(LogEventHandler));
    let app_state = web::AppState::new(
        config.clone(),
        Host::from_shared(host.clone()),
        ms_graph::client_factory(&config),
        events,
    );

    if let Err(e) = app_state
        .configuration
        .on_configuration_change(host.as_ref(), &app_state.jobs)
        .await
    {
        warn!("Starting with an incomplete plugin configuration: {e}");
    }

    if let Err(e) = web::init_server(app_state).await {
        error!("Server failed: {e}");
        std::process::exit(1);
    }
}

fn seed_configuration(config: &Config) -> Configuration {
    Configuration {
        oauth2_authority: config.oauth2_authority().unwrap_or_default(),
        oauth2_client_id: config.oauth2_client_id().unwrap_or_default(),
        oauth2_client_secret: config.oauth2_client_secret().unwrap_or_default(),
        encryption_key: config.encryption_key().unwrap_or_default(),
    }
}
