//! HTTP surface for the host platform: slash commands, the configuration-change
//! notification and the OAuth2 redirect target.

use axum::http::{header, HeaderValue, Method};
use domain::command::CommandDispatcher;
use domain::configuration::ConfigurationManager;
use domain::host::{ConfigStore, Host};
use domain::jobs::{BackgroundJobs, JobRunner};
use domain::meeting::MeetingService;
use domain::meeting_client::ClientFactory;
use domain::oauth_flow::Authenticator;
use domain::EventPublisher;
use log::*;
use service::config::Config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

mod controller;
pub mod error;
mod params;
pub mod router;

pub use error::{Error, Result};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub configuration: Arc<ConfigurationManager>,
    pub config_store: Arc<dyn ConfigStore>,
    pub jobs: Arc<BackgroundJobs>,
    pub meetings: Arc<MeetingService>,
    pub commands: Arc<CommandDispatcher>,
}

impl AppState {
    /// Wire every component against `host`. Starts the background job worker, so it
    /// must be called within a Tokio runtime.
    pub fn new(
        config: Config,
        host: Host,
        client_factory: ClientFactory,
        events: EventPublisher,
    ) -> Self {
        let configuration = Arc::new(ConfigurationManager::new());
        let jobs = Arc::new(BackgroundJobs::start(JobRunner::new(
            host.kv.clone(),
            host.config_store.clone(),
            configuration.clone(),
        )));

        let authenticator = Authenticator::from_config(
            &config,
            configuration.clone(),
            host.kv.clone(),
            client_factory,
        );
        let meetings = Arc::new(MeetingService::new(
            host.clone(),
            authenticator,
            events,
            config.bot_user_id(),
        ));
        let commands = Arc::new(CommandDispatcher::new(meetings.clone()));

        Self {
            config,
            configuration,
            config_store: host.config_store,
            jobs,
            meetings,
            commands,
        }
    }
}

/// Serve until Ctrl-C, then drain the background job queue.
pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let interface = app_state.config.interface.as_deref().unwrap_or("127.0.0.1");
    let listen_addr = format!("{}:{}", interface, app_state.config.port);

    info!("Server starting... listening for connections on http://{listen_addr}");

    let cors_layer = match HeaderValue::from_str(app_state.config.site_url()) {
        Ok(origin) => CorsLayer::new()
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE])
            .allow_origin(origin),
        Err(e) => {
            warn!("Site URL is not a valid origin, CORS disabled: {}", e);
            CorsLayer::new()
        }
    };

    let listener = TcpListener::bind(&listen_addr).await?;
    let jobs = app_state.jobs.clone();
    let router = router::define_routes(app_state).layer(cors_layer);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, draining background jobs");
    jobs.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use clap::Parser;
    use domain::configuration::Configuration;
    use domain::error::Error as DomainError;
    use domain::host::memory::MemoryHost;
    use domain::meeting_client::{MeetingClient, OnlineMeeting, RemoteUser};
    use meeting_auth::credentials::UserInfo;
    use meeting_auth::oauth::token::Tokens;
    use serde_json::Map;

    struct FixedClient;

    #[async_trait]
    impl MeetingClient for FixedClient {
        async fn create_meeting(
            &self,
            _creator: &UserInfo,
            _attendees: &[UserInfo],
            _subject: &str,
        ) -> core::result::Result<OnlineMeeting, DomainError> {
            Ok(OnlineMeeting {
                join_url: "https://teams.microsoft.com/l/meetup-join/abc".to_string(),
                extra: Map::new(),
            })
        }

        async fn fetch_current_identity(&self) -> core::result::Result<RemoteUser, DomainError> {
            Ok(RemoteUser {
                id: "r1".to_string(),
                user_principal_name: "alice@contoso.com".to_string(),
                mail: None,
                extra: Map::new(),
            })
        }
    }

    pub(crate) fn valid_config() -> Configuration {
        Configuration {
            oauth2_authority: "contoso".to_string(),
            oauth2_client_id: "client-123".to_string(),
            oauth2_client_secret: "shh".to_string(),
            encryption_key: "demo_encrypt_key".to_string(),
        }
    }

    pub(crate) async fn app_state_with(host: &Arc<MemoryHost>, provider_url: &str) -> AppState {
        host.add_user("u1", "alice").await;
        host.add_channel_member("c1", "u1").await;

        let config = Config::parse_from(["mstmeetings"])
            .set_provider_base_urls(provider_url.to_string(), provider_url.to_string());
        let factory: ClientFactory = Arc::new(
            |_config: &Configuration,
             _tokens: Tokens|
             -> core::result::Result<Box<dyn MeetingClient>, DomainError> {
                Ok(Box::new(FixedClient))
            },
        );

        let state = AppState::new(
            config,
            Host::from_shared(host.clone()),
            factory,
            EventPublisher::new(),
        );
        state.configuration.publish(valid_config());
        state
    }

    pub(crate) async fn app_state() -> (Arc<MemoryHost>, AppState) {
        let host = Arc::new(MemoryHost::new());
        let state = app_state_with(&host, "https://login.microsoftonline.com").await;
        (host, state)
    }
}
