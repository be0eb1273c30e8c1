use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default Microsoft identity platform host.
pub const DEFAULT_LOGIN_BASE_URL: &str = "https://login.microsoftonline.com";

/// Default Microsoft Graph API base URL.
pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Upper bound for `--oauth-state-ttl-secs`.
pub const MAX_OAUTH_STATE_TTL_SECS: i64 = 86_400;

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap()),
    )]
    pub runtime_env: RustEnv,

    /// Public base URL of the chat host. The OAuth2 redirect URL is built from it.
    #[arg(long, env, default_value = "http://localhost:8065")]
    site_url: String,

    /// Plugin identifier used in the redirect path and as the state key prefix.
    #[arg(long, env, default_value = "mstmeetings")]
    plugin_id: String,

    /// User id that authors ephemeral replies.
    #[arg(long, env, default_value = "mstmeetings-bot")]
    bot_user_id: String,

    /// The Microsoft login host. Override in tests to point at a mock server.
    #[arg(long, env, default_value = DEFAULT_LOGIN_BASE_URL)]
    login_base_url: String,

    /// The Microsoft Graph API base URL. Override in tests to point at a mock server.
    #[arg(long, env, default_value = DEFAULT_GRAPH_BASE_URL)]
    graph_base_url: String,

    /// Transport deadline in seconds for every provider call
    #[arg(long, env, default_value_t = 30)]
    pub provider_timeout_secs: u64,

    /// Seconds a pending OAuth2 state stays redeemable, at most one day
    #[arg(
        long,
        env,
        default_value_t = 600,
        value_parser = clap::value_parser!(u32).range(1..=MAX_OAUTH_STATE_TTL_SECS),
    )]
    pub oauth_state_ttl_secs: u32,

    /// Initial Azure AD directory (tenant) for the plugin configuration.
    #[arg(long, env)]
    oauth2_authority: Option<String>,

    /// Initial OAuth2 application (client) id for the plugin configuration.
    #[arg(long, env)]
    oauth2_client_id: Option<String>,

    /// Initial OAuth2 client secret for the plugin configuration.
    #[arg(long, env)]
    oauth2_client_secret: Option<String>,

    /// Initial at-rest encryption key (16 or 32 characters) for the plugin configuration.
    #[arg(long, env)]
    encryption_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn site_url(&self) -> &str {
        self.site_url.trim_end_matches('/')
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn bot_user_id(&self) -> &str {
        &self.bot_user_id
    }

    pub fn login_base_url(&self) -> &str {
        &self.login_base_url
    }

    pub fn graph_base_url(&self) -> &str {
        &self.graph_base_url
    }

    /// Where the provider redirects after the user grants access.
    pub fn redirect_url(&self) -> String {
        format!("{}/plugins/{}/oauth2/complete", self.site_url(), self.plugin_id)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn oauth2_authority(&self) -> Option<String> {
        self.oauth2_authority.clone()
    }

    pub fn oauth2_client_id(&self) -> Option<String> {
        self.oauth2_client_id.clone()
    }

    pub fn oauth2_client_secret(&self) -> Option<String> {
        self.oauth2_client_secret.clone()
    }

    pub fn encryption_key(&self) -> Option<String> {
        self.encryption_key.clone()
    }

    /// Override the Microsoft endpoints, e.g. with a mock server URL.
    pub fn set_provider_base_urls(mut self, login_base_url: String, graph_base_url: String) -> Self {
        self.login_base_url = login_base_url;
        self.graph_base_url = graph_base_url;
        self
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }
}
