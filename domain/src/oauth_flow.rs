//! OAuth2 authorization lifecycle: issuing states, completing redirects, checking
//! stored credentials and disconnecting.

use crate::configuration::{Configuration, ConfigurationManager};
use crate::error::Error;
use crate::meeting_client::{ClientFactory, MeetingClient};
use chrono::Duration;
use log::*;
use meeting_auth::credentials::{CredentialVault, KvStore, UserInfo};
use meeting_auth::oauth::providers::microsoft;
use meeting_auth::oauth::{PendingAuthorization, Provider, StateStore};
use secrecy::SecretString;
use service::config::Config;
use std::sync::Arc;

/// Where the provider lives and where it sends users back to.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub login_base_url: String,
    pub redirect_url: String,
}

impl From<&Config> for ProviderEndpoints {
    fn from(config: &Config) -> Self {
        ProviderEndpoints {
            login_base_url: config.login_base_url().to_string(),
            redirect_url: config.redirect_url(),
        }
    }
}

/// A user whose stored credential the provider still accepts.
pub struct AuthenticatedUser {
    pub info: UserInfo,
    pub client: Box<dyn MeetingClient>,
}

/// A redirect that was completed and stored.
pub struct CompletedAuthorization {
    pub pending: PendingAuthorization,
    pub user: AuthenticatedUser,
}

pub struct Authenticator {
    config: Arc<ConfigurationManager>,
    kv: Arc<dyn KvStore>,
    states: StateStore,
    endpoints: ProviderEndpoints,
    client_factory: ClientFactory,
}

impl Authenticator {
    pub fn new(
        config: Arc<ConfigurationManager>,
        kv: Arc<dyn KvStore>,
        states: StateStore,
        endpoints: ProviderEndpoints,
        client_factory: ClientFactory,
    ) -> Self {
        Self {
            config,
            kv,
            states,
            endpoints,
            client_factory,
        }
    }

    /// Build from process configuration: state keys prefixed with the plugin id.
    pub fn from_config(
        config: &Config,
        plugin_config: Arc<ConfigurationManager>,
        kv: Arc<dyn KvStore>,
        client_factory: ClientFactory,
    ) -> Self {
        let states = StateStore::new(
            kv.clone(),
            config.plugin_id(),
            Duration::seconds(i64::from(config.oauth_state_ttl_secs)),
        );
        Self::new(plugin_config, kv, states, config.into(), client_factory)
    }

    /// The current snapshot, or `ConfigInvalid`.
    fn valid_config(&self) -> Result<Arc<Configuration>, Error> {
        let config = self.config.snapshot();
        config.is_valid()?;
        Ok(config)
    }

    fn vault(&self, config: &Configuration) -> CredentialVault {
        CredentialVault::new(
            self.kv.clone(),
            SecretString::from(config.encryption_key.clone()),
        )
    }

    fn provider(&self, config: &Configuration) -> Result<microsoft::Provider, Error> {
        let provider = microsoft::Provider::new(&microsoft::Settings {
            login_base_url: self.endpoints.login_base_url.clone(),
            authority: config.oauth2_authority.clone(),
            client_id: config.oauth2_client_id.clone(),
            client_secret: SecretString::from(config.oauth2_client_secret.clone()),
            redirect_url: self.endpoints.redirect_url.clone(),
        })?;
        Ok(provider)
    }

    /// Persist a pending authorization and return the URL the user must visit.
    pub async fn issue_state(
        &self,
        user_id: &str,
        channel_id: &str,
        is_direct_connect: bool,
    ) -> Result<String, Error> {
        let config = self.valid_config()?;
        let provider = self.provider(&config)?;

        let state = self
            .states
            .issue(user_id, channel_id, is_direct_connect)
            .await
            .inspect_err(|e| warn!("Failed to store OAuth state for user {}: {}", user_id, e))?;

        Ok(provider.authorization_url(&state)?)
    }

    /// Redeem `state`, exchange `code`, fetch the provider identity and store the
    /// credential.
    ///
    /// The state is consumed before the exchange, so it cannot be replayed even when
    /// a later step fails. Nothing is stored unless every step succeeds.
    pub async fn complete_authorization(
        &self,
        state: &str,
        code: &str,
    ) -> Result<CompletedAuthorization, Error> {
        let config = self.valid_config()?;
        let provider = self.provider(&config)?;

        let pending = self.states.redeem(state).await.inspect_err(|e| {
            debug!("Rejected OAuth state: {}", e);
        })?;
        let user_id = pending.user_id.clone();

        let tokens = provider.exchange_code(code).await.inspect_err(|e| {
            warn!(
                "Failed to exchange OAuth code for user {}: {}",
                user_id, e
            )
        })?;

        let client = (self.client_factory)(config.as_ref(), tokens.clone())?;
        let me = client.fetch_current_identity().await.inspect_err(|e| {
            warn!(
                "Failed to fetch Microsoft identity for user {}: {}",
                user_id, e
            )
        })?;

        let info = UserInfo {
            user_id: user_id.clone(),
            remote_id: me.id,
            upn: me.user_principal_name,
            email: me.mail.unwrap_or_default(),
            tokens,
        };

        self.vault(&config).store(&info).await.inspect_err(|e| {
            error!("Failed to store credential for user {}: {}", user_id, e)
        })?;

        info!("User {} connected to Microsoft Teams", user_id);
        Ok(CompletedAuthorization {
            pending,
            user: AuthenticatedUser { info, client },
        })
    }

    /// Load the user's credential and confirm the provider still accepts it.
    ///
    /// A missing, unreadable or rejected credential is `AuthRequired`.
    pub async fn authenticate_and_fetch_user(
        &self,
        user_id: &str,
    ) -> Result<AuthenticatedUser, Error> {
        let config = self.valid_config()?;

        let info = self.vault(&config).load(user_id).await.map_err(|e| {
            debug!("No usable credential for user {}: {}", user_id, e);
            Error::auth_required(e)
        })?;

        let client = (self.client_factory)(config.as_ref(), info.tokens.clone())?;
        if let Err(e) = client.fetch_current_identity().await {
            debug!("Provider rejected credential of user {}: {}", user_id, e);
            return Err(Error::auth_required(e));
        }

        Ok(AuthenticatedUser { info, client })
    }

    /// Remove the user's credential. Succeeds when none is stored.
    pub async fn disconnect(&self, user_id: &str) -> Result<(), Error> {
        let config = self.config.snapshot();
        self.vault(&config).delete(user_id).await.inspect_err(|e| {
            warn!("Failed to delete credential for user {}: {}", user_id, e)
        })?;
        Ok(())
    }
}
