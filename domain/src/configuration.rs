//! Plugin configuration snapshots and the configuration-change hook.

use log::*;
use meeting_auth::credentials::encryption::generate_secret;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::Error;
use crate::host::ConfigStore;
use crate::jobs::{BackgroundJobs, Job};

/// OAuth2 client settings and the at-rest encryption key, as stored by the host.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(rename = "oauth2authority", default)]
    pub oauth2_authority: String,
    #[serde(rename = "oauth2clientid", default)]
    pub oauth2_client_id: String,
    #[serde(rename = "oauth2clientsecret", default)]
    pub oauth2_client_secret: String,
    #[serde(rename = "encryptionkey", default)]
    pub encryption_key: String,
}

impl Configuration {
    /// Fails with `ConfigInvalid` naming the first missing field.
    pub fn is_valid(&self) -> Result<(), Error> {
        if self.oauth2_client_secret.is_empty() {
            return Err(Error::config_invalid("OAuth2 client secret is not configured"));
        }
        if self.oauth2_client_id.is_empty() {
            return Err(Error::config_invalid("OAuth2 client id is not configured"));
        }
        if self.oauth2_authority.is_empty() {
            return Err(Error::config_invalid("OAuth2 authority is not configured"));
        }
        if self.encryption_key.is_empty() {
            return Err(Error::config_invalid("Encryption key is not configured"));
        }
        Ok(())
    }

    /// True when a change invalidates every stored credential.
    pub fn differs_oauth2(&self, other: &Configuration) -> bool {
        self.oauth2_authority != other.oauth2_authority
            || self.oauth2_client_id != other.oauth2_client_id
            || self.oauth2_client_secret != other.oauth2_client_secret
            || self.encryption_key != other.encryption_key
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("oauth2_authority", &self.oauth2_authority)
            .field("oauth2_client_id", &self.oauth2_client_id)
            .field("oauth2_client_secret", &"[REDACTED]")
            .field("encryption_key", &"[REDACTED]")
            .finish()
    }
}

/// Holds the published configuration snapshot.
///
/// Snapshots are never mutated: a change builds a new `Configuration` and swaps the
/// `Arc`, so readers keep whichever complete snapshot they already took.
#[derive(Default)]
pub struct ConfigurationManager {
    current: RwLock<Option<Arc<Configuration>>>,
}

impl ConfigurationManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot, empty until the first publish.
    pub fn snapshot(&self) -> Arc<Configuration> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_default()
    }

    /// Replace the snapshot, returning the previous one if any.
    pub fn publish(&self, config: Configuration) -> Option<Arc<Configuration>> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        current.replace(Arc::new(config))
    }

    /// Reload the configuration from the host and publish it.
    ///
    /// An empty encryption key is replaced by a generated one that is saved back to
    /// the host in the background. A generated key or any OAuth2 change relative to a
    /// previous snapshot queues a reset of all stored credentials. The snapshot is
    /// published even when invalid; the validation failure is returned.
    pub async fn on_configuration_change(
        &self,
        store: &dyn ConfigStore,
        jobs: &BackgroundJobs,
    ) -> Result<(), Error> {
        let mut loaded = store.load_plugin_config().await.map_err(|e| {
            error!("Failed to load plugin configuration: {}", e);
            Error::from(e)
        })?;

        let mut generated_key = false;
        if loaded.encryption_key.is_empty() {
            loaded.encryption_key = generate_secret();
            generated_key = true;
            info!("Auto-generated encryption key in the configuration");
        }

        let previous = self.publish(loaded.clone());
        let reset_credentials = generated_key
            || previous
                .as_deref()
                .map(|prev| prev.differs_oauth2(&loaded))
                .unwrap_or(false);

        if generated_key {
            jobs.submit(Job::SaveConfiguration(loaded.clone()));
        }
        if reset_credentials {
            info!("OAuth2 configuration changed, resetting all stored credentials");
            jobs.submit(Job::ResetCredentials);
        }

        loaded.is_valid().inspect_err(|e| {
            warn!("Plugin configuration is invalid: {}", e);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DomainErrorKind, InternalErrorKind};
    use crate::host::memory::MemoryHost;
    use crate::jobs::JobRunner;
    use meeting_auth::credentials::KvStore;

    pub(crate) fn valid() -> Configuration {
        Configuration {
            oauth2_authority: "contoso".to_string(),
            oauth2_client_id: "client-123".to_string(),
            oauth2_client_secret: "shh".to_string(),
            encryption_key: "demo_encrypt_key".to_string(),
        }
    }

    fn jobs_for(host: &Arc<MemoryHost>, manager: &Arc<ConfigurationManager>) -> BackgroundJobs {
        BackgroundJobs::start(JobRunner::new(host.clone(), host.clone(), manager.clone()))
    }

    #[test]
    fn test_is_valid_reports_first_missing_field() {
        assert!(valid().is_valid().is_ok());

        let mut config = valid();
        config.oauth2_client_secret.clear();
        config.oauth2_client_id.clear();
        let err = config.is_valid().unwrap_err();
        assert_eq!(
            err.error_kind,
            DomainErrorKind::Internal(InternalErrorKind::Config)
        );
        assert!(err.root_cause().contains("client secret"));

        let mut config = valid();
        config.oauth2_authority.clear();
        assert!(config.is_valid().unwrap_err().root_cause().contains("authority"));
    }

    #[test]
    fn test_differs_oauth2_compares_all_fields() {
        assert!(!valid().differs_oauth2(&valid()));
        let mut other = valid();
        other.encryption_key = "another_16b_key!".to_string();
        assert!(valid().differs_oauth2(&other));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let printed = format!("{:?}", valid());
        assert!(!printed.contains("shh"));
        assert!(!printed.contains("demo_encrypt_key"));
        assert!(printed.contains("contoso"));
    }

    #[test]
    fn test_json_uses_host_keys() {
        let json = serde_json::to_value(valid()).unwrap();
        assert_eq!(json["oauth2authority"], "contoso");
        assert_eq!(json["encryptionkey"], "demo_encrypt_key");
    }

    #[test]
    fn test_publish_swaps_snapshot_without_touching_old_one() {
        let manager = ConfigurationManager::new();
        assert_eq!(*manager.snapshot(), Configuration::default());

        assert!(manager.publish(valid()).is_none());
        let before = manager.snapshot();

        let mut next = valid();
        next.oauth2_client_id = "client-456".to_string();
        let previous = manager.publish(next).unwrap();

        assert_eq!(previous.oauth2_client_id, "client-123");
        assert_eq!(before.oauth2_client_id, "client-123");
        assert_eq!(manager.snapshot().oauth2_client_id, "client-456");
    }

    #[tokio::test]
    async fn test_first_load_with_key_keeps_credentials() {
        let host = Arc::new(MemoryHost::new());
        host.set_plugin_config(valid()).await;
        host.set("token_u1", vec![1, 2, 3]).await.unwrap();
        let manager = Arc::new(ConfigurationManager::new());
        let jobs = jobs_for(&host, &manager);

        manager
            .on_configuration_change(host.as_ref(), &jobs)
            .await
            .unwrap();
        jobs.shutdown().await;

        assert_eq!(*manager.snapshot(), valid());
        assert_eq!(host.kv_keys().await, vec!["token_u1".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_key_is_generated_saved_and_credentials_reset() {
        let host = Arc::new(MemoryHost::new());
        let mut config = valid();
        config.encryption_key.clear();
        host.set_plugin_config(config).await;
        host.set("token_u1", vec![1, 2, 3]).await.unwrap();
        let manager = Arc::new(ConfigurationManager::new());
        let jobs = jobs_for(&host, &manager);

        manager
            .on_configuration_change(host.as_ref(), &jobs)
            .await
            .unwrap();
        jobs.shutdown().await;

        let key = manager.snapshot().encryption_key.clone();
        assert_eq!(key.len(), 32);
        assert_eq!(host.plugin_config().await.encryption_key, key);
        assert!(host.kv_keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_oauth2_change_resets_credentials() {
        let host = Arc::new(MemoryHost::new());
        host.set_plugin_config(valid()).await;
        let manager = Arc::new(ConfigurationManager::new());
        let jobs = jobs_for(&host, &manager);
        manager
            .on_configuration_change(host.as_ref(), &jobs)
            .await
            .unwrap();

        host.set("token_u1", vec![1, 2, 3]).await.unwrap();
        let mut changed = valid();
        changed.oauth2_authority = "fabrikam".to_string();
        host.set_plugin_config(changed).await;

        manager
            .on_configuration_change(host.as_ref(), &jobs)
            .await
            .unwrap();
        jobs.shutdown().await;

        assert_eq!(manager.snapshot().oauth2_authority, "fabrikam");
        assert!(host.kv_keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_configuration_is_published_and_reported() {
        let host = Arc::new(MemoryHost::new());
        let mut config = valid();
        config.oauth2_client_id.clear();
        host.set_plugin_config(config.clone()).await;
        let manager = Arc::new(ConfigurationManager::new());
        let jobs = jobs_for(&host, &manager);

        let err = manager
            .on_configuration_change(host.as_ref(), &jobs)
            .await
            .unwrap_err();
        jobs.shutdown().await;

        assert_eq!(
            err.error_kind,
            DomainErrorKind::Internal(InternalErrorKind::Config)
        );
        assert_eq!(*manager.snapshot(), config);
    }
}
