//! Background work submitted by the configuration-change hook.
//!
//! Jobs run one at a time on a single worker task. `shutdown` closes the queue and
//! waits until every job submitted before it has run.

use log::*;
use meeting_auth::credentials::{CredentialVault, KvStore};
use secrecy::SecretString;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;

use crate::configuration::{Configuration, ConfigurationManager};
use crate::host::ConfigStore;

#[derive(Debug)]
pub enum Job {
    /// Remove every stored credential and pending OAuth2 state.
    ResetCredentials,
    /// Write the configuration back to the host.
    SaveConfiguration(Configuration),
}

/// Executes jobs against the host.
pub struct JobRunner {
    kv: Arc<dyn KvStore>,
    config_store: Arc<dyn ConfigStore>,
    config: Arc<ConfigurationManager>,
}

impl JobRunner {
    pub fn new(
        kv: Arc<dyn KvStore>,
        config_store: Arc<dyn ConfigStore>,
        config: Arc<ConfigurationManager>,
    ) -> Self {
        Self {
            kv,
            config_store,
            config,
        }
    }

    async fn run(&self, job: Job) {
        match job {
            Job::ResetCredentials => {
                let key = SecretString::from(self.config.snapshot().encryption_key.clone());
                let vault = CredentialVault::new(self.kv.clone(), key);
                match vault.reset_all().await {
                    Ok(()) => info!("Reset all stored credentials"),
                    Err(e) => error!("Failed to reset stored credentials: {}", e),
                }
            }
            Job::SaveConfiguration(config) => {
                if let Err(e) = self.config_store.save_plugin_config(&config).await {
                    error!(
                        "Failed to store updated plugin configuration with an encryption key: {}",
                        e
                    );
                }
            }
        }
    }
}

pub struct BackgroundJobs {
    sender: Mutex<Option<UnboundedSender<Job>>>,
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundJobs {
    /// Spawn the worker. Must be called within a Tokio runtime.
    pub fn start(runner: JobRunner) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();

        let worker = tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                debug!("Running background job {:?}", job);
                runner.run(job).await;
            }
            debug!("Background job queue drained");
        });

        Self {
            sender: Mutex::new(Some(sender)),
            worker: tokio::sync::Mutex::new(Some(worker)),
        }
    }

    /// Queue a job without waiting for it. Jobs submitted after shutdown are dropped.
    pub fn submit(&self, job: Job) {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match sender.as_ref() {
            Some(sender) => {
                if sender.send(job).is_err() {
                    warn!("Background worker is gone, job dropped");
                }
            }
            None => warn!("Background jobs are shut down, dropping {:?}", job),
        }
    }

    /// Close the queue and wait for queued jobs to finish.
    pub async fn shutdown(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(worker) = self.worker.lock().await.take() {
            if let Err(e) = worker.await {
                error!("Background worker failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::MemoryHost;

    fn start(host: &Arc<MemoryHost>) -> BackgroundJobs {
        BackgroundJobs::start(JobRunner::new(
            host.clone(),
            host.clone(),
            Arc::new(ConfigurationManager::new()),
        ))
    }

    #[tokio::test]
    async fn test_shutdown_drains_submitted_jobs() {
        let host = Arc::new(MemoryHost::new());
        host.set("token_u1", vec![1]).await.unwrap();
        host.set("tbyrid_r1", b"u1".to_vec()).await.unwrap();
        let jobs = start(&host);

        let saved = Configuration {
            oauth2_authority: "contoso".to_string(),
            ..Configuration::default()
        };
        jobs.submit(Job::SaveConfiguration(saved.clone()));
        jobs.submit(Job::ResetCredentials);
        jobs.shutdown().await;

        assert!(host.kv_keys().await.is_empty());
        assert_eq!(host.plugin_config().await, saved);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_dropped() {
        let host = Arc::new(MemoryHost::new());
        host.set("token_u1", vec![1]).await.unwrap();
        let jobs = start(&host);

        jobs.shutdown().await;
        jobs.submit(Job::ResetCredentials);
        jobs.shutdown().await;

        assert_eq!(host.kv_keys().await, vec!["token_u1".to_string()]);
    }
}
