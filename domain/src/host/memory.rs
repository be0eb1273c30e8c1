//! In-process host used by the binary and by tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::*;
use meeting_auth::credentials::KvStore;
use meeting_auth::error::{Error as MeetingAuthError, ErrorKind, StorageErrorKind};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{ChannelDirectory, ConfigStore, HostError, Post, PostStore, User, UserDirectory};
use crate::configuration::Configuration;

#[derive(Default)]
struct State {
    users: HashMap<String, User>,
    members: HashSet<(String, String)>,
    posts: Vec<Post>,
    ephemeral: Vec<(String, Post)>,
    kv: HashMap<String, Vec<u8>>,
    plugin_config: Configuration,
    failing_kv_deletes: HashSet<String>,
    fail_post_queries: bool,
}

/// Host state kept in memory.
///
/// With an open directory every user id resolves to a user of the same name that is
/// a member of every channel.
#[derive(Default)]
pub struct MemoryHost {
    state: Mutex<State>,
    open_directory: bool,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// A host that accepts any user and channel.
    pub fn with_open_directory() -> Self {
        MemoryHost {
            state: Mutex::default(),
            open_directory: true,
        }
    }

    pub async fn add_user(&self, id: &str, username: &str) {
        self.state.lock().await.users.insert(
            id.to_string(),
            User {
                id: id.to_string(),
                username: username.to_string(),
            },
        );
    }

    pub async fn add_channel_member(&self, channel_id: &str, user_id: &str) {
        self.state
            .lock()
            .await
            .members
            .insert((channel_id.to_string(), user_id.to_string()));
    }

    /// Store a post as is, keeping its `create_at`.
    pub async fn insert_post(&self, post: Post) {
        self.state.lock().await.posts.push(post);
    }

    pub async fn posts(&self) -> Vec<Post> {
        self.state.lock().await.posts.clone()
    }

    /// Ephemeral posts delivered so far, with their recipient.
    pub async fn ephemeral_posts(&self) -> Vec<(String, Post)> {
        self.state.lock().await.ephemeral.clone()
    }

    pub async fn set_plugin_config(&self, config: Configuration) {
        self.state.lock().await.plugin_config = config;
    }

    pub async fn plugin_config(&self) -> Configuration {
        self.state.lock().await.plugin_config.clone()
    }

    pub async fn kv_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.state.lock().await.kv.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Make deleting `key` fail with "deletion error".
    pub async fn fail_kv_delete(&self, key: &str) {
        self.state
            .lock()
            .await
            .failing_kv_deletes
            .insert(key.to_string());
    }

    pub async fn fail_post_queries(&self) {
        self.state.lock().await.fail_post_queries = true;
    }
}

#[async_trait]
impl UserDirectory for MemoryHost {
    async fn get_user(&self, user_id: &str) -> Result<User, HostError> {
        if let Some(user) = self.state.lock().await.users.get(user_id) {
            return Ok(user.clone());
        }
        if self.open_directory {
            return Ok(User {
                id: user_id.to_string(),
                username: user_id.to_string(),
            });
        }
        Err(HostError::NotFound(format!("user {}", user_id)))
    }
}

#[async_trait]
impl ChannelDirectory for MemoryHost {
    async fn get_channel_member(&self, channel_id: &str, user_id: &str) -> Result<(), HostError> {
        let state = self.state.lock().await;
        if self.open_directory
            || state
                .members
                .contains(&(channel_id.to_string(), user_id.to_string()))
        {
            Ok(())
        } else {
            Err(HostError::NotFound(format!(
                "member {} of channel {}",
                user_id, channel_id
            )))
        }
    }
}

#[async_trait]
impl PostStore for MemoryHost {
    async fn get_posts_since(
        &self,
        channel_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Post>, HostError> {
        let state = self.state.lock().await;
        if state.fail_post_queries {
            return Err(HostError::Failed(
                "error getting previous post for channel".to_string(),
            ));
        }
        // Newest first.
        Ok(state
            .posts
            .iter()
            .rev()
            .filter(|post| post.channel_id == channel_id && post.create_at >= since)
            .cloned()
            .collect())
    }

    async fn create_post(&self, mut post: Post) -> Result<Post, HostError> {
        if post.id.is_empty() {
            post.id = Uuid::new_v4().to_string();
        }
        debug!("Created post {} in channel {}", post.id, post.channel_id);
        self.state.lock().await.posts.push(post.clone());
        Ok(post)
    }

    async fn send_ephemeral_post(&self, user_id: &str, post: Post) -> Result<(), HostError> {
        self.state
            .lock()
            .await
            .ephemeral
            .push((user_id.to_string(), post));
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for MemoryHost {
    async fn load_plugin_config(&self) -> Result<Configuration, HostError> {
        Ok(self.state.lock().await.plugin_config.clone())
    }

    async fn save_plugin_config(&self, config: &Configuration) -> Result<(), HostError> {
        self.state.lock().await.plugin_config = config.clone();
        Ok(())
    }
}

fn backend_error(err: HostError) -> MeetingAuthError {
    MeetingAuthError {
        source: Some(Box::new(err)),
        error_kind: ErrorKind::Storage(StorageErrorKind::Backend),
    }
}

#[async_trait]
impl KvStore for MemoryHost {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, MeetingAuthError> {
        Ok(self.state.lock().await.kv.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), MeetingAuthError> {
        self.state.lock().await.kv.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), MeetingAuthError> {
        let mut state = self.state.lock().await;
        if state.failing_kv_deletes.contains(key) {
            return Err(backend_error(HostError::Failed("deletion error".to_string())));
        }
        state.kv.remove(key);
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), MeetingAuthError> {
        let mut state = self.state.lock().await;
        info!("Deleting {} plugin keys", state.kv.len());
        state.kv.clear();
        Ok(())
    }
}
