//! Capabilities consumed from the chat host.
//!
//! Each component depends only on the narrow trait it uses; [`Host`] bundles the
//! handles for wiring. [`memory::MemoryHost`] implements every capability in process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::configuration::Configuration;
use meeting_auth::credentials::KvStore;

pub mod memory;

/// Failure reported by a host capability.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub username: String,
}

/// A channel message. `props` carries the meeting advertisement tags.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub channel_id: String,
    pub message: String,
    pub post_type: String,
    pub props: Map<String, Value>,
    pub create_at: DateTime<Utc>,
}

impl Post {
    /// A plain message authored by `user_id`, stamped now.
    pub fn new(user_id: &str, channel_id: &str, message: &str) -> Self {
        Post {
            id: String::new(),
            user_id: user_id.to_string(),
            channel_id: channel_id.to_string(),
            message: message.to_string(),
            post_type: String::new(),
            props: Map::new(),
            create_at: Utc::now(),
        }
    }

    /// String value of a prop; empty when absent or not a string.
    pub fn prop_str(&self, key: &str) -> &str {
        self.props.get(key).and_then(Value::as_str).unwrap_or("")
    }
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<User, HostError>;
}

#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    /// Succeeds when `user_id` is a member of `channel_id`.
    async fn get_channel_member(&self, channel_id: &str, user_id: &str) -> Result<(), HostError>;
}

#[async_trait]
pub trait PostStore: Send + Sync {
    /// Posts in `channel_id` created at or after `since`, in the host's order.
    async fn get_posts_since(
        &self,
        channel_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Post>, HostError>;

    async fn create_post(&self, post: Post) -> Result<Post, HostError>;

    /// Deliver `post` to `user_id` only.
    async fn send_ephemeral_post(&self, user_id: &str, post: Post) -> Result<(), HostError>;
}

#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn load_plugin_config(&self) -> Result<Configuration, HostError>;

    async fn save_plugin_config(&self, config: &Configuration) -> Result<(), HostError>;
}

/// Handles to every host capability.
#[derive(Clone)]
pub struct Host {
    pub users: Arc<dyn UserDirectory>,
    pub channels: Arc<dyn ChannelDirectory>,
    pub posts: Arc<dyn PostStore>,
    pub config_store: Arc<dyn ConfigStore>,
    pub kv: Arc<dyn KvStore>,
}

impl Host {
    /// Use one object for every capability.
    pub fn from_shared<H>(host: Arc<H>) -> Self
    where
        H: UserDirectory + ChannelDirectory + PostStore + ConfigStore + KvStore + 'static,
    {
        Host {
            users: host.clone(),
            channels: host.clone(),
            posts: host.clone(),
            config_store: host.clone(),
            kv: host,
        }
    }
}
