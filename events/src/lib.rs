//! Event system for the Teams meetings integration.
//!
//! Domain operations record what happened (meeting started, user connected, ...)
//! as [`DomainEvent`]s. Consumers such as usage tracking subscribe through an
//! [`EventHandler`] registered on the [`EventPublisher`].
//!
//! This crate has no dependencies on internal crates, avoiding circular
//! dependencies between the domain and its observers.

use async_trait::async_trait;
use log::info;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Which entry point started a meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartSource {
    /// A slash command in a channel.
    Command,
    /// The OAuth2 redirect completing an authorization that a start request waited on.
    #[serde(rename = "oauth")]
    OAuth,
}

impl fmt::Display for StartSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StartSource::Command => write!(f, "command"),
            StartSource::OAuth => write!(f, "oauth"),
        }
    }
}

/// Domain events emitted after an operation completed successfully.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A new online meeting was created and advertised in a channel.
    MeetingStarted {
        user_id: String,
        channel_id: String,
        source: StartSource,
    },
    /// A start request found a meeting advertised within the dedup window and reused it.
    MeetingDuplicated {
        user_id: String,
        channel_id: String,
        source: StartSource,
    },
    /// A user finished authorizing through an explicit connect.
    UserConnected { user_id: String },
    /// A user's stored credential was removed.
    UserDisconnected { user_id: String },
}

/// Trait for handling domain events.
/// Implementations can perform side effects like tracking or logging.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &DomainEvent);
}

/// Publishes domain events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    /// Publish an event to all registered handlers.
    pub async fn publish(&self, event: DomainEvent) {
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes every event as a JSON line to the `log` facade.
pub struct LogEventHandler;

#[async_trait]
impl EventHandler for LogEventHandler {
    async fn handle(&self, event: &DomainEvent) {
        match serde_json::to_string(event) {
            Ok(json) => info!("event: {}", json),
            Err(_) => info!("event: {:?}", event),
        }
    }
}
