//! Core of the Teams meetings integration.
//!
//! [`meeting::MeetingService`] composes the host capabilities in [`host`], the OAuth2
//! lifecycle in [`oauth_flow`] and a [`meeting_client::MeetingClient`] built per
//! request from the stored credential. [`command::CommandDispatcher`] routes parsed
//! slash commands to it. Configuration snapshots and their change hook live in
//! [`configuration`]; credential invalidation runs on [`jobs::BackgroundJobs`].

pub use events::{DomainEvent, EventHandler, EventPublisher, LogEventHandler, StartSource};

pub mod command;
pub mod configuration;
pub mod error;
pub mod gateway;
pub mod host;
pub mod jobs;
pub mod meeting;
pub mod meeting_client;
pub mod oauth_flow;
