//! # meeting-auth
//!
//! Authentication building blocks for the Teams meetings integration:
//! - OAuth 2.0 authorization-code flow against the Microsoft identity platform
//! - One-time state tokens binding a redirect to a user, channel and intent
//! - Encrypted-at-rest credential vault over the host key-value store
//! - Token sources that refresh an expired access token before use
//! - HTTP client building for provider transports
//!
//! ## Usage
//!
//! ```rust,ignore
//! use meeting_auth::{
//!     credentials::{CredentialVault, KvStore},
//!     oauth::{providers::microsoft, StateStore, token::TokenSource},
//!     http::HttpClientBuilder,
//! };
//! ```

pub mod credentials;
pub mod error;
pub mod http;
pub mod oauth;

// Re-export commonly used types
pub use error::{Error, ErrorKind};
