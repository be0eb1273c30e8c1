//! OAuth 2.0 authorization-code flow: provider seam, one-time state and tokens.

mod provider;
mod state;

pub mod providers;
pub mod token;

pub use provider::Provider;
pub use state::{PendingAuthorization, StateStore};
