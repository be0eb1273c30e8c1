//! OAuth provider trait and types.

use async_trait::async_trait;
use secrecy::SecretString;

use super::token::Tokens;
use crate::error::Error;

/// Trait for OAuth 2.0 providers.
///
/// Implementations handle the authorization-code flow:
/// - Authorization URL generation
/// - Authorization code exchange for tokens
/// - Token refresh
#[async_trait]
pub trait Provider: Send + Sync {
    /// Authorization URL to redirect the user to, carrying `state` unchanged.
    fn authorization_url(&self, state: &str) -> Result<String, Error>;

    /// Exchange authorization code for access and refresh tokens.
    ///
    /// # Arguments
    ///
    /// * `code` - Authorization code from OAuth callback
    async fn exchange_code(&self, code: &str) -> Result<Tokens, Error>;

    /// Refresh an access token using a refresh token.
    ///
    /// Implementations keep `refresh_token` in the result when the provider does not
    /// rotate it.
    async fn refresh_token(&self, refresh_token: &SecretString) -> Result<Tokens, Error>;
}
