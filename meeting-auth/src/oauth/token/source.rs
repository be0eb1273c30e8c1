//! Token source that hands out a valid access token, refreshing when needed.

use std::sync::Arc;

use secrecy::SecretString;
use tokio::sync::Mutex;
use tracing::debug;

use super::Tokens;
use crate::error::{oauth_error, Error, OAuthErrorKind};
use crate::oauth::Provider;

/// Holds one user's tokens for the lifetime of an authorized transport.
///
/// The lock serializes refreshes: concurrent callers sharing a source wait for the
/// first refresh instead of spending the refresh token twice. Refreshed tokens live
/// only in this source; they are not written back to the credential vault.
pub struct TokenSource {
    tokens: Mutex<Tokens>,
    provider: Arc<dyn Provider>,
}

impl TokenSource {
    /// Create a token source from already-acquired tokens.
    pub fn new(tokens: Tokens, provider: Arc<dyn Provider>) -> Self {
        Self {
            tokens: Mutex::new(tokens),
            provider,
        }
    }

    /// Get a valid access token, refreshing it first if it is expired.
    pub async fn access_token(&self) -> Result<SecretString, Error> {
        let mut tokens = self.tokens.lock().await;

        if !tokens.is_expired() {
            return Ok(tokens.access_token.clone());
        }

        debug!("Access token expired, refreshing");

        let refresh_token = tokens.refresh_token.clone().ok_or_else(|| {
            oauth_error(
                OAuthErrorKind::TokenRefreshFailed,
                "No refresh token available",
            )
        })?;

        let refreshed = self.provider.refresh_token(&refresh_token).await?;
        let access_token = refreshed.access_token.clone();
        *tokens = refreshed;

        debug!("Access token refreshed");
        Ok(access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use secrecy::ExposeSecret;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        refreshes: AtomicUsize,
    }

    #[async_trait]
    impl Provider for CountingProvider {
        fn authorization_url(&self, _state: &str) -> Result<String, Error> {
            Ok(String::new())
        }

        async fn exchange_code(&self, _code: &str) -> Result<Tokens, Error> {
            Err(oauth_error(OAuthErrorKind::TokenExchangeFailed, "unused"))
        }

        async fn refresh_token(&self, refresh_token: &SecretString) -> Result<Tokens, Error> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            Ok(Tokens {
                access_token: SecretString::from("fresh".to_string()),
                refresh_token: Some(refresh_token.clone()),
                expires_at: Some(Utc::now() + Duration::hours(1)),
                token_type: "Bearer".to_string(),
                scopes: vec![],
            })
        }
    }

    fn tokens(expires_in: Duration, refresh: Option<&str>) -> Tokens {
        Tokens {
            access_token: SecretString::from("stale".to_string()),
            refresh_token: refresh.map(|r| SecretString::from(r.to_string())),
            expires_at: Some(Utc::now() + expires_in),
            token_type: "Bearer".to_string(),
            scopes: vec![],
        }
    }

    #[tokio::test]
    async fn test_valid_token_is_returned_without_refresh() {
        let provider = Arc::new(CountingProvider {
            refreshes: AtomicUsize::new(0),
        });
        let source = TokenSource::new(tokens(Duration::hours(1), Some("r")), provider.clone());

        let token = source.access_token().await.unwrap();
        assert_eq!(token.expose_secret(), "stale");
        assert_eq!(provider.refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_once() {
        let provider = Arc::new(CountingProvider {
            refreshes: AtomicUsize::new(0),
        });
        let source = TokenSource::new(tokens(-Duration::hours(1), Some("r")), provider.clone());

        assert_eq!(source.access_token().await.unwrap().expose_secret(), "fresh");
        assert_eq!(source.access_token().await.unwrap().expose_secret(), "fresh");
        assert_eq!(provider.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_token_without_refresh_token_fails() {
        let provider = Arc::new(CountingProvider {
            refreshes: AtomicUsize::new(0),
        });
        let source = TokenSource::new(tokens(-Duration::hours(1), None), provider);

        let err = source.access_token().await.unwrap_err();
        assert_eq!(
            err.error_kind,
            crate::error::ErrorKind::OAuth(OAuthErrorKind::TokenRefreshFailed)
        );
    }
}
