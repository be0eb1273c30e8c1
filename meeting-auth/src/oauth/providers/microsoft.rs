//! Microsoft identity platform OAuth provider implementation.

use async_trait::async_trait;
use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl,
    RefreshToken, Scope, TokenUrl,
};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use crate::error::{oauth_error, Error, OAuthErrorKind};
use crate::oauth::token::Tokens;

/// Public Microsoft login host.
pub const DEFAULT_LOGIN_BASE_URL: &str = "https://login.microsoftonline.com";

/// Scopes requested for creating online meetings on the user's behalf.
pub const SCOPES: [&str; 3] = ["offline_access", "User.Read", "OnlineMeetings.ReadWrite"];

/// Settings needed to talk to the Microsoft authorization and token endpoints.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Login host, overridable for tests.
    pub login_base_url: String,
    /// Directory (tenant) the application is registered in.
    pub authority: String,
    pub client_id: String,
    pub client_secret: SecretString,
    /// Where the provider sends the user back with `code` and `state`.
    pub redirect_url: String,
}

/// Microsoft OAuth provider.
///
/// Endpoints are derived from the authority:
/// `{login}/{authority}/oauth2/v2.0/authorize` and `{login}/{authority}/oauth2/v2.0/token`.
pub struct Provider {
    client: BasicClient,
}

impl Provider {
    /// Create a new Microsoft OAuth provider.
    pub fn new(settings: &Settings) -> Result<Self, Error> {
        let base = settings.login_base_url.trim_end_matches('/');

        let auth_url = AuthUrl::new(format!(
            "{}/{}/oauth2/v2.0/authorize",
            base, settings.authority
        ))
        .map_err(|e| oauth_error(OAuthErrorKind::AuthorizationFailed, &e.to_string()))?;

        let token_url = TokenUrl::new(format!("{}/{}/oauth2/v2.0/token", base, settings.authority))
            .map_err(|e| oauth_error(OAuthErrorKind::AuthorizationFailed, &e.to_string()))?;

        let redirect_url = RedirectUrl::new(settings.redirect_url.clone())
            .map_err(|e| oauth_error(OAuthErrorKind::AuthorizationFailed, &e.to_string()))?;

        let client = BasicClient::new(
            ClientId::new(settings.client_id.clone()),
            Some(ClientSecret::new(
                settings.client_secret.expose_secret().to_string(),
            )),
            auth_url,
            Some(token_url),
        )
        .set_auth_type(AuthType::RequestBody)
        .set_redirect_uri(redirect_url);

        Ok(Self { client })
    }

    fn scopes() -> impl Iterator<Item = Scope> {
        SCOPES.iter().map(|s| Scope::new(s.to_string()))
    }
}

#[async_trait]
impl crate::oauth::Provider for Provider {
    fn authorization_url(&self, state: &str) -> Result<String, Error> {
        let (url, _) = self
            .client
            .authorize_url(|| CsrfToken::new(state.to_string()))
            .add_scopes(Self::scopes())
            .url();

        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str) -> Result<Tokens, Error> {
        debug!("Exchanging Microsoft authorization code for tokens");

        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| {
                warn!("Failed to exchange Microsoft authorization code: {}", e);
                oauth_error(OAuthErrorKind::TokenExchangeFailed, &e.to_string())
            })?;

        Ok(Tokens::from_response(&response, None))
    }

    async fn refresh_token(&self, refresh_token: &SecretString) -> Result<Tokens, Error> {
        debug!("Refreshing Microsoft access token");

        let refresh = RefreshToken::new(refresh_token.expose_secret().to_string());
        let response = self
            .client
            .exchange_refresh_token(&refresh)
            .add_scopes(Self::scopes())
            .request_async(async_http_client)
            .await
            .map_err(|e| {
                warn!("Failed to refresh Microsoft access token: {}", e);
                oauth_error(OAuthErrorKind::TokenRefreshFailed, &e.to_string())
            })?;

        Ok(Tokens::from_response(&response, Some(refresh_token)))
    }
}
