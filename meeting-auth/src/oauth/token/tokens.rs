//! OAuth token types.

use chrono::{DateTime, Utc};
use oauth2::basic::BasicTokenResponse;
use oauth2::TokenResponse;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};

/// OAuth tokens with metadata.
///
/// Serializing exposes the secrets; only do it right before encrypting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tokens {
    /// Access token for API requests.
    #[serde(serialize_with = "serialize_secret")]
    pub access_token: SecretString,
    /// Refresh token for obtaining new access tokens.
    #[serde(default, serialize_with = "serialize_optional_secret")]
    pub refresh_token: Option<SecretString>,
    /// When the access token expires.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Token type (usually "Bearer").
    pub token_type: String,
    /// Granted scopes.
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Tokens {
    /// Check if the access token is expired or about to expire soon.
    ///
    /// Returns true if token is expired or will expire within 5 minutes.
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|expires| {
                let now = Utc::now();
                let buffer = chrono::Duration::minutes(5);
                expires <= (now + buffer)
            })
            .unwrap_or(false)
    }

    /// Build tokens from a standard token endpoint response.
    ///
    /// `previous_refresh` is kept when the response does not rotate the refresh token.
    pub fn from_response(
        response: &BasicTokenResponse,
        previous_refresh: Option<&SecretString>,
    ) -> Self {
        let expires_at = response
            .expires_in()
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| Utc::now() + d);

        let refresh_token = response
            .refresh_token()
            .map(|rt| SecretString::from(rt.secret().to_string()))
            .or_else(|| previous_refresh.cloned());

        Self {
            access_token: SecretString::from(response.access_token().secret().to_string()),
            refresh_token,
            expires_at,
            token_type: "Bearer".to_string(),
            scopes: response
                .scopes()
                .map(|scopes| scopes.iter().map(|s| s.to_string()).collect())
                .unwrap_or_default(),
        }
    }
}

impl PartialEq for Tokens {
    fn eq(&self, other: &Self) -> bool {
        self.access_token.expose_secret() == other.access_token.expose_secret()
            && self.refresh_token.as_ref().map(|t| t.expose_secret())
                == other.refresh_token.as_ref().map(|t| t.expose_secret())
            && self.expires_at == other.expires_at
            && self.token_type == other.token_type
            && self.scopes == other.scopes
    }
}

fn serialize_secret<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn serialize_optional_secret<S: Serializer>(
    secret: &Option<SecretString>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(secret) => serializer.serialize_some(secret.expose_secret()),
        None => serializer.serialize_none(),
    }
}
