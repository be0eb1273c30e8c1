//! One-time OAuth state tokens persisted in the host key-value store.
//!
//! The `state` URL parameter is `<64 hex chars>_<userId>`. The pending payload lives
//! at `<pluginId>userstate_<userId>`, so a user has at most one pending authorization
//! and a new issuance replaces the previous one.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::credentials::KvStore;
use crate::error::{oauth_error, Error, OAuthErrorKind};

type HmacSha256 = Hmac<Sha256>;

/// What a redeemed state token was bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    pub user_id: String,
    pub channel_id: String,
    /// True for an explicit connect, false when a meeting start is waiting on it.
    pub is_direct_connect: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredState {
    token: String,
    expires_at: DateTime<Utc>,
    #[serde(flatten)]
    pending: PendingAuthorization,
}

/// Issues and redeems OAuth state tokens.
#[derive(Clone)]
pub struct StateStore {
    kv: Arc<dyn KvStore>,
    key_prefix: String,
    ttl: Duration,
}

impl StateStore {
    /// Create a state store writing under `<plugin_id>userstate_`.
    pub fn new(kv: Arc<dyn KvStore>, plugin_id: &str, ttl: Duration) -> Self {
        Self {
            kv,
            key_prefix: format!("{}userstate_", plugin_id),
            ttl,
        }
    }

    /// Key the pending state of `user_id` is stored under.
    pub fn key_for(&self, user_id: &str) -> String {
        format!("{}{}", self.key_prefix, user_id)
    }

    /// Persist a new pending authorization and return the `state` parameter for it.
    pub async fn issue(
        &self,
        user_id: &str,
        channel_id: &str,
        is_direct_connect: bool,
    ) -> Result<String, Error> {
        let token = Self::generate_token();
        let stored = StoredState {
            token: token.clone(),
            expires_at: Utc::now() + self.ttl,
            pending: PendingAuthorization {
                user_id: user_id.to_string(),
                channel_id: channel_id.to_string(),
                is_direct_connect,
            },
        };

        self.kv
            .set(&self.key_for(user_id), serde_json::to_vec(&stored)?)
            .await?;

        debug!("Issued OAuth state for user {}", user_id);
        Ok(format!("{}_{}", token, user_id))
    }

    /// Validate and consume a `state` parameter.
    ///
    /// The pending entry is deleted before returning, so a second redemption of the
    /// same state fails. Unknown, mismatched, malformed and expired states all fail
    /// with `InvalidState`.
    pub async fn redeem(&self, state: &str) -> Result<PendingAuthorization, Error> {
        let (token, user_id) = state
            .split_once('_')
            .filter(|(token, user_id)| !token.is_empty() && !user_id.is_empty())
            .ok_or_else(|| invalid_state("malformed state parameter"))?;

        let key = self.key_for(user_id);
        let raw = self
            .kv
            .get(&key)
            .await?
            .ok_or_else(|| invalid_state("no pending authorization"))?;

        let stored: StoredState = match serde_json::from_slice(&raw) {
            Ok(stored) => stored,
            Err(_) => {
                self.kv.delete(&key).await?;
                return Err(invalid_state("unreadable pending authorization"));
            }
        };

        // A mismatch leaves the entry alone: it belongs to a newer issuance.
        if !tokens_match(&stored.token, token) {
            return Err(invalid_state("state token does not match"));
        }

        self.kv.delete(&key).await?;

        if Utc::now() > stored.expires_at {
            return Err(invalid_state("state token expired"));
        }

        Ok(stored.pending)
    }

    /// Generate a cryptographically random state token.
    fn generate_token() -> String {
        let random_bytes: [u8; 32] = rand::thread_rng().gen();
        hex::encode(random_bytes)
    }
}

/// Constant-time comparison: both tokens are MACed with the stored one as key and
/// the tags are checked with `verify_slice`.
fn tokens_match(stored: &str, presented: &str) -> bool {
    let (Ok(mut expected), Ok(mut actual)) = (
        HmacSha256::new_from_slice(stored.as_bytes()),
        HmacSha256::new_from_slice(stored.as_bytes()),
    ) else {
        return false;
    };
    expected.update(stored.as_bytes());
    actual.update(presented.as_bytes());
    actual.verify_slice(&expected.finalize().into_bytes()).is_ok()
}

fn invalid_state(message: &str) -> Error {
    oauth_error(OAuthErrorKind::InvalidState, message)
}
