//! Credential vault: encrypted per-user provider identity and tokens.
//!
//! Layout in the key-value store:
//! - `token_<userId>` holds the encrypted JSON `UserInfo`
//! - `tbyrid_<remoteId>` holds the plain local user id for reverse lookup

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::encryption::{decrypt, encrypt};
use super::KvStore;
use crate::error::{storage_error, Error, ErrorKind, StorageErrorKind};
use crate::oauth::token::Tokens;

const TOKEN_KEY_PREFIX: &str = "token_";
const REMOTE_ID_KEY_PREFIX: &str = "tbyrid_";

/// Primary key of a user's credential record.
pub fn token_key(user_id: &str) -> String {
    format!("{}{}", TOKEN_KEY_PREFIX, user_id)
}

/// Reverse index key from provider id to local user id.
pub fn remote_id_key(remote_id: &str) -> String {
    format!("{}{}", REMOTE_ID_KEY_PREFIX, remote_id)
}

/// A connected user: local id, provider identity and the tokens acquired at authorization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_id: String,
    pub remote_id: String,
    pub upn: String,
    pub email: String,
    pub tokens: Tokens,
}

pub struct CredentialVault {
    kv: Arc<dyn KvStore>,
    encryption_key: SecretString,
}

impl CredentialVault {
    pub fn new(kv: Arc<dyn KvStore>, encryption_key: SecretString) -> Self {
        Self { kv, encryption_key }
    }

    fn key(&self) -> &[u8] {
        self.encryption_key.expose_secret().as_bytes()
    }

    /// Encrypt and persist `info`, then write the reverse index entry.
    pub async fn store(&self, info: &UserInfo) -> Result<(), Error> {
        let plaintext = serde_json::to_vec(info)?;
        let encrypted = encrypt(&plaintext, self.key())?;

        self.kv.set(&token_key(&info.user_id), encrypted).await?;
        self.kv
            .set(
                &remote_id_key(&info.remote_id),
                info.user_id.as_bytes().to_vec(),
            )
            .await?;

        debug!("Stored credential for user {}", info.user_id);
        Ok(())
    }

    /// Load and decrypt the credential for `user_id`.
    ///
    /// Fails with `NotFound` when nothing is stored and `DecryptionFailed` (or
    /// `InvalidKeyLength`) when the record cannot be opened with the current key.
    pub async fn load(&self, user_id: &str) -> Result<UserInfo, Error> {
        let encrypted = self
            .kv
            .get(&token_key(user_id))
            .await?
            .ok_or_else(|| storage_error(StorageErrorKind::NotFound, "no credential stored"))?;

        let plaintext = decrypt(&encrypted, self.key())?;
        serde_json::from_slice(&plaintext).map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: ErrorKind::Storage(StorageErrorKind::DecryptionFailed),
        })
    }

    /// Local user id registered for a provider identity, if any.
    pub async fn user_id_for_remote(&self, remote_id: &str) -> Result<Option<String>, Error> {
        let raw = self.kv.get(&remote_id_key(remote_id)).await?;
        Ok(raw.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Remove the credential for `user_id` and its reverse index entry.
    ///
    /// Deleting an absent credential succeeds. A record that no longer decrypts
    /// is removed without its reverse entry, which cannot be discovered. A failure
    /// removing the reverse entry is logged; a failure removing the primary entry
    /// is returned.
    pub async fn delete(&self, user_id: &str) -> Result<(), Error> {
        let info = match self.load(user_id).await {
            Ok(info) => info,
            Err(err) if err.is_not_found() => {
                debug!("No credential to delete for user {}", user_id);
                return Ok(());
            }
            Err(err) if is_unreadable(&err) => {
                warn!(
                    "Credential for user {} cannot be decrypted, removing it: {}",
                    user_id, err
                );
                return self.kv.delete(&token_key(user_id)).await;
            }
            Err(err) => return Err(err),
        };

        let primary = self.kv.delete(&token_key(user_id)).await;
        if let Err(err) = self.kv.delete(&remote_id_key(&info.remote_id)).await {
            warn!(
                "Failed to delete reverse index entry for user {}: {}",
                user_id, err
            );
        }

        primary
    }

    /// Remove every credential, reverse index entry and pending state.
    pub async fn reset_all(&self) -> Result<(), Error> {
        self.kv.delete_all().await
    }
}

fn is_unreadable(err: &Error) -> bool {
    matches!(
        err.error_kind,
        ErrorKind::Storage(StorageErrorKind::DecryptionFailed)
            | ErrorKind::Storage(StorageErrorKind::InvalidKeyLength)
    )
}
