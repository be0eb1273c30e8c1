//! Key-value capability the vault and state store persist through.

use async_trait::async_trait;

use crate::error::Error;

/// Narrow view of the host's durable key-value store.
///
/// Implementations report backend failures as `StorageErrorKind::Backend`.
/// `get` of an absent key is `Ok(None)` and `delete` of an absent key is `Ok(())`.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error>;

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), Error>;

    async fn delete(&self, key: &str) -> Result<(), Error>;

    /// Remove every key owned by this plugin.
    async fn delete_all(&self) -> Result<(), Error>;
}
