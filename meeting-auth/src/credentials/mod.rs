//! Encrypted-at-rest storage of per-user provider credentials.

pub mod encryption;
mod kv;
mod vault;

pub use kv::KvStore;
pub use vault::{remote_id_key, token_key, CredentialVault, UserInfo};

#[cfg(test)]
pub(crate) use kv::testing;
