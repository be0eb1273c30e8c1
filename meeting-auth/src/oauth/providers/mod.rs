//! OAuth provider implementations.

pub mod microsoft;
