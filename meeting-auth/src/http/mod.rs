//! HTTP client building for provider transports.

mod client;

pub use client::{HttpClientBuilder, HttpClientConfig};
