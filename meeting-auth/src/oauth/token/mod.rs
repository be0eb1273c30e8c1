//! OAuth token types and the refreshing token source used by provider transports.

mod source;
mod tokens;

pub use source::TokenSource;
pub use tokens::Tokens;
