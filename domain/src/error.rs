//! Error types for the `domain` layer.
use crate::host::HostError;
use meeting_auth::error::{
    Error as MeetingAuthError, ErrorKind as MeetingAuthErrorKind, HttpErrorKind, OAuthErrorKind,
};
use std::error::Error as StdError;
use std::fmt;

/// Shown when a user has no usable credential.
pub const NOT_CONNECTED_MESSAGE: &str =
    "Your Mattermost account is not connected to any Microsoft Teams account";

/// Top-level domain error type.
/// Errors in the Domain layer are modeled as a tree structure
/// with `domain::error::Error` as the root type holding a tree of `error_kind`
/// enums that represent the kinds of errors that can occur in the domain layer or
/// in lower layers. The `source` field holds the original error, the internal cause
/// that is logged but never shown to users. `web` depends on `domain` only and uses
/// the `error_kind`s to pick HTTP status codes; command responses use `user_message`.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

/// Enum representing the major categories of errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    Internal(InternalErrorKind),
    External(ExternalErrorKind),
    Auth(AuthErrorKind),
}

/// Enum representing the various kinds of internal errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum InternalErrorKind {
    /// Required plugin configuration is missing.
    Config,
    /// Credential vault or state store read/write failure.
    Storage,
    /// User or channel membership could not be resolved.
    Lookup,
    Other(String),
}

/// Enum representing the various kinds of external errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum ExternalErrorKind {
    /// The meeting provider answered with a failure.
    Provider,
    Network,
}

/// Authentication outcomes that callers are expected to recover from.
#[derive(Debug, PartialEq)]
pub enum AuthErrorKind {
    /// No stored credential, or the provider rejected it.
    Required,
    /// OAuth2 state missing, expired or already consumed.
    InvalidState,
}

impl Error {
    pub fn config_invalid(message: &str) -> Self {
        Error {
            source: Some(message.to_string().into()),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Config),
        }
    }

    pub fn lookup(message: &str, cause: HostError) -> Self {
        Error {
            source: Some(format!("{}: {}", message, cause).into()),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Lookup),
        }
    }

    pub fn provider(message: String) -> Self {
        Error {
            source: Some(message.into()),
            error_kind: DomainErrorKind::External(ExternalErrorKind::Provider),
        }
    }

    /// An `AuthRequired` failure keeping the internal reason as its source.
    pub fn auth_required(cause: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Error {
            source: Some(cause.into()),
            error_kind: DomainErrorKind::Auth(AuthErrorKind::Required),
        }
    }

    pub fn is_auth_required(&self) -> bool {
        self.error_kind == DomainErrorKind::Auth(AuthErrorKind::Required)
    }

    /// Single line safe to show to the requesting user.
    pub fn user_message(&self) -> &'static str {
        match &self.error_kind {
            DomainErrorKind::Auth(AuthErrorKind::Required) => NOT_CONNECTED_MESSAGE,
            DomainErrorKind::Auth(AuthErrorKind::InvalidState) => {
                "The authorization link is invalid or has expired. Please try again."
            }
            DomainErrorKind::Internal(InternalErrorKind::Config) => {
                "MS Teams Meetings is not configured correctly. Please contact your system administrator."
            }
            DomainErrorKind::Internal(InternalErrorKind::Lookup) => {
                "We could not find your user or channel membership."
            }
            DomainErrorKind::Internal(_) | DomainErrorKind::External(_) => {
                "Something went wrong with MS Teams Meetings. Please try again later."
            }
        }
    }

    /// Message of the innermost error in the source chain.
    pub fn root_cause(&self) -> String {
        let mut current: &(dyn StdError + 'static) = match self.source.as_ref() {
            Some(source) => source.as_ref(),
            None => return format!("{:?}", self.error_kind),
        };
        while let Some(next) = current.source() {
            current = next;
        }
        current.to_string()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Domain Error: {:?}", self.error_kind)?;
        if let Some(source) = &self.source {
            write!(f, ": {}", source)?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // Errors that result from issues building the reqwest::Client instance. This
        // type of error will occur prior to any network calls being made.
        if err.is_builder() {
            Error {
                source: Some(Box::new(err)),
                error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(
                    "Failed to build reqwest client".to_string(),
                )),
            }
        // Errors that result from issues with the network call itself.
        } else {
            Error {
                source: Some(Box::new(err)),
                error_kind: DomainErrorKind::External(ExternalErrorKind::Network),
            }
        }
    }
}

impl From<MeetingAuthError> for Error {
    fn from(err: MeetingAuthError) -> Self {
        let error_kind = match &err.error_kind {
            MeetingAuthErrorKind::OAuth(OAuthErrorKind::InvalidState) => {
                DomainErrorKind::Auth(AuthErrorKind::InvalidState)
            }
            MeetingAuthErrorKind::OAuth(_) => {
                DomainErrorKind::External(ExternalErrorKind::Provider)
            }
            MeetingAuthErrorKind::Storage(_) => {
                DomainErrorKind::Internal(InternalErrorKind::Storage)
            }
            MeetingAuthErrorKind::Http(HttpErrorKind::Status(_)) => {
                DomainErrorKind::External(ExternalErrorKind::Provider)
            }
            MeetingAuthErrorKind::Http(HttpErrorKind::BuilderFailed) => DomainErrorKind::Internal(
                InternalErrorKind::Other("Failed to build HTTP client".to_string()),
            ),
            MeetingAuthErrorKind::Http(_) => DomainErrorKind::External(ExternalErrorKind::Network),
        };
        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<HostError> for Error {
    fn from(err: HostError) -> Self {
        let error_kind = match err {
            HostError::NotFound(_) => DomainErrorKind::Internal(InternalErrorKind::Lookup),
            HostError::Failed(_) => DomainErrorKind::Internal(InternalErrorKind::Other(
                "Host request failed".to_string(),
            )),
        };
        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}
