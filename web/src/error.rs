use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::*;

use domain::error::{
    AuthErrorKind, DomainErrorKind, Error as DomainError, ExternalErrorKind, InternalErrorKind,
};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Domain(DomainError),
    Web(WebErrorKind),
}

/// Failures detected by the web layer itself, before reaching the domain.
#[derive(Debug, PartialEq)]
pub enum WebErrorKind {
    Input,
}

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        match self {
            Error::Domain(err) => write!(fmt, "{err}"),
            Error::Web(kind) => write!(fmt, "{kind:?}"),
        }
    }
}

// List of possible StatusCode variants https://docs.rs/http/latest/http/status/struct.StatusCode.html#associatedconstant.UNPROCESSABLE_ENTITY
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let err = match self {
            Error::Web(WebErrorKind::Input) => {
                return (StatusCode::BAD_REQUEST, "BAD REQUEST").into_response()
            }
            Error::Domain(err) => err,
        };

        warn!("Request failed: {}", err);
        match err.error_kind {
            DomainErrorKind::Internal(internal_error_kind) => match internal_error_kind {
                InternalErrorKind::Config => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "UNPROCESSABLE ENTITY").into_response()
                }
                InternalErrorKind::Lookup => (StatusCode::NOT_FOUND, "NOT FOUND").into_response(),
                InternalErrorKind::Storage | InternalErrorKind::Other(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL SERVER ERROR").into_response()
                }
            },
            DomainErrorKind::External(external_error_kind) => match external_error_kind {
                ExternalErrorKind::Provider | ExternalErrorKind::Network => {
                    (StatusCode::BAD_GATEWAY, "BAD GATEWAY").into_response()
                }
            },
            DomainErrorKind::Auth(auth_error_kind) => match auth_error_kind {
                AuthErrorKind::InvalidState => {
                    (StatusCode::BAD_REQUEST, "BAD REQUEST").into_response()
                }
                AuthErrorKind::Required => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED").into_response()
                }
            },
        }
    }
}

impl<E> From<E> for Error
where
    E: Into<DomainError>,
{
    fn from(err: E) -> Self {
        Self::Domain(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: DomainError) -> StatusCode {
        Error::from(err).into_response().status()
    }

    #[test]
    fn test_domain_kinds_map_to_status_codes() {
        assert_eq!(
            status_of(DomainError::config_invalid("missing")),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(DomainError::provider("cannot create meeting: 500".to_string())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(DomainError::auth_required("no credential")),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(DomainError {
                source: None,
                error_kind: DomainErrorKind::Auth(AuthErrorKind::InvalidState),
            }),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_input_error_is_bad_request() {
        assert_eq!(
            Error::Web(WebErrorKind::Input).into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
