use serde::Deserialize;
use utoipa::IntoParams;

/// Query parameters of the OAuth2 redirect
#[derive(Debug, Deserialize, IntoParams)]
pub struct CompleteParams {
    pub code: String,
    pub state: String,
}
