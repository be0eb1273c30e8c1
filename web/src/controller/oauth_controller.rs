//! OAuth2 redirect target. The user's browser lands here after authorizing with
//! Microsoft, so the response is a page rather than JSON.

use crate::params::oauth::CompleteParams;
use crate::{AppState, Error};

use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse};

use crate::error::WebErrorKind;

const COMPLETED_PAGE: &str = r#"<!DOCTYPE html>
<html>
    <head>
        <script>
            window.close();
        </script>
    </head>
    <body>
        <p>Completed connecting to Microsoft Teams Meetings. Please close this window.</p>
    </body>
</html>"#;

/// GET /oauth2/complete
///
/// Redeems the state, stores the credential and continues what the user asked for:
/// a connect is confirmed privately, a start creates the meeting.
#[utoipa::path(
    get,
    path = "/oauth2/complete",
    params(CompleteParams),
    responses(
        (status = 200, description = "Authorization completed", content_type = "text/html"),
        (status = 400, description = "Missing code, or invalid or expired state"),
        (status = 502, description = "Microsoft rejected the code or the meeting request"),
    )
)]
pub async fn complete(
    State(app_state): State<AppState>,
    Query(params): Query<CompleteParams>,
) -> Result<impl IntoResponse, Error> {
    if params.code.is_empty() || params.state.is_empty() {
        return Err(Error::Web(WebErrorKind::Input));
    }

    app_state
        .meetings
        .complete_authorization(&params.state, &params.code)
        .await?;

    Ok(Html(COMPLETED_PAGE))
}
