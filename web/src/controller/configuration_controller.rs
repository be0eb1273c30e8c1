use crate::{AppState, Error};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use log::*;

/// POST notify that the plugin configuration changed
///
/// The configuration is reloaded from the host and published even when invalid.
#[utoipa::path(
    post,
    path = "/configuration",
    responses(
        (status = 204, description = "Configuration reloaded"),
        (status = 422, description = "Configuration is missing required OAuth2 settings"),
    )
)]
pub async fn changed(State(app_state): State<AppState>) -> Result<impl IntoResponse, Error> {
    info!("Plugin configuration changed, reloading");

    app_state
        .configuration
        .on_configuration_change(app_state.config_store.as_ref(), &app_state.jobs)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
