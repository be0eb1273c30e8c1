use crate::params::command::{CommandParams, CommandResponse};
use crate::AppState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use domain::command::CommandRequest;
use log::*;

/// POST run a slash command
///
/// The reply is also delivered to the user as an ephemeral post.
#[utoipa::path(
    post,
    path = "/commands",
    request_body = CommandParams,
    responses(
        (status = 200, description = "Command executed", body = CommandResponse),
        (status = 400, description = "Malformed command"),
    )
)]
pub async fn execute(
    State(app_state): State<AppState>,
    Json(params): Json<CommandParams>,
) -> impl IntoResponse {
    debug!("POST /commands action {:?}", params.action);

    let request = CommandRequest::from(params);
    let text = app_state.commands.execute(&request).await;

    Json(CommandResponse { text })
}
