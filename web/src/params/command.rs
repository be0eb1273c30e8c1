use domain::command::CommandRequest;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A slash command already split into its action and the words after it.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({"user_id": "u1", "channel_id": "c1", "action": "start", "args": ["Sprint", "Planning"]}))]
pub struct CommandParams {
    pub user_id: String,
    pub channel_id: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl From<CommandParams> for CommandRequest {
    fn from(params: CommandParams) -> Self {
        CommandRequest {
            user_id: params.user_id,
            channel_id: params.channel_id,
            action: params.action,
            args: params.args,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CommandResponse {
    /// Reply shown to the requesting user; empty when there is nothing to say.
    pub text: String,
}
