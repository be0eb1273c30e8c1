//! Slash-command dispatch. Every reply is a single line (or the help text) delivered
//! to the requesting user as an ephemeral post.

use log::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::NOT_CONNECTED_MESSAGE;
use crate::meeting::{ConnectOutcome, MeetingService, StartOutcome};

pub const HELP_TEXT: &str = "###### Mattermost MS Teams Meetings Plugin - Slash Command Help\n\
* `/mstmeetings start` - Start an MS Teams meeting. \n\
* `/mstmeetings connect` - Connect to MS Teams meeting. \n\
* `/mstmeetings disconnect` - Disconnect your Mattermost account from MS Teams. \n\
* `/mstmeetings help` - Display this help text.";

pub const TOO_MANY_PARAMETERS: &str = "Too many parameters.";
pub const ALREADY_CONNECTED: &str = "User already connected to MS Teams Meetings";
pub const DISCONNECTED: &str = "You have successfully disconnected from MS Teams Meetings.";

/// A parsed command. `args` are the words after the action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub user_id: String,
    pub channel_id: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Start,
    Connect,
    Disconnect,
    Help,
    Unknown(String),
}

impl From<&str> for Action {
    fn from(action: &str) -> Self {
        match action {
            "start" => Action::Start,
            "connect" => Action::Connect,
            "disconnect" => Action::Disconnect,
            "help" | "" => Action::Help,
            other => Action::Unknown(other.to_string()),
        }
    }
}

fn authorization_message(url: &str) -> String {
    format!(
        "{}. [Click here to link your Microsoft account.]({})",
        NOT_CONNECTED_MESSAGE, url
    )
}

pub struct CommandDispatcher {
    meetings: Arc<MeetingService>,
}

impl CommandDispatcher {
    pub fn new(meetings: Arc<MeetingService>) -> Self {
        Self { meetings }
    }

    /// Run the command and deliver a non-empty reply to the requester.
    pub async fn execute(&self, request: &CommandRequest) -> String {
        let reply = self.dispatch(request).await;
        if !reply.is_empty() {
            self.meetings
                .send_ephemeral(&request.user_id, &request.channel_id, &reply)
                .await;
        }
        reply
    }

    /// The reply for `request` without delivering it.
    pub async fn dispatch(&self, request: &CommandRequest) -> String {
        debug!(
            "Command {:?} from user {} in channel {}",
            request.action, request.user_id, request.channel_id
        );

        match Action::from(request.action.trim()) {
            Action::Start => self.handle_start(request).await,
            Action::Connect => self.handle_connect(request).await,
            Action::Disconnect => self.handle_disconnect(request).await,
            Action::Help => HELP_TEXT.to_string(),
            Action::Unknown(action) => format!("Unknown action `{}`.\n{}", action, HELP_TEXT),
        }
    }

    async fn handle_start(&self, request: &CommandRequest) -> String {
        let topic = request.args.join(" ");
        match self
            .meetings
            .start_meeting(&request.user_id, &request.channel_id, &topic)
            .await
        {
            Ok(StartOutcome::Started { .. }) | Ok(StartOutcome::Duplicated(_)) => String::new(),
            Ok(StartOutcome::AuthorizationRequired { url }) => authorization_message(&url),
            Err(failure) => {
                warn!(
                    "Failed to start meeting for user {} ({:?}): {}",
                    request.user_id, failure.stage, failure.error
                );
                failure.user_message().to_string()
            }
        }
    }

    async fn handle_connect(&self, request: &CommandRequest) -> String {
        if !request.args.is_empty() {
            return TOO_MANY_PARAMETERS.to_string();
        }

        match self
            .meetings
            .connect(&request.user_id, &request.channel_id)
            .await
        {
            Ok(ConnectOutcome::AlreadyConnected) => ALREADY_CONNECTED.to_string(),
            Ok(ConnectOutcome::AuthorizationRequired { url }) => authorization_message(&url),
            Err(e) => {
                warn!("Failed to connect user {}: {}", request.user_id, e);
                e.user_message().to_string()
            }
        }
    }

    async fn handle_disconnect(&self, request: &CommandRequest) -> String {
        if !request.args.is_empty() {
            return TOO_MANY_PARAMETERS.to_string();
        }

        match self.meetings.disconnect(&request.user_id).await {
            Ok(()) => DISCONNECTED.to_string(),
            Err(e) => format!("Failed to disconnect user, {}", e.root_cause()),
        }
    }
}
