//! Capability interface over the meeting provider.

use async_trait::async_trait;
use meeting_auth::credentials::UserInfo;
use meeting_auth::oauth::token::Tokens;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::configuration::Configuration;
use crate::error::Error;

/// A created online meeting. Only the join URL is interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnlineMeeting {
    #[serde(rename = "joinWebUrl", alias = "joinUrl")]
    pub join_url: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The identity the current access token belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteUser {
    pub id: String,
    #[serde(rename = "userPrincipalName", default)]
    pub user_principal_name: String,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Operations against the provider on behalf of one authorized user.
///
/// Failures are returned as they occurred; nothing is retried.
#[async_trait]
pub trait MeetingClient: Send + Sync {
    /// Create a meeting organized by `creator`, starting now and lasting one hour.
    async fn create_meeting(
        &self,
        creator: &UserInfo,
        attendees: &[UserInfo],
        subject: &str,
    ) -> Result<OnlineMeeting, Error>;

    async fn fetch_current_identity(&self) -> Result<RemoteUser, Error>;
}

/// Builds an authorized client from the current configuration and a user's tokens.
pub type ClientFactory =
    Arc<dyn Fn(&Configuration, Tokens) -> Result<Box<dyn MeetingClient>, Error> + Send + Sync>;

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::{DomainErrorKind, ExternalErrorKind};
    use std::sync::Mutex;

    /// What a [`RecordingClient`] was asked to do.
    #[derive(Default)]
    pub(crate) struct Recording {
        pub(crate) subjects: Vec<String>,
        pub(crate) identity_fetches: usize,
        pub(crate) clients_built: usize,
    }

    /// Substitute provider that records calls and answers from fixed data.
    pub(crate) struct RecordingClient {
        pub(crate) recording: Arc<Mutex<Recording>>,
        pub(crate) identity: Option<RemoteUser>,
        pub(crate) join_url: String,
    }

    #[async_trait]
    impl MeetingClient for RecordingClient {
        async fn create_meeting(
            &self,
            _creator: &UserInfo,
            _attendees: &[UserInfo],
            subject: &str,
        ) -> Result<OnlineMeeting, Error> {
            self.recording
                .lock()
                .unwrap()
                .subjects
                .push(subject.to_string());
            Ok(OnlineMeeting {
                join_url: self.join_url.clone(),
                extra: Map::new(),
            })
        }

        async fn fetch_current_identity(&self) -> Result<RemoteUser, Error> {
            self.recording.lock().unwrap().identity_fetches += 1;
            self.identity.clone().ok_or_else(|| Error {
                source: Some("401 Unauthorized".into()),
                error_kind: DomainErrorKind::External(ExternalErrorKind::Provider),
            })
        }
    }

    pub(crate) fn remote_user(id: &str) -> RemoteUser {
        RemoteUser {
            id: id.to_string(),
            user_principal_name: "alice@contoso.com".to_string(),
            mail: Some("alice@contoso.com".to_string()),
            extra: Map::new(),
        }
    }

    /// Factory whose clients share one recording. `identity: None` makes the
    /// provider reject the credential.
    pub(crate) fn recording_factory(
        identity: Option<RemoteUser>,
    ) -> (ClientFactory, Arc<Mutex<Recording>>) {
        let recording = Arc::new(Mutex::new(Recording::default()));
        let shared = recording.clone();
        let factory: ClientFactory = Arc::new(
            move |_config: &Configuration, _tokens: Tokens| -> Result<Box<dyn MeetingClient>, Error> {
                shared.lock().unwrap().clients_built += 1;
                Ok(Box::new(RecordingClient {
                    recording: shared.clone(),
                    identity: identity.clone(),
                    join_url: "https://teams.microsoft.com/l/meetup-join/abc".to_string(),
                }))
            },
        );
        (factory, recording)
    }
}
