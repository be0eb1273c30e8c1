//! Microsoft Graph API client for online meetings.
//!
//! The access token is taken from a `TokenSource` on every call, so an expired token
//! is refreshed before the request is sent.

use crate::configuration::Configuration;
use crate::error::{DomainErrorKind, Error, ExternalErrorKind};
use crate::meeting_client::{ClientFactory, MeetingClient, OnlineMeeting, RemoteUser};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::*;
use meeting_auth::credentials::UserInfo;
use meeting_auth::http::HttpClientBuilder;
use meeting_auth::oauth::providers::microsoft;
use meeting_auth::oauth::token::{TokenSource, Tokens};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use service::config::Config;
use std::sync::Arc;

#[derive(Debug, Serialize)]
struct Identity {
    id: String,
}

#[derive(Debug, Serialize)]
struct IdentitySet {
    user: Identity,
}

#[derive(Debug, Serialize)]
struct MeetingParticipantInfo {
    identity: IdentitySet,
    upn: String,
}

impl From<&UserInfo> for MeetingParticipantInfo {
    fn from(info: &UserInfo) -> Self {
        MeetingParticipantInfo {
            identity: IdentitySet {
                user: Identity {
                    id: info.remote_id.clone(),
                },
            },
            upn: info.upn.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MeetingParticipants {
    organizer: MeetingParticipantInfo,
    attendees: Vec<MeetingParticipantInfo>,
}

/// Request body for `POST /users/{id}/onlineMeetings`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateMeetingRequest {
    start_date_time: DateTime<Utc>,
    end_date_time: DateTime<Utc>,
    subject: String,
    participants: MeetingParticipants,
}

/// Microsoft Graph API client
pub struct Client {
    client: reqwest::Client,
    base_url: String,
    tokens: TokenSource,
}

impl Client {
    pub fn new(client: reqwest::Client, base_url: &str, tokens: TokenSource) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    async fn access_token(&self) -> Result<SecretString, Error> {
        self.tokens.access_token().await.map_err(|e| {
            warn!("Failed to obtain Microsoft access token: {}", e);
            Error::from(e)
        })
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<T, Error> {
        let token = self.access_token().await?;

        let response = request
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| {
                warn!("Microsoft Graph request failed ({}): {:?}", context, e);
                Error::from(e)
            })?;

        let status = response.status();
        if status.is_success() {
            response.json::<T>().await.map_err(|e| {
                warn!("Failed to parse Microsoft Graph response ({}): {:?}", context, e);
                Error {
                    source: Some(Box::new(e)),
                    error_kind: DomainErrorKind::External(ExternalErrorKind::Provider),
                }
            })
        } else {
            let error_text = response.text().await.unwrap_or_default();
            warn!(
                "Microsoft Graph API error ({}): {} {}",
                context, status, error_text
            );
            Err(Error::provider(format!("{}: {}", context, status)))
        }
    }
}

#[async_trait]
impl MeetingClient for Client {
    async fn create_meeting(
        &self,
        creator: &UserInfo,
        attendees: &[UserInfo],
        subject: &str,
    ) -> Result<OnlineMeeting, Error> {
        let start = Utc::now();
        let body = CreateMeetingRequest {
            start_date_time: start,
            end_date_time: start + Duration::hours(1),
            subject: subject.to_string(),
            participants: MeetingParticipants {
                organizer: creator.into(),
                attendees: attendees.iter().map(MeetingParticipantInfo::from).collect(),
            },
        };

        let url = format!("{}/users/{}/onlineMeetings", self.base_url, creator.remote_id);
        debug!("Creating Teams meeting for user {}", creator.user_id);

        let meeting: OnlineMeeting = self
            .send_json(self.client.post(&url).json(&body), "cannot create meeting")
            .await?;

        info!("Created Teams meeting for user {}", creator.user_id);
        Ok(meeting)
    }

    async fn fetch_current_identity(&self) -> Result<RemoteUser, Error> {
        let url = format!("{}/me", self.base_url);
        self.send_json(self.client.get(&url), "cannot fetch current user")
            .await
    }
}

/// Factory building Graph clients against the endpoints in `config`.
pub fn client_factory(config: &Config) -> ClientFactory {
    let login_base_url = config.login_base_url().to_string();
    let graph_base_url = config.graph_base_url().to_string();
    let redirect_url = config.redirect_url();
    let timeout = config.provider_timeout();

    Arc::new(
        move |plugin_config: &Configuration, tokens: Tokens| -> Result<Box<dyn MeetingClient>, Error> {
            let provider = microsoft::Provider::new(&microsoft::Settings {
                login_base_url: login_base_url.clone(),
                authority: plugin_config.oauth2_authority.clone(),
                client_id: plugin_config.oauth2_client_id.clone(),
                client_secret: SecretString::from(plugin_config.oauth2_client_secret.clone()),
                redirect_url: redirect_url.clone(),
            })?;
            let http = HttpClientBuilder::new().with_timeout(timeout).build()?;

            Ok(Box::new(Client::new(
                http,
                &graph_base_url,
                TokenSource::new(tokens, Arc::new(provider)),
            )))
        },
    )
}
