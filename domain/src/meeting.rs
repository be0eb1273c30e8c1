//! Meeting orchestration: connect, disconnect and start-meeting with channel dedup.
//!
//! A started meeting is advertised as a channel post tagged with the provider, the
//! join link and the creator. Later start requests scan the channel for such a post
//! within [`DEDUP_WINDOW_SECS`] and reuse its link instead of creating another meeting.
//! Two requests racing past the scan may both create a meeting; no lock is held.

use chrono::{DateTime, Duration, Utc};
use events::{DomainEvent, EventPublisher, StartSource};
use log::*;
use serde_json::{Map, Value};

use crate::error::Error;
use crate::host::{Host, Post, User};
use crate::oauth_flow::{AuthenticatedUser, Authenticator};

/// Trailing window, in seconds, in which an advertised meeting is reused.
pub const DEDUP_WINDOW_SECS: i64 = 30;

pub const PROVIDER_NAME: &str = "Microsoft Teams Meeting";
pub const DEFAULT_SUBJECT: &str = "MS Teams Meeting";
pub const POST_TYPE: &str = "custom_mstmeetings";

pub const PROP_PROVIDER: &str = "meeting_provider";
pub const PROP_LINK: &str = "meeting_link";
pub const PROP_CREATOR: &str = "meeting_creator_username";
pub const PROP_TOPIC: &str = "meeting_topic";
pub const PROP_STATUS: &str = "meeting_status";
pub const PROP_PERSONAL: &str = "meeting_personal";

/// A meeting found in the channel history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingAdvertisement {
    pub provider: String,
    pub join_url: String,
    pub creator_name: String,
}

impl MeetingAdvertisement {
    /// The advertisement carried by `post`, if all three tags are non-empty.
    fn from_post(post: &Post) -> Option<Self> {
        let provider = post.prop_str(PROP_PROVIDER);
        let join_url = post.prop_str(PROP_LINK);
        let creator_name = post.prop_str(PROP_CREATOR);
        if provider.is_empty() || join_url.is_empty() || creator_name.is_empty() {
            return None;
        }
        Some(MeetingAdvertisement {
            provider: provider.to_string(),
            join_url: join_url.to_string(),
            creator_name: creator_name.to_string(),
        })
    }
}

#[derive(Debug, PartialEq)]
pub enum StartOutcome {
    Started { join_url: String },
    /// A recent meeting was announced to the requester instead.
    Duplicated(MeetingAdvertisement),
    AuthorizationRequired { url: String },
}

#[derive(Debug, PartialEq)]
pub enum ConnectOutcome {
    AlreadyConnected,
    AuthorizationRequired { url: String },
}

#[derive(Debug, PartialEq)]
pub enum CompletionOutcome {
    Connected,
    MeetingStarted { join_url: String },
}

/// The part of a start request that failed. Selects the reply shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartStage {
    User,
    ChannelMember,
    RecentMessages,
    Authorization,
    CreateMeeting,
}

#[derive(Debug)]
pub struct StartFailure {
    pub stage: StartStage,
    pub error: Error,
}

impl StartFailure {
    fn at(stage: StartStage) -> impl FnOnce(Error) -> StartFailure {
        move |error| StartFailure { stage, error }
    }

    pub fn user_message(&self) -> &'static str {
        match self.stage {
            StartStage::User => "Cannot get user.",
            StartStage::ChannelMember => "We could not get channel members.",
            StartStage::RecentMessages => "Error checking previous messages.",
            StartStage::Authorization => self.error.user_message(),
            StartStage::CreateMeeting => "Failed to post message. Please try again.",
        }
    }
}

pub struct MeetingService {
    host: Host,
    auth: Authenticator,
    events: EventPublisher,
    bot_user_id: String,
}

impl MeetingService {
    pub fn new(host: Host, auth: Authenticator, events: EventPublisher, bot_user_id: &str) -> Self {
        Self {
            host,
            auth,
            events,
            bot_user_id: bot_user_id.to_string(),
        }
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.auth
    }

    /// Send `message` from the bot to `user_id` only. Delivery failures are logged.
    pub async fn send_ephemeral(&self, user_id: &str, channel_id: &str, message: &str) {
        let post = Post::new(&self.bot_user_id, channel_id, message);
        if let Err(e) = self.host.posts.send_ephemeral_post(user_id, post).await {
            warn!("Failed to send ephemeral post to user {}: {}", user_id, e);
        }
    }

    /// The first post, in the host's order, created strictly inside the dedup window
    /// that advertises a meeting.
    pub async fn check_recent_meeting(
        &self,
        channel_id: &str,
    ) -> Result<Option<MeetingAdvertisement>, Error> {
        self.check_recent_meeting_at(channel_id, Utc::now()).await
    }

    /// `check_recent_meeting` with the window ending at `now`.
    pub async fn check_recent_meeting_at(
        &self,
        channel_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<MeetingAdvertisement>, Error> {
        let cutoff = now - Duration::seconds(DEDUP_WINDOW_SECS);
        let posts = self
            .host
            .posts
            .get_posts_since(channel_id, cutoff)
            .await
            .inspect_err(|e| warn!("Failed to read posts of channel {}: {}", channel_id, e))?;

        Ok(posts
            .iter()
            .filter(|post| post.create_at > cutoff)
            .find_map(MeetingAdvertisement::from_post))
    }

    pub async fn start_meeting(
        &self,
        user_id: &str,
        channel_id: &str,
        topic: &str,
    ) -> Result<StartOutcome, StartFailure> {
        let user = self
            .host
            .users
            .get_user(user_id)
            .await
            .map_err(|e| Error::lookup("cannot get user", e))
            .map_err(StartFailure::at(StartStage::User))?;

        self.host
            .channels
            .get_channel_member(channel_id, user_id)
            .await
            .map_err(|e| Error::lookup("cannot get channel member", e))
            .map_err(StartFailure::at(StartStage::ChannelMember))?;

        if let Some(recent) = self
            .check_recent_meeting(channel_id)
            .await
            .map_err(StartFailure::at(StartStage::RecentMessages))?
        {
            debug!(
                "Reusing meeting of {} in channel {}",
                recent.creator_name, channel_id
            );
            self.send_ephemeral(
                user_id,
                channel_id,
                &format!(
                    "{} started a meeting in this channel a moment ago. Join it here: {}",
                    recent.creator_name, recent.join_url
                ),
            )
            .await;
            self.events
                .publish(DomainEvent::MeetingDuplicated {
                    user_id: user_id.to_string(),
                    channel_id: channel_id.to_string(),
                    source: StartSource::Command,
                })
                .await;
            return Ok(StartOutcome::Duplicated(recent));
        }

        let authenticated = match self.auth.authenticate_and_fetch_user(user_id).await {
            Ok(authenticated) => authenticated,
            Err(e) if e.is_auth_required() => {
                debug!("User {} must authorize before starting a meeting: {}", user_id, e);
                let url = self
                    .auth
                    .issue_state(user_id, channel_id, false)
                    .await
                    .map_err(StartFailure::at(StartStage::Authorization))?;
                return Ok(StartOutcome::AuthorizationRequired { url });
            }
            Err(e) => return Err(StartFailure::at(StartStage::Authorization)(e)),
        };

        let join_url = self
            .post_meeting(&user, &authenticated, channel_id, topic)
            .await
            .map_err(StartFailure::at(StartStage::CreateMeeting))?;

        self.events
            .publish(DomainEvent::MeetingStarted {
                user_id: user_id.to_string(),
                channel_id: channel_id.to_string(),
                source: StartSource::Command,
            })
            .await;
        Ok(StartOutcome::Started { join_url })
    }

    /// Create the meeting and advertise it in the channel. Returns the join URL.
    async fn post_meeting(
        &self,
        creator: &User,
        authenticated: &AuthenticatedUser,
        channel_id: &str,
        topic: &str,
    ) -> Result<String, Error> {
        let subject = if topic.trim().is_empty() {
            DEFAULT_SUBJECT
        } else {
            topic
        };

        let meeting = authenticated
            .client
            .create_meeting(&authenticated.info, &[], subject)
            .await
            .inspect_err(|e| {
                error!("Failed to create meeting for user {}: {}", creator.id, e)
            })?;

        let mut props = Map::new();
        props.insert(PROP_LINK.into(), Value::from(meeting.join_url.clone()));
        props.insert(PROP_STATUS.into(), Value::from("STARTED"));
        props.insert(PROP_PERSONAL.into(), Value::from(false));
        props.insert(PROP_PROVIDER.into(), Value::from(PROVIDER_NAME));
        props.insert(PROP_TOPIC.into(), Value::from(topic));
        props.insert(PROP_CREATOR.into(), Value::from(creator.username.clone()));

        let mut post = Post::new(
            &creator.id,
            channel_id,
            &format!("Meeting started at {}.", meeting.join_url),
        );
        post.post_type = POST_TYPE.to_string();
        post.props = props;

        self.host.posts.create_post(post).await.inspect_err(|e| {
            error!("Failed to post meeting in channel {}: {}", channel_id, e)
        })?;

        info!("User {} started a meeting in channel {}", creator.id, channel_id);
        Ok(meeting.join_url)
    }

    pub async fn connect(&self, user_id: &str, channel_id: &str) -> Result<ConnectOutcome, Error> {
        match self.auth.authenticate_and_fetch_user(user_id).await {
            Ok(_) => Ok(ConnectOutcome::AlreadyConnected),
            Err(e) if e.is_auth_required() => {
                let url = self.auth.issue_state(user_id, channel_id, true).await?;
                Ok(ConnectOutcome::AuthorizationRequired { url })
            }
            Err(e) => Err(e),
        }
    }

    /// Remove the user's credential. The event is recorded only on success.
    pub async fn disconnect(&self, user_id: &str) -> Result<(), Error> {
        self.auth.disconnect(user_id).await?;
        self.events
            .publish(DomainEvent::UserDisconnected {
                user_id: user_id.to_string(),
            })
            .await;
        Ok(())
    }

    /// Finish an OAuth2 redirect and carry out what the user originally asked for.
    pub async fn complete_authorization(
        &self,
        state: &str,
        code: &str,
    ) -> Result<CompletionOutcome, Error> {
        let completed = self.auth.complete_authorization(state, code).await?;
        let pending = &completed.pending;

        if pending.is_direct_connect {
            self.send_ephemeral(
                &pending.user_id,
                &pending.channel_id,
                "You have successfully connected to MS Teams Meetings.",
            )
            .await;
            self.events
                .publish(DomainEvent::UserConnected {
                    user_id: pending.user_id.clone(),
                })
                .await;
            return Ok(CompletionOutcome::Connected);
        }

        let user = self
            .host
            .users
            .get_user(&pending.user_id)
            .await
            .map_err(|e| Error::lookup("cannot get user", e))?;

        let join_url = self
            .post_meeting(&user, &completed.user, &pending.channel_id, "")
            .await?;

        self.events
            .publish(DomainEvent::MeetingStarted {
                user_id: pending.user_id.clone(),
                channel_id: pending.channel_id.clone(),
                source: StartSource::OAuth,
            })
            .await;
        Ok(CompletionOutcome::MeetingStarted { join_url })
    }
}
