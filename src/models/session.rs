use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::User;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionMode {
    /// Replays the driver's assigned video through the analysis service.
    Recorded,
    /// Live self-test against the service's camera feed.
    Realtime,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Recorded => "recorded",
            SessionMode::Realtime => "realtime",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ChannelState {
    #[default]
    Idle,
    Connecting,
    Open,
    Closed,
    Failed,
}

impl ChannelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelState::Idle => "idle",
            ChannelState::Connecting => "connecting",
            ChannelState::Open => "open",
            ChannelState::Closed => "closed",
            ChannelState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ChannelState::Closed | ChannelState::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub subject: User,
    pub mode: SessionMode,
    pub channel_state: ChannelState,
    pub started_at: DateTime<Utc>,
}

impl SessionInfo {
    pub fn new(subject: User, mode: SessionMode) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            subject,
            mode,
            channel_state: ChannelState::Idle,
            started_at: Utc::now(),
        }
    }
}
