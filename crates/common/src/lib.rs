// ================
// crates/common/src/lib.rs
// ================
//! Wire types shared by the Rollcall server and its viewers.
//!
//! Two protocols live here:
//! - the inbound webhook envelope posted by the conferencing provider, and
//! - the outbound push messages sent to viewers over the WebSocket.

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Event type strings understood by the server
pub mod event_types {
    pub const URL_VALIDATION: &str = "endpoint.url_validation";
    pub const PARTICIPANT_JOINED: &str = "meeting.participant_joined";
    pub const PARTICIPANT_LEFT: &str = "meeting.participant_left";
    pub const MEETING_ENDED: &str = "meeting.ended";
}

/// Classified webhook event type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    UrlValidation,
    ParticipantJoined,
    ParticipantLeft,
    MeetingEnded,
    /// Anything the server does not (yet) understand
    Other(String),
}

impl EventType {
    pub fn parse(event: &str) -> Self {
        match event {
            event_types::URL_VALIDATION => Self::UrlValidation,
            event_types::PARTICIPANT_JOINED => Self::ParticipantJoined,
            event_types::PARTICIPANT_LEFT => Self::ParticipantLeft,
            event_types::MEETING_ENDED => Self::MeetingEnded,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Top-level webhook body
/// # Fields
/// * `event` - Event type string, e.g. `meeting.participant_joined`
/// * `payload` - Event payload
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct WebhookEnvelope {
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
}

impl WebhookEnvelope {
    pub fn event_type(&self) -> EventType {
        EventType::parse(&self.event)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct WebhookPayload {
    /// Tenant the event belongs to
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub object: MeetingObject,
    /// Only present on `endpoint.url_validation`
    #[serde(rename = "plainToken", default, skip_serializing_if = "Option::is_none")]
    pub plain_token: Option<String>,
}

/// The meeting an event refers to
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct MeetingObject {
    /// Series id, sent as a number by some providers
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    /// Instance id, unique per occurrence
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub participant: Participant,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Participant {
    #[serde(default, deserialize_with = "string_or_number")]
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub email: String,
}

impl Participant {
    /// Roster key: the provider id, or the display name when no id is sent
    pub fn key(&self) -> &str {
        if self.user_id.is_empty() {
            &self.user_name
        } else {
            &self.user_id
        }
    }
}

/// Response body for `endpoint.url_validation`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UrlValidationResponse {
    #[serde(rename = "plainToken")]
    pub plain_token: String,
    #[serde(rename = "encryptedToken")]
    pub encrypted_token: String,
}

/// Messages pushed from server to viewer
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum PushMessage {
    /// A participant joined the meeting being shown
    Add { name: String },
    /// A participant left the meeting being shown
    Remove { name: String },
    /// Replace the whole list; names are sorted
    Reset { participants: Vec<String> },
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(de::Error::custom(format!(
            "expected a string or a number, got {other}"
        ))),
    }
}
