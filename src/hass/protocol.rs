//! Home Assistant websocket API message structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Messages sent to Home Assistant.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outgoing {
    Auth {
        access_token: String,
    },
    GetStates {
        id: u64,
    },
    SubscribeEvents {
        id: u64,
        event_type: String,
    },
    CallService {
        id: u64,
        domain: String,
        service: String,
        service_data: Value,
        target: ServiceTarget,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceTarget {
    pub entity_id: String,
}

/// Messages received from Home Assistant.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Incoming {
    AuthRequired {
        ha_version: Option<String>,
    },
    AuthOk {
        ha_version: Option<String>,
    },
    AuthInvalid {
        message: Option<String>,
    },
    Result(ResultMessage),
    Event {
        id: u64,
        event: Event,
    },
    Pong {
        id: u64,
    },
    #[serde(other)]
    Unknown,
}

/// Reply to a request carrying the same `id`.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultMessage {
    pub id: u64,
    pub success: bool,
    pub result: Option<Value>,
    pub error: Option<ApiError>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

/// Payload of a `state_changed` event.
#[derive(Debug, Clone, Deserialize)]
pub struct StateChange {
    pub entity_id: String,
    pub old_state: Option<EntityState>,
    pub new_state: Option<EntityState>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EntityState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: MediaPlayerAttributes,
}

/// The `media_player` attributes the bridge reads. Everything is optional:
/// integrations only report what they know.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct MediaPlayerAttributes {
    pub friendly_name: Option<String>,
    /// Some integrations (Kodi, Plex) report a numeric id.
    #[serde(deserialize_with = "string_or_number")]
    pub media_content_id: Option<String>,
    pub media_title: Option<String>,
    pub media_artist: Option<String>,
    pub media_album_name: Option<String>,
    pub media_album_artist: Option<String>,
    /// Seconds.
    pub media_duration: Option<f64>,
    /// Seconds.
    pub media_position: Option<f64>,
    /// When `media_position` was sampled. Unparseable stamps are dropped.
    #[serde(deserialize_with = "timestamp")]
    pub media_position_updated_at: Option<DateTime<Utc>>,
    pub media_image_url: Option<String>,
    pub entity_picture: Option<String>,
    pub entity_picture_local: Option<String>,
    pub shuffle: Option<bool>,
    pub repeat: Option<String>,
    pub volume_level: Option<f64>,
    pub supported_features: Option<u32>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ContentId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<ContentId>::deserialize(deserializer)?.map(|id| match id {
        ContentId::Text(text) => text,
        ContentId::Number(number) => number.to_string(),
    }))
}

fn timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }))
}
