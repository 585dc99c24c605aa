use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Message sent by DRF over a websocket subscription.
///
/// On the wire every message is wrapped in an envelope of the form
/// `{"kind": "<kind>", "payload": {...}}`. The envelope is handled here and
/// never shows up in the variant types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum DrfMessage {
    /// Drop information.
    Data(DataMessage),
    /// Session information changed.
    SessionUpdate(SessionUpdateMessage),
}

/// A message with drop information.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataMessage {
    /// Name of the current character.
    pub character: String,
    /// What was picked up and the magic find it dropped with.
    pub drop: DropInfo,
}

/// A single drop.
///
/// Map entries are keyed by item or currency id and hold the change in the
/// amount, which may be negative. Ids without an entry did not change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DropInfo {
    pub items: BTreeMap<i32, i32>,
    #[serde(rename = "curr")]
    pub currencies: BTreeMap<i32, i32>,
    #[serde(rename = "mf")]
    pub magic_find: i32,
    /// ISO 8601 timestamp of the drop.
    pub timestamp: String,
}

/// A message that is sent when session information changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionUpdateMessage {
    pub character: String,
    pub level: i32,
    /// Id of the current map.
    pub map: i32,
    /// ISO 8601 timestamp of the session start.
    pub start: String,
    /// ISO 8601 timestamp of the session end, `None` while the session is
    /// ongoing. Always present on the wire, possibly as `null`.
    #[serde(deserialize_with = "Option::deserialize")]
    pub end: Option<String>,
}

impl SessionUpdateMessage {
    pub fn is_ongoing(&self) -> bool {
        self.end.is_none()
    }
}

/// Errors produced while decoding inbound frames.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Frame payload did not match the message schema.
    #[error("invalid message: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame type that cannot carry a message.
    #[error("unexpected {0} frame")]
    UnexpectedFrame(&'static str),

    #[error("text frame is not valid UTF-8")]
    InvalidUtf8,
}

impl DrfMessage {
    /// Wire value of the `kind` discriminator for this message.
    pub fn kind(&self) -> &'static str {
        match self {
            DrfMessage::Data(_) => "data",
            DrfMessage::SessionUpdate(_) => "session_update",
        }
    }

    pub fn character(&self) -> &str {
        match self {
            DrfMessage::Data(message) => &message.character,
            DrfMessage::SessionUpdate(message) => &message.character,
        }
    }

    pub fn from_value(value: Value) -> Result<Self, DecodeError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn from_text(text: &str) -> Result<Self, DecodeError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<DataMessage> for DrfMessage {
    fn from(message: DataMessage) -> Self {
        DrfMessage::Data(message)
    }
}

impl From<SessionUpdateMessage> for DrfMessage {
    fn from(message: SessionUpdateMessage) -> Self {
        DrfMessage::SessionUpdate(message)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const DROP_TIMESTAMP: &str = "2024-03-28T20:22:59.527482750Z";
    const SESSION_START: &str = "2024-03-28T20:27:20.496005890Z";
    const SESSION_END: &str = "2024-03-28T20:44:56.123511224Z";

    fn round_trip(message: DrfMessage) {
        let value = message.to_value().expect("encode");
        let decoded = DrfMessage::from_value(value).expect("decode");
        assert_eq!(message, decoded);

        let text = message.to_text().expect("encode text");
        let decoded = DrfMessage::from_text(&text).expect("decode text");
        assert_eq!(message, decoded);
    }

    fn data_message(items: &[(i32, i32)], currencies: &[(i32, i32)]) -> DrfMessage {
        DrfMessage::Data(DataMessage {
            character: "John Doe".to_string(),
            drop: DropInfo {
                items: items.iter().copied().collect(),
                currencies: currencies.iter().copied().collect(),
                magic_find: 367,
                timestamp: DROP_TIMESTAMP.to_string(),
            },
        })
    }

    fn session_update(end: Option<&str>) -> DrfMessage {
        DrfMessage::SessionUpdate(SessionUpdateMessage {
            character: "John Doe".to_string(),
            level: 42,
            map: 1517,
            start: SESSION_START.to_string(),
            end: end.map(str::to_string),
        })
    }

    #[test]
    fn decodes_data_message() {
        let decoded = DrfMessage::from_text(
            r#"{"kind":"data","payload":{"character":"John Doe","drop":{"items":{"84731":3,"86181":1,"100109":-1},"curr":{"2":1320,"73":-26},"mf":367,"timestamp":"2024-03-28T20:22:59.527482750Z"}}}"#,
        )
        .expect("decode");

        assert_eq!(
            decoded,
            data_message(&[(84731, 3), (86181, 1), (100109, -1)], &[(2, 1320), (73, -26)])
        );
    }

    #[test]
    fn decodes_data_message_with_empty_maps() {
        let decoded = DrfMessage::from_text(
            r#"{"kind":"data","payload":{"character":"John Doe","drop":{"items":{},"curr":{"2":1320,"73":-26},"mf":367,"timestamp":"2024-03-28T20:22:59.527482750Z"}}}"#,
        )
        .expect("decode");
        assert_eq!(decoded, data_message(&[], &[(2, 1320), (73, -26)]));

        let decoded = DrfMessage::from_text(
            r#"{"kind":"data","payload":{"character":"John Doe","drop":{"items":{"84731":3},"curr":{},"mf":367,"timestamp":"2024-03-28T20:22:59.527482750Z"}}}"#,
        )
        .expect("decode");
        assert_eq!(decoded, data_message(&[(84731, 3)], &[]));
    }

    #[test]
    fn encodes_data_message() {
        let encoded = data_message(&[(84731, 3), (86181, 1), (100109, -1)], &[(2, 1320), (73, -26)])
            .to_value()
            .expect("encode");

        assert_eq!(
            encoded,
            json!({
                "kind": "data",
                "payload": {
                    "character": "John Doe",
                    "drop": {
                        "items": {"84731": 3, "86181": 1, "100109": -1},
                        "curr": {"2": 1320, "73": -26},
                        "mf": 367,
                        "timestamp": DROP_TIMESTAMP
                    }
                }
            })
        );
    }

    #[test]
    fn encodes_empty_maps_as_empty_objects() {
        let encoded = data_message(&[], &[]).to_value().expect("encode");

        assert_eq!(encoded["payload"]["drop"]["items"], json!({}));
        assert_eq!(encoded["payload"]["drop"]["curr"], json!({}));
    }

    #[test]
    fn missing_items_is_not_an_empty_map() {
        let result = DrfMessage::from_value(json!({
            "kind": "data",
            "payload": {
                "character": "John Doe",
                "drop": {"curr": {}, "mf": 0, "timestamp": DROP_TIMESTAMP}
            }
        }));

        assert!(matches!(result, Err(DecodeError::Json(_))));
    }

    #[test]
    fn decodes_session_update() {
        let decoded = DrfMessage::from_text(
            r#"{"kind":"session_update","payload":{"character":"John Doe","level":42,"map":1517,"start":"2024-03-28T20:27:20.496005890Z","end":null}}"#,
        )
        .expect("decode");
        assert_eq!(decoded, session_update(None));

        let decoded = DrfMessage::from_text(
            r#"{"kind":"session_update","payload":{"character":"John Doe","level":42,"map":1517,"start":"2024-03-28T20:27:20.496005890Z","end":"2024-03-28T20:44:56.123511224Z"}}"#,
        )
        .expect("decode");
        assert_eq!(decoded, session_update(Some(SESSION_END)));
    }

    #[test]
    fn encodes_open_session_end_as_null() {
        let encoded = session_update(None).to_value().expect("encode");

        assert_eq!(
            encoded,
            json!({
                "kind": "session_update",
                "payload": {
                    "character": "John Doe",
                    "level": 42,
                    "map": 1517,
                    "start": SESSION_START,
                    "end": null
                }
            })
        );
        assert!(encoded["payload"]
            .as_object()
            .expect("payload object")
            .contains_key("end"));
    }

    #[test]
    fn encodes_closed_session_end() {
        let encoded = session_update(Some(SESSION_END)).to_value().expect("encode");
        assert_eq!(encoded["payload"]["end"], json!(SESSION_END));
    }

    #[test]
    fn missing_end_is_rejected() {
        let result = DrfMessage::from_value(json!({
            "kind": "session_update",
            "payload": {"character": "John Doe", "level": 42, "map": 1517, "start": SESSION_START}
        }));

        assert!(result.is_err());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let result = DrfMessage::from_text(r#"{"kind":"bogus","payload":{}}"#);
        assert!(matches!(result, Err(DecodeError::Json(_))));
    }

    #[test]
    fn missing_envelope_fields_are_rejected() {
        assert!(DrfMessage::from_value(json!({"payload": {}})).is_err());
        assert!(DrfMessage::from_value(json!({"kind": "session_update"})).is_err());
        assert!(DrfMessage::from_value(json!({
            "kind": "session_update",
            "payload": {"character": "John Doe", "level": "42", "map": 1517, "start": SESSION_START, "end": null}
        }))
        .is_err());
    }

    #[test]
    fn accessors_follow_the_variant() {
        let data = data_message(&[], &[]);
        assert_eq!(data.kind(), "data");
        assert_eq!(data.character(), "John Doe");

        let update = session_update(None);
        assert_eq!(update.kind(), "session_update");
        match update {
            DrfMessage::SessionUpdate(message) => assert!(message.is_ongoing()),
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn messages_round_trip() {
        round_trip(data_message(&[(84731, 3), (100109, -1)], &[(2, 1320)]));
        round_trip(data_message(&[], &[]));
        round_trip(session_update(None));
        round_trip(session_update(Some(SESSION_END)));
    }
}
