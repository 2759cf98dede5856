//! `firos-types` – shared vocabulary of the FIROS gateway.
//!
//! Everything that crosses a crate boundary lives here: the robot/topic
//! descriptors owned by the registry, the NGSI context payloads received from
//! the broker, the decoded attribute values handed to the publish sink, the
//! topic-bus [`Event`] envelope, and the workspace-wide [`FirosError`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use thiserror::Error;
use uuid::Uuid;

/// Reserved attribute carrying the list of attribute names a robot currently
/// accepts as commands.
pub const COMMAND_ATTRIBUTE: &str = "COMMAND";

/// Field of a decoded attribute value holding its update stamp.
pub const STAMP_FIELD: &str = "updateStamp";

/// Entity type under which robots are stored in the context broker.
pub const ROBOT_ENTITY_TYPE: &str = "ROBOT";

// ─────────────────────────────────────────────────────────────────────────────
// Registry descriptors
// ─────────────────────────────────────────────────────────────────────────────

/// Whether the robot publishes on a topic or subscribes to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicDirection {
    Publisher,
    Subscriber,
}

impl TopicDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicDirection::Publisher => "publisher",
            TopicDirection::Subscriber => "subscriber",
        }
    }
}

/// Shape of the messages carried by a topic.
///
/// Either a named message type (e.g. `"std_msgs/String"`) whose structure is
/// resolved by the registry, or an inline field mapping declared directly in
/// the robots file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageShape {
    Named(String),
    Structured(Map<String, Value>),
}

/// A single topic exposed by a robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    #[serde(rename = "type")]
    pub direction: TopicDirection,
    #[serde(rename = "msg")]
    pub shape: MessageShape,
}

/// A robot known to the registry together with its ordered topics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Robot {
    pub id: String,
    pub topics: Vec<Topic>,
}

// ─────────────────────────────────────────────────────────────────────────────
// NGSI context payloads
// ─────────────────────────────────────────────────────────────────────────────

/// Notification body POSTed by the context broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextNotification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub originator: Option<String>,
    /// Raw per-entity entries. Each one is only decoded once its status code
    /// is known to be `"200"`, see [`ContextNotification::ok_responses`].
    pub context_responses: Vec<Value>,
}

impl ContextNotification {
    /// Entries whose status code is exactly the string `"200"`, decoded one
    /// by one in notification order. Entries with any other status are
    /// skipped without looking at the rest of their content.
    pub fn ok_responses(&self) -> impl Iterator<Item = Result<ContextResponse, FirosError>> + '_ {
        self.context_responses
            .iter()
            .filter(|raw| raw.pointer("/statusCode/code").is_some_and(is_ok_status))
            .map(|raw| {
                ContextResponse::deserialize(raw)
                    .map_err(|e| FirosError::Decode(format!("malformed context response: {e}")))
            })
    }
}

fn is_ok_status(code: &Value) -> bool {
    matches!(code, Value::String(code) if code == "200")
}

/// One per-entity entry of a [`ContextNotification`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextResponse {
    pub context_element: ContextElement,
    pub status_code: StatusCode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCode {
    pub code: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_phrase: Option<String>,
}

/// An entity (robot) as reported by the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextElement {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_pattern: Option<Value>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl ContextElement {
    /// Remove the `COMMAND` attribute and return its value.
    ///
    /// Only the first attribute with that name is taken; any later duplicate
    /// stays in `attributes`.
    pub fn take_command(&mut self) -> Option<Value> {
        let index = self
            .attributes
            .iter()
            .position(|attr| attr.name == COMMAND_ATTRIBUTE)?;
        Some(self.attributes.remove(index).value)
    }
}

/// A named attribute value. Values are opaque: strings (often single-quoted
/// pseudo-JSON) or structures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub attr_type: Option<String>,
    #[serde(default)]
    pub value: Value,
}

// ─────────────────────────────────────────────────────────────────────────────
// Decoded values
// ─────────────────────────────────────────────────────────────────────────────

/// The `updateStamp` of a decoded value. Compared by value: strings never
/// equal numbers, and numbers compare numerically (`1 == 1.0`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UpdateStamp {
    Text(String),
    Number(Number),
}

impl PartialEq for UpdateStamp {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (UpdateStamp::Text(a), UpdateStamp::Text(b)) => a == b,
            (UpdateStamp::Number(a), UpdateStamp::Number(b)) => numbers_equal(a, b),
            _ => false,
        }
    }
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

impl std::fmt::Display for UpdateStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateStamp::Text(s) => write!(f, "{s:?}"),
            UpdateStamp::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for UpdateStamp {
    fn from(s: &str) -> Self {
        UpdateStamp::Text(s.to_string())
    }
}

/// An attribute value after it went through the value codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedValue {
    /// All payload fields, the stamp field included.
    pub fields: Map<String, Value>,
    pub stamp: UpdateStamp,
}

impl DecodedValue {
    /// The payload as a JSON object.
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Topic bus envelope
// ─────────────────────────────────────────────────────────────────────────────

/// Unified event wrapper for the in-process topic bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// `"<robot>/<topic>"`
    pub source: String,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// A command value that must be republished on a robot topic.
    TopicUpdate {
        robot: String,
        topic: String,
        value: Value,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Global error type spanning payload decoding, collaborator failures and
/// transport problems.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FirosError {
    #[error("Payload Decode Error: {0}")]
    Decode(String),

    #[error("Parsing Error: {0}")]
    Parsing(String),

    #[error("Registry Error: {0}")]
    Registry(String),

    #[error("Upstream Error: {0}")]
    Upstream(String),

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("I/O Error: {0}")]
    Io(String),
}

impl FirosError {
    /// Short machine-friendly name of the variant, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            FirosError::Decode(_) => "decode",
            FirosError::Parsing(_) => "parsing",
            FirosError::Registry(_) => "registry",
            FirosError::Upstream(_) => "upstream",
            FirosError::Channel(_) => "channel",
            FirosError::Io(_) => "io",
        }
    }
}

impl From<serde_json::Error> for FirosError {
    fn from(e: serde_json::Error) -> Self {
        FirosError::Parsing(e.to_string())
    }
}

impl From<std::io::Error> for FirosError {
    fn from(e: std::io::Error) -> Self {
        FirosError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn topic_parses_named_and_structured_shapes() {
        let named: Topic = serde_json::from_value(json!({
            "name": "speed", "msg": "std_msgs/Float32", "type": "subscriber"
        }))
        .unwrap();
        assert_eq!(named.direction, TopicDirection::Subscriber);
        assert_eq!(named.shape, MessageShape::Named("std_msgs/Float32".into()));

        let custom: Topic = serde_json::from_value(json!({
            "name": "pose", "msg": {"x": "float64", "y": "float64"}, "type": "publisher"
        }))
        .unwrap();
        assert_eq!(custom.direction, TopicDirection::Publisher);
        assert!(matches!(custom.shape, MessageShape::Structured(ref m) if m.len() == 2));
    }

    #[test]
    fn notification_parses_broker_payload() {
        let raw = json!({
            "subscriptionId": "51c0ac9ed714fb3b37d7d5a8",
            "originator": "localhost",
            "contextResponses": [{
                "contextElement": {
                    "id": "r1",
                    "type": "ROBOT",
                    "isPattern": "false",
                    "attributes": [
                        {"name": "COMMAND", "type": "COMMAND", "value": ["speed"]},
                        {"name": "speed", "type": "std_msgs.msg.Float32", "value": "{'data': 1.5, 'updateStamp': 't1'}"}
                    ]
                },
                "statusCode": {"code": "200", "reasonPhrase": "OK"}
            }]
        });
        let notification: ContextNotification = serde_json::from_value(raw).unwrap();
        let responses: Vec<_> = notification.ok_responses().collect::<Result<_, _>>().unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].context_element.id, "r1");
        assert_eq!(responses[0].context_element.attributes.len(), 2);
    }

    #[test]
    fn status_code_must_be_the_string_200() {
        let notification: ContextNotification = serde_json::from_value(json!({
            "contextResponses": [
                {"contextElement": {"id": "numeric"}, "statusCode": {"code": 200}},
                {"contextElement": {"id": "missing"}, "statusCode": {"code": "404"}},
                {"contextElement": {"id": "r1"}, "statusCode": {"code": "200"}}
            ]
        }))
        .unwrap();
        let ids: Vec<String> = notification
            .ok_responses()
            .map(|r| r.unwrap().context_element.id)
            .collect();
        assert_eq!(ids, vec!["r1".to_string()]);
    }

    #[test]
    fn non_ok_entries_are_not_decoded() {
        let notification: ContextNotification = serde_json::from_value(json!({
            "contextResponses": [
                {"contextElement": {"id": "r1"}, "statusCode": {"code": "200"}},
                {"contextElement": {"type": "ROBOT"}, "statusCode": {"code": "404"}},
                {"statusCode": {"code": "500"}}
            ]
        }))
        .unwrap();
        let responses: Vec<_> = notification.ok_responses().collect();
        assert_eq!(responses.len(), 1);
        assert!(responses[0].is_ok());
    }

    #[test]
    fn malformed_ok_entry_is_a_decode_error() {
        let notification: ContextNotification = serde_json::from_value(json!({
            "contextResponses": [{"contextElement": {"type": "ROBOT"}, "statusCode": {"code": "200"}}]
        }))
        .unwrap();
        let err = notification.ok_responses().next().unwrap().unwrap_err();
        assert_eq!(err.kind(), "decode");
    }

    #[test]
    fn stamps_compare_by_value() {
        let number = |raw: &str| UpdateStamp::Number(serde_json::from_str(raw).unwrap());
        assert_eq!(number("1"), number("1.0"));
        assert_ne!(number("1"), number("2"));
        assert_ne!(number("1"), UpdateStamp::from("1"));
        assert_eq!(UpdateStamp::from("t1"), UpdateStamp::from("t1"));
        assert_eq!(number("18446744073709551615"), number("18446744073709551615"));
        assert_ne!(number("-1"), number("18446744073709551615"));
    }

    #[test]
    fn take_command_removes_the_attribute() {
        let mut element = ContextElement {
            id: "r1".into(),
            entity_type: None,
            is_pattern: None,
            attributes: vec![
                Attribute { name: "speed".into(), attr_type: None, value: json!("x") },
                Attribute { name: COMMAND_ATTRIBUTE.into(), attr_type: None, value: json!(["speed"]) },
            ],
        };
        assert_eq!(element.take_command(), Some(json!(["speed"])));
        assert_eq!(element.attributes.len(), 1);
        assert_eq!(element.take_command(), None);
    }

    #[test]
    fn firos_error_display_and_kind() {
        let err = FirosError::Upstream("connection refused".into());
        assert!(err.to_string().contains("connection refused"));
        assert_eq!(err.kind(), "upstream");

        let parse: FirosError = serde_json::from_str::<Value>("{").unwrap_err().into();
        assert_eq!(parse.kind(), "parsing");
    }
}
