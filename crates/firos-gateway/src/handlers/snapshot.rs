//! [`RobotSnapshot`] – current broker state of one robot.
//!
//! The broker is asked for the full `ROBOT` entity. An `errorCode` envelope
//! is relayed as-is with its code as the HTTP status. Otherwise each context
//! element is emitted with its attribute values re-parsed from the broker's
//! single-quoted encoding (`COMMAND` excepted) and its `isPattern` marker
//! removed.
//!
//! Re-parsing swaps every `'` for `"`, so a value whose string content
//! contains an apostrophe fails to parse and the snapshot fails. That is the
//! broker-side encoding showing through, not something corrected here.

use std::sync::Arc;

use firos_middleware::{QuerySink, parse_quoted_json};
use firos_types::{COMMAND_ATTRIBUTE, FirosError, ROBOT_ENTITY_TYPE};
use serde_json::{Map, Value};

use crate::http::HttpResponse;
use crate::response;

#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotOutcome {
    /// The broker answered with an error envelope.
    Relayed { status: u16, envelope: Value },
    /// Normalised context elements.
    Elements(Vec<Value>),
}

pub struct RobotSnapshot {
    query: Arc<dyn QuerySink>,
}

impl RobotSnapshot {
    pub fn new(query: Arc<dyn QuerySink>) -> Self {
        Self { query }
    }

    pub async fn handle(&self, robot_id: &str) -> HttpResponse {
        match self.snapshot(robot_id).await {
            Ok(SnapshotOutcome::Relayed { status, envelope }) => response::json(status, &envelope),
            Ok(SnapshotOutcome::Elements(elements)) => response::json(200, &elements),
            Err(err) => response::internal_error(&err),
        }
    }

    pub async fn snapshot(&self, robot_id: &str) -> Result<SnapshotOutcome, FirosError> {
        let data = self.query.find_by_id(robot_id, ROBOT_ENTITY_TYPE, true).await?;

        if let Some(error_code) = data.get("errorCode") {
            let status = relay_status(error_code)?;
            return Ok(SnapshotOutcome::Relayed { status, envelope: data });
        }

        let responses = data
            .get("contextResponses")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                FirosError::Upstream("broker reply has neither errorCode nor contextResponses".into())
            })?;

        responses
            .iter()
            .map(|context| {
                let mut element = context
                    .get("contextElement")
                    .and_then(Value::as_object)
                    .cloned()
                    .ok_or_else(|| {
                        FirosError::Upstream("context response without contextElement".into())
                    })?;
                normalize_element(&mut element)?;
                Ok(Value::Object(element))
            })
            .collect::<Result<Vec<_>, FirosError>>()
            .map(SnapshotOutcome::Elements)
    }
}

/// Re-parse attribute values and drop `isPattern`.
///
/// Only string values are re-parsed; values the broker already returned as
/// structures are left alone.
pub fn normalize_element(element: &mut Map<String, Value>) -> Result<(), FirosError> {
    if let Some(Value::Array(attributes)) = element.get_mut("attributes") {
        for attribute in attributes.iter_mut().filter_map(Value::as_object_mut) {
            if attribute.get("name").and_then(Value::as_str) == Some(COMMAND_ATTRIBUTE) {
                continue;
            }
            if let Some(Value::String(raw)) = attribute.get("value") {
                let parsed = parse_quoted_json(raw)?;
                attribute.insert("value".to_string(), parsed);
            }
        }
    }
    element.remove("isPattern");
    Ok(())
}

/// HTTP status carried by an `errorCode` envelope (`code` as string or
/// number).
fn relay_status(error_code: &Value) -> Result<u16, FirosError> {
    let code = error_code.get("code");
    let status = match code {
        Some(Value::String(s)) => s.trim().parse::<u16>().ok(),
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        _ => None,
    };
    status
        .filter(|s| (100..=599).contains(s))
        .ok_or_else(|| FirosError::Upstream(format!("invalid broker error code {error_code}")))
}
