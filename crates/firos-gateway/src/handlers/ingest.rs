//! [`NotificationIngest`] – broker notification ingestion.
//!
//! Processing runs Parse → Extract commands → Filter + dedup → Publish, and
//! always ends with the acknowledgment. A failure anywhere stops the
//! remaining work for that notification, is recorded in the
//! [`IngestReport`] and logged, and the broker still receives
//! `200 Received by firos` so it never retries.
//!
//! Updates already forwarded before a failure stay forwarded; there is no
//! transaction across attributes or robots.

use std::collections::HashSet;
use std::sync::Arc;

use firos_middleware::{PublishSink, ValueCodec, parse_quoted_json};
use firos_types::{ContextElement, ContextNotification, FirosError};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::dedup::UpdateDedupCache;
use crate::http::{HttpRequest, HttpResponse};
use crate::payload::{self, Payload};
use crate::response;

/// What happened to one notification.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct IngestReport {
    /// Context elements with status `"200"` that were processed.
    pub elements: usize,
    /// Updates handed to the publish sink.
    pub forwarded: usize,
    /// Updates suppressed because their stamp was already seen.
    pub duplicates: usize,
    /// Attributes skipped because they are not in the robot's command list.
    pub not_commands: usize,
    /// Failure that cut processing short.
    pub error: Option<FirosError>,
}

pub struct NotificationIngest {
    codec: Arc<dyn ValueCodec>,
    sink: Arc<dyn PublishSink>,
    dedup: Arc<UpdateDedupCache>,
}

impl NotificationIngest {
    pub fn new(
        codec: Arc<dyn ValueCodec>,
        sink: Arc<dyn PublishSink>,
        dedup: Arc<UpdateDedupCache>,
    ) -> Self {
        Self { codec, sink, dedup }
    }

    /// Process the notification and acknowledge it, whatever the outcome.
    pub async fn handle(&self, request: &HttpRequest) -> HttpResponse {
        let report = self.ingest(request).await;
        match &report.error {
            Some(err) => warn!(
                kind = err.kind(),
                error = %err,
                forwarded = report.forwarded,
                "notification processing failed"
            ),
            None => info!(
                elements = report.elements,
                forwarded = report.forwarded,
                duplicates = report.duplicates,
                "notification processed"
            ),
        }
        response::acknowledgment()
    }

    /// Process the notification without building a response.
    pub async fn ingest(&self, request: &HttpRequest) -> IngestReport {
        let mut report = IngestReport::default();
        if let Err(err) = self.process(request, &mut report).await {
            report.error = Some(err);
        }
        report
    }

    async fn process(
        &self,
        request: &HttpRequest,
        report: &mut IngestReport,
    ) -> Result<(), FirosError> {
        let Payload::Json(body) = payload::decode(request.content_type(), &request.body)? else {
            return Err(FirosError::Decode("notification body is not JSON".into()));
        };
        let notification: ContextNotification = serde_json::from_value(body)
            .map_err(|e| FirosError::Decode(format!("malformed notification: {e}")))?;

        for context in notification.ok_responses() {
            let context = context?;
            report.elements += 1;
            self.process_element(context.context_element, report).await?;
        }
        Ok(())
    }

    async fn process_element(
        &self,
        mut element: ContextElement,
        report: &mut IngestReport,
    ) -> Result<(), FirosError> {
        let Some(command) = element.take_command() else {
            debug!(robot = %element.id, "no COMMAND attribute, nothing is forwarded");
            return Ok(());
        };
        let commands = command_names(&command)?;

        for attribute in &element.attributes {
            if !commands.contains(&attribute.name) {
                report.not_commands += 1;
                continue;
            }

            let value = self.codec.parse(&attribute.value)?;
            if !self.dedup.should_forward(&element.id, &attribute.name, &value.stamp) {
                debug!(robot = %element.id, attribute = %attribute.name, stamp = %value.stamp, "duplicate update");
                report.duplicates += 1;
                continue;
            }

            if let Err(err) = self.sink.publish(&element.id, &attribute.name, &value).await {
                warn!(robot = %element.id, attribute = %attribute.name, error = %err, "publish failed");
            }
            report.forwarded += 1;
        }
        Ok(())
    }
}

/// Attribute names listed by a `COMMAND` value: either a JSON array of
/// strings or a quoted-JSON string encoding one.
fn command_names(value: &Value) -> Result<HashSet<String>, FirosError> {
    let list = match value {
        Value::String(text) => parse_quoted_json(text)?,
        other => other.clone(),
    };
    let Value::Array(items) = list else {
        return Err(FirosError::Parsing(format!("COMMAND must list attribute names, got {value}")));
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(name) => Ok(name),
            other => Err(FirosError::Parsing(format!("COMMAND entry {other} is not a name"))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;
    use crate::testing::RecordingSink;
    use firos_middleware::QuotedJsonCodec;
    use firos_types::UpdateStamp;
    use serde_json::json;

    fn make_ingest() -> (Arc<RecordingSink>, Arc<UpdateDedupCache>, NotificationIngest) {
        let sink = Arc::new(RecordingSink::default());
        let dedup = Arc::new(UpdateDedupCache::new());
        let ingest = NotificationIngest::new(
            Arc::new(QuotedJsonCodec),
            Arc::clone(&sink) as Arc<dyn PublishSink>,
            Arc::clone(&dedup),
        );
        (sink, dedup, ingest)
    }

    fn post(body: &Value) -> HttpRequest {
        HttpRequest::new(Method::Post, "/firos/")
            .with_header("Content-Type", "application/json")
            .with_body(body.to_string())
    }

    fn element(robot: &str, attributes: Value) -> Value {
        json!({
            "contextElement": {"id": robot, "type": "ROBOT", "isPattern": "false", "attributes": attributes},
            "statusCode": {"code": "200", "reasonPhrase": "OK"}
        })
    }

    fn speed_notification(stamp: &str) -> Value {
        json!({"contextResponses": [element("r1", json!([
            {"name": "COMMAND", "type": "COMMAND", "value": ["speed"]},
            {"name": "speed", "type": "std_msgs.msg.Float32", "value": format!("{{'data': 1.5, 'updateStamp': '{stamp}'}}")}
        ]))]})
    }

    #[tokio::test]
    async fn forwards_new_command_value_and_acknowledges() {
        let (sink, _, ingest) = make_ingest();

        let response = ingest.handle(&post(&speed_notification("t1"))).await;

        assert_eq!(response.status, 200);
        assert_eq!(response.content_type(), Some("text/plain"));
        assert_eq!(response.body, b"Received by firos");
        assert!(response.header("Access-Control-Allow-Origin").is_none());
        assert_eq!(
            sink.calls(),
            vec![("r1".into(), "speed".into(), json!({"data": 1.5, "updateStamp": "t1"}))]
        );
    }

    #[tokio::test]
    async fn identical_stamp_is_published_once() {
        let (sink, _, ingest) = make_ingest();

        let first = ingest.ingest(&post(&speed_notification("t1"))).await;
        let second = ingest.ingest(&post(&speed_notification("t1"))).await;

        assert_eq!(first.forwarded, 1);
        assert_eq!(second.forwarded, 0);
        assert_eq!(second.duplicates, 1);
        assert_eq!(sink.calls().len(), 1);
    }

    #[tokio::test]
    async fn new_stamps_are_published_in_order() {
        let (sink, dedup, ingest) = make_ingest();

        ingest.ingest(&post(&speed_notification("t1"))).await;
        ingest.ingest(&post(&speed_notification("t2"))).await;

        let stamps: Vec<Value> = sink.calls().into_iter().map(|(_, _, v)| v["updateStamp"].clone()).collect();
        assert_eq!(stamps, vec![json!("t1"), json!("t2")]);
        assert_eq!(dedup.last_stamp("r1", "speed"), Some(UpdateStamp::from("t2")));
    }

    #[tokio::test]
    async fn attributes_outside_command_list_are_never_forwarded() {
        let (sink, _, ingest) = make_ingest();
        let body = json!({"contextResponses": [element("r1", json!([
            {"name": "COMMAND", "value": ["speed"]},
            {"name": "heading", "value": "{'data': 3, 'updateStamp': 'h1'}"},
            {"name": "speed", "value": "{'data': 1, 'updateStamp': 's1'}"}
        ]))]});

        let report = ingest.ingest(&post(&body)).await;

        assert_eq!(report.forwarded, 1);
        assert_eq!(report.not_commands, 1);
        assert_eq!(sink.calls()[0].1, "speed");
    }

    #[tokio::test]
    async fn element_without_command_forwards_nothing() {
        let (sink, dedup, ingest) = make_ingest();
        let body = json!({"contextResponses": [element("r1", json!([
            {"name": "speed", "value": "{'data': 1, 'updateStamp': 's1'}"}
        ]))]});

        let report = ingest.ingest(&post(&body)).await;

        assert_eq!(report.elements, 1);
        assert_eq!(report.error, None);
        assert!(sink.calls().is_empty());
        assert!(dedup.is_empty());
    }

    #[tokio::test]
    async fn non_200_elements_are_skipped() {
        let (sink, _, ingest) = make_ingest();
        let mut body = speed_notification("t1");
        body["contextResponses"][0]["statusCode"]["code"] = json!("500");

        let report = ingest.ingest(&post(&body)).await;

        assert_eq!(report.elements, 0);
        assert!(sink.calls().is_empty());
    }

    #[tokio::test]
    async fn malformed_non_200_sibling_does_not_block_valid_element() {
        let (sink, _, ingest) = make_ingest();
        let mut body = speed_notification("t1");
        body["contextResponses"]
            .as_array_mut()
            .unwrap()
            .push(json!({"contextElement": {"type": "ROBOT"}, "statusCode": {"code": "404"}}));

        let report = ingest.ingest(&post(&body)).await;

        assert_eq!(report.error, None);
        assert_eq!(report.elements, 1);
        assert_eq!(report.forwarded, 1);
        assert_eq!(
            sink.calls(),
            vec![("r1".into(), "speed".into(), json!({"data": 1.5, "updateStamp": "t1"}))]
        );
    }

    #[tokio::test]
    async fn string_stamp_after_equal_looking_number_is_new() {
        let (sink, _, ingest) = make_ingest();
        let with_stamp = |stamp: Value| {
            json!({"contextResponses": [element("r1", json!([
                {"name": "COMMAND", "value": ["speed"]},
                {"name": "speed", "value": {"data": 1, "updateStamp": stamp}}
            ]))]})
        };

        ingest.ingest(&post(&with_stamp(json!(1)))).await;
        ingest.ingest(&post(&with_stamp(json!("1")))).await;
        let repeat = ingest.ingest(&post(&with_stamp(json!("1")))).await;

        assert_eq!(sink.calls().len(), 2);
        assert_eq!(repeat.duplicates, 1);
    }

    #[tokio::test]
    async fn command_list_may_be_quoted_string() {
        let (sink, _, ingest) = make_ingest();
        let body = json!({"contextResponses": [element("r1", json!([
            {"name": "COMMAND", "value": "['speed']"},
            {"name": "speed", "value": {"data": 2, "updateStamp": 7}}
        ]))]});

        let report = ingest.ingest(&post(&body)).await;

        assert_eq!(report.forwarded, 1);
        assert_eq!(sink.calls()[0].2["updateStamp"], json!(7));
    }

    #[tokio::test]
    async fn missing_context_responses_still_acknowledges() {
        let (sink, _, ingest) = make_ingest();
        let request = post(&json!({"subscriptionId": "abc"}));

        let report = ingest.ingest(&request).await;
        assert!(matches!(report.error, Some(FirosError::Decode(_))));

        let response = ingest.handle(&request).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"Received by firos");
        assert!(sink.calls().is_empty());
    }

    #[tokio::test]
    async fn non_json_body_still_acknowledges() {
        let (_, _, ingest) = make_ingest();
        let request = HttpRequest::new(Method::Post, "/firos/").with_body("not json");

        let report = ingest.ingest(&request).await;
        assert!(report.error.is_some());
        assert_eq!(ingest.handle(&request).await.status, 200);
    }

    #[tokio::test]
    async fn failure_midway_keeps_earlier_updates() {
        let (sink, _, ingest) = make_ingest();
        let body = json!({"contextResponses": [element("r1", json!([
            {"name": "COMMAND", "value": ["a", "b", "c"]},
            {"name": "a", "value": "{'data': 1, 'updateStamp': 's1'}"},
            {"name": "b", "value": "{'data': 'no stamp'}"},
            {"name": "c", "value": "{'data': 3, 'updateStamp': 's1'}"}
        ]))]});

        let report = ingest.ingest(&post(&body)).await;

        assert_eq!(report.forwarded, 1);
        assert!(matches!(report.error, Some(FirosError::Parsing(_))));
        assert_eq!(sink.calls().len(), 1);
    }

    #[tokio::test]
    async fn publish_failure_does_not_replay_the_stamp() {
        let sink = Arc::new(RecordingSink::failing());
        let ingest = NotificationIngest::new(
            Arc::new(QuotedJsonCodec),
            Arc::clone(&sink) as Arc<dyn PublishSink>,
            Arc::new(UpdateDedupCache::new()),
        );

        let first = ingest.ingest(&post(&speed_notification("t1"))).await;
        let second = ingest.ingest(&post(&speed_notification("t1"))).await;

        assert_eq!(first.error, None);
        assert_eq!(first.forwarded, 1);
        assert_eq!(second.duplicates, 1);
        assert_eq!(sink.calls().len(), 1);
    }

    #[test]
    fn command_names_rejects_non_lists() {
        assert!(command_names(&json!({"speed": true})).is_err());
        assert!(command_names(&json!([1, 2])).is_err());
        let names = command_names(&json!(["a", "b"])).unwrap();
        assert!(names.contains("a") && names.contains("b"));
    }
}
