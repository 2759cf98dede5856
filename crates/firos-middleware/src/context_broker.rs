//! [`ContextBrokerClient`] – NGSIv1 query sink.
//!
//! Looks entities up with a `queryContext` request:
//!
//! ```text
//! POST {base}/v1/queryContext
//! {"entities": [{"type": "ROBOT", "isPattern": "false", "id": "turtle1"}]}
//! ```
//!
//! The broker answers either with `{"contextResponses": [...]}` or with an
//! `{"errorCode": {"code": "404", ...}}` envelope. Both are returned to the
//! caller untouched.

use async_trait::async_trait;
use firos_types::{COMMAND_ATTRIBUTE, FirosError};
use serde_json::{Value, json};
use tracing::debug;

use crate::adapter::QuerySink;

/// An async client for a context broker's NGSIv1 endpoint.
///
/// Construct once and share; the inner [`reqwest::Client`] pools connections.
#[derive(Debug, Clone)]
pub struct ContextBrokerClient {
    base_url: String,
    client: reqwest::Client,
}

impl ContextBrokerClient {
    /// Create a client for the broker at `base_url`
    /// (e.g. `"http://localhost:1026"`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn query_url(&self) -> String {
        format!("{}/v1/queryContext", self.base_url)
    }
}

/// Body of a `queryContext` request for one entity.
///
/// A partial representation only asks for the `COMMAND` attribute.
pub fn query_body(id: &str, entity_type: &str, full_representation: bool) -> Value {
    let mut body = json!({
        "entities": [{ "type": entity_type, "isPattern": "false", "id": id }]
    });
    if !full_representation {
        body["attributes"] = json!([COMMAND_ATTRIBUTE]);
    }
    body
}

#[async_trait]
impl QuerySink for ContextBrokerClient {
    async fn find_by_id(
        &self,
        id: &str,
        entity_type: &str,
        full_representation: bool,
    ) -> Result<Value, FirosError> {
        let url = self.query_url();
        debug!(%url, id, entity_type, "querying context broker");

        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .json(&query_body(id, entity_type, full_representation))
            .send()
            .await
            .map_err(|e| FirosError::Upstream(format!("queryContext to {url} failed: {e}")))?;

        response
            .json::<Value>()
            .await
            .map_err(|e| FirosError::Upstream(format!("queryContext reply is not JSON: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_url_strips_trailing_slash() {
        let client = ContextBrokerClient::new("http://broker:1026/");
        assert_eq!(client.query_url(), "http://broker:1026/v1/queryContext");
    }

    #[test]
    fn full_query_has_no_attribute_filter() {
        let body = query_body("turtle1", "ROBOT", true);
        assert_eq!(
            body,
            json!({"entities": [{"type": "ROBOT", "isPattern": "false", "id": "turtle1"}]})
        );
    }

    #[test]
    fn partial_query_only_requests_commands() {
        let body = query_body("turtle1", "ROBOT", false);
        assert_eq!(body["attributes"], json!(["COMMAND"]));
    }

    #[tokio::test]
    async fn unreachable_broker_is_an_upstream_error() {
        // Port 9 (discard) on loopback is closed in test environments.
        let client = ContextBrokerClient::new("http://127.0.0.1:9");
        let err = client.find_by_id("turtle1", "ROBOT", true).await.unwrap_err();
        assert_eq!(err.kind(), "upstream");
    }
}
