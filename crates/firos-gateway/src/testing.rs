//! In-memory collaborators shared by the unit tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use firos_middleware::{PublishSink, QuerySink};
use firos_types::{DecodedValue, FirosError};
use parking_lot::Mutex;
use serde_json::Value;

/// Records every publish call in order.
#[derive(Default)]
pub struct RecordingSink {
    pub published: Mutex<Vec<(String, String, Value)>>,
    pub fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            published: Mutex::default(),
            fail: true,
        }
    }

    pub fn calls(&self) -> Vec<(String, String, Value)> {
        self.published.lock().clone()
    }
}

#[async_trait]
impl PublishSink for RecordingSink {
    async fn publish(
        &self,
        robot: &str,
        topic: &str,
        value: &DecodedValue,
    ) -> Result<(), FirosError> {
        self.published
            .lock()
            .push((robot.to_string(), topic.to_string(), value.to_value()));
        if self.fail {
            return Err(FirosError::Channel("sink offline".into()));
        }
        Ok(())
    }
}

/// Replays canned query replies and records the queries it received.
#[derive(Default)]
pub struct CannedQuery {
    pub replies: Mutex<VecDeque<Result<Value, FirosError>>>,
    pub queries: Mutex<Vec<(String, String, bool)>>,
}

impl CannedQuery {
    pub fn replying(reply: Result<Value, FirosError>) -> Self {
        let query = Self::default();
        query.replies.lock().push_back(reply);
        query
    }
}

#[async_trait]
impl QuerySink for CannedQuery {
    async fn find_by_id(
        &self,
        id: &str,
        entity_type: &str,
        full_representation: bool,
    ) -> Result<Value, FirosError> {
        self.queries
            .lock()
            .push((id.to_string(), entity_type.to_string(), full_representation));
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(FirosError::Upstream("no canned reply".into())))
    }
}
