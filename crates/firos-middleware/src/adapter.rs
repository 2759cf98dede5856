//! Collaborator seams of the gateway.
//!
//! The request handlers only ever see these traits. Production wiring plugs
//! in the implementations from this crate; tests plug in in-memory fakes.

use async_trait::async_trait;
use firos_types::{DecodedValue, FirosError, Robot};
use serde_json::Value;

/// Source of truth for the robots the gateway knows about.
pub trait RobotRegistry: Send + Sync {
    /// Every known robot with its ordered topics.
    fn robots(&self) -> Result<Vec<Robot>, FirosError>;

    /// Structured description of an instance of the named message type.
    fn describe_schema(&self, message_type: &str) -> Result<Value, FirosError>;
}

/// Destination of accepted command values (the robot topic space).
///
/// Publishing is fire-and-forget: callers log a returned error and move on.
#[async_trait]
pub trait PublishSink: Send + Sync {
    async fn publish(&self, robot: &str, topic: &str, value: &DecodedValue)
    -> Result<(), FirosError>;
}

/// Read access to the state stored in the context broker.
#[async_trait]
pub trait QuerySink: Send + Sync {
    /// Look up one entity. The returned JSON may be an `errorCode` envelope
    /// instead of data; that is not an `Err`.
    async fn find_by_id(
        &self,
        id: &str,
        entity_type: &str,
        full_representation: bool,
    ) -> Result<Value, FirosError>;
}

/// Turns a raw attribute value into a payload carrying an update stamp.
pub trait ValueCodec: Send + Sync {
    fn parse(&self, raw: &Value) -> Result<DecodedValue, FirosError>;
}
