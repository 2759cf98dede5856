//! [`RobotCatalog`] – discovery listing of every robot and its topics.

use std::sync::Arc;

use firos_middleware::RobotRegistry;
use firos_types::{FirosError, MessageShape, Topic};
use serde::Serialize;
use serde_json::Value;

use crate::http::HttpResponse;
use crate::response;

/// Type name reported for topics declared with an inline structure.
pub const CUSTOM_TYPE: &str = "Custom";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobotDescriptor {
    pub name: String,
    pub topics: Vec<TopicDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicDescriptor {
    pub name: String,
    /// `"publisher"` or `"subscriber"`.
    pub pubsub: &'static str,
    #[serde(rename = "type")]
    pub type_name: String,
    pub structure: Value,
}

pub struct RobotCatalog {
    registry: Arc<dyn RobotRegistry>,
}

impl RobotCatalog {
    pub fn new(registry: Arc<dyn RobotRegistry>) -> Self {
        Self { registry }
    }

    pub fn handle(&self) -> HttpResponse {
        match self.describe() {
            Ok(robots) => response::json(200, &robots),
            Err(err) => response::internal_error(&err),
        }
    }

    /// Describe every robot. Any registry failure fails the whole catalog.
    pub fn describe(&self) -> Result<Vec<RobotDescriptor>, FirosError> {
        self.registry
            .robots()?
            .into_iter()
            .map(|robot| -> Result<RobotDescriptor, FirosError> {
                let topics = robot
                    .topics
                    .iter()
                    .map(|topic| self.describe_topic(topic))
                    .collect::<Result<_, _>>()?;
                Ok(RobotDescriptor {
                    name: robot.id,
                    topics,
                })
            })
            .collect()
    }

    fn describe_topic(&self, topic: &Topic) -> Result<TopicDescriptor, FirosError> {
        let (type_name, structure) = match &topic.shape {
            MessageShape::Structured(fields) => {
                (CUSTOM_TYPE.to_string(), Value::Object(fields.clone()))
            }
            MessageShape::Named(name) => (name.clone(), self.registry.describe_schema(name)?),
        };
        Ok(TopicDescriptor {
            name: topic.name.clone(),
            pubsub: topic.direction.as_str(),
            type_name,
            structure,
        })
    }
}
