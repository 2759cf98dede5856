//! [`StaticRegistry`] – robots and message schemas known at startup.
//!
//! Robots are read from a JSON robots file. Two spellings of a robot's topic
//! table are accepted:
//!
//! ```json
//! {
//!   "turtle1": { "topics": [ { "name": "cmd_vel", "msg": "geometry_msgs.msg.Twist", "type": "subscriber" } ] },
//!   "turtle2": { "topics": { "pose": { "msg": { "x": "float64" }, "type": "publisher" } } }
//! }
//! ```
//!
//! The list form keeps its order; the map form is ordered by topic name.
//! Robots are always listed in identifier order.
//!
//! Message type names are normalised before schema lookup, so
//! `geometry_msgs.msg.Twist`, `geometry_msgs/msg/Twist` and
//! `geometry_msgs/Twist` all resolve to the same descriptor.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use firos_types::{FirosError, MessageShape, Robot, Topic, TopicDirection};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::adapter::RobotRegistry;

#[derive(Deserialize)]
struct RobotEntry {
    topics: TopicTable,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TopicTable {
    List(Vec<Topic>),
    Map(BTreeMap<String, TopicSpec>),
}

#[derive(Deserialize)]
struct TopicSpec {
    msg: MessageShape,
    #[serde(rename = "type")]
    direction: TopicDirection,
}

impl TopicTable {
    fn into_topics(self) -> Vec<Topic> {
        match self {
            TopicTable::List(topics) => topics,
            TopicTable::Map(map) => map
                .into_iter()
                .map(|(name, spec)| Topic {
                    name,
                    direction: spec.direction,
                    shape: spec.msg,
                })
                .collect(),
        }
    }
}

/// Registry backed by an in-memory robot table and schema table.
#[derive(Debug, Clone)]
pub struct StaticRegistry {
    robots: BTreeMap<String, Vec<Topic>>,
    schemas: HashMap<String, Value>,
}

impl Default for StaticRegistry {
    fn default() -> Self {
        Self {
            robots: BTreeMap::new(),
            schemas: builtin_schemas(),
        }
    }
}

impl StaticRegistry {
    /// An empty registry that only knows the built-in message schemas.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a robots file body.
    pub fn from_json_str(raw: &str) -> Result<Self, FirosError> {
        let entries: BTreeMap<String, RobotEntry> = serde_json::from_str(raw)
            .map_err(|e| FirosError::Registry(format!("invalid robots file: {e}")))?;
        let mut registry = Self::new();
        for (id, entry) in entries {
            registry.robots.insert(id, entry.topics.into_topics());
        }
        Ok(registry)
    }

    /// Load the robots file at `path`.
    pub fn load(path: &Path) -> Result<Self, FirosError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            FirosError::Registry(format!("failed to read robots file {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    /// Register (or replace) the descriptor for a message type (builder-style).
    pub fn with_schema(mut self, message_type: &str, descriptor: Value) -> Self {
        self.schemas.insert(normalize_type_name(message_type), descriptor);
        self
    }

    /// Merge a JSON object mapping message type names to descriptors.
    pub fn extend_schemas_from_json(&mut self, raw: &str) -> Result<(), FirosError> {
        let table: HashMap<String, Value> = serde_json::from_str(raw)
            .map_err(|e| FirosError::Registry(format!("invalid schema table: {e}")))?;
        for (name, descriptor) in table {
            self.schemas.insert(normalize_type_name(&name), descriptor);
        }
        Ok(())
    }
}

impl RobotRegistry for StaticRegistry {
    fn robots(&self) -> Result<Vec<Robot>, FirosError> {
        Ok(self
            .robots
            .iter()
            .map(|(id, topics)| Robot {
                id: id.clone(),
                topics: topics.clone(),
            })
            .collect())
    }

    fn describe_schema(&self, message_type: &str) -> Result<Value, FirosError> {
        self.schemas
            .get(&normalize_type_name(message_type))
            .cloned()
            .ok_or_else(|| {
                FirosError::Registry(format!("no schema registered for message type '{message_type}'"))
            })
    }
}

/// `pkg.msg.Type` / `pkg/msg/Type` / `pkg/Type` → `pkg/Type`.
pub fn normalize_type_name(name: &str) -> String {
    let mut parts: Vec<&str> = name.split(['.', '/']).filter(|p| !p.is_empty()).collect();
    if parts.len() == 3 && parts[1] == "msg" {
        parts.remove(1);
    }
    parts.join("/")
}

fn builtin_schemas() -> HashMap<String, Value> {
    let vector3 = json!({"x": "float64", "y": "float64", "z": "float64"});
    let quaternion = json!({"x": "float64", "y": "float64", "z": "float64", "w": "float64"});

    let mut schemas = HashMap::new();
    for (name, data_type) in [
        ("String", "string"),
        ("Bool", "bool"),
        ("Int8", "int8"),
        ("Int16", "int16"),
        ("Int32", "int32"),
        ("Int64", "int64"),
        ("UInt8", "uint8"),
        ("UInt16", "uint16"),
        ("UInt32", "uint32"),
        ("UInt64", "uint64"),
        ("Float32", "float32"),
        ("Float64", "float64"),
    ] {
        schemas.insert(format!("std_msgs/{name}"), json!({ "data": data_type }));
    }
    schemas.insert("geometry_msgs/Vector3".into(), vector3.clone());
    schemas.insert("geometry_msgs/Point".into(), vector3.clone());
    schemas.insert("geometry_msgs/Quaternion".into(), quaternion.clone());
    schemas.insert(
        "geometry_msgs/Twist".into(),
        json!({"linear": vector3.clone(), "angular": vector3}),
    );
    schemas.insert(
        "geometry_msgs/Pose".into(),
        json!({
            "position": {"x": "float64", "y": "float64", "z": "float64"},
            "orientation": quaternion
        }),
    );
    schemas
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROBOTS: &str = r#"{
        "turtle2": { "topics": { "pose": { "msg": { "x": "float64" }, "type": "publisher" },
                                 "cmd_vel": { "msg": "geometry_msgs.msg.Twist", "type": "subscriber" } } },
        "turtle1": { "topics": [
            { "name": "speed", "msg": "std_msgs/Float32", "type": "subscriber" },
            { "name": "odom", "msg": "geometry_msgs/msg/Pose", "type": "publisher" }
        ] }
    }"#;

    #[test]
    fn robots_are_listed_in_identifier_order() {
        let registry = StaticRegistry::from_json_str(ROBOTS).unwrap();
        let robots = registry.robots().unwrap();
        let ids: Vec<&str> = robots.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["turtle1", "turtle2"]);
    }

    #[test]
    fn list_form_keeps_topic_order_and_map_form_sorts() {
        let registry = StaticRegistry::from_json_str(ROBOTS).unwrap();
        let robots = registry.robots().unwrap();
        let names = |i: usize| -> Vec<String> {
            robots[i].topics.iter().map(|t| t.name.clone()).collect()
        };
        assert_eq!(names(0), ["speed", "odom"]);
        assert_eq!(names(1), ["cmd_vel", "pose"]);
        assert!(matches!(robots[1].topics[1].shape, MessageShape::Structured(_)));
    }

    #[test]
    fn type_names_are_normalised() {
        assert_eq!(normalize_type_name("geometry_msgs.msg.Twist"), "geometry_msgs/Twist");
        assert_eq!(normalize_type_name("geometry_msgs/msg/Twist"), "geometry_msgs/Twist");
        assert_eq!(normalize_type_name("std_msgs/String"), "std_msgs/String");
    }

    #[test]
    fn describe_schema_resolves_builtins() {
        let registry = StaticRegistry::new();
        let twist = registry.describe_schema("geometry_msgs.msg.Twist").unwrap();
        assert_eq!(twist["linear"]["x"], "float64");
        let float = registry.describe_schema("std_msgs/Float32").unwrap();
        assert_eq!(float, json!({"data": "float32"}));
    }

    #[test]
    fn unknown_schema_is_a_registry_error() {
        let err = StaticRegistry::new().describe_schema("my_msgs/Thing").unwrap_err();
        assert!(matches!(err, FirosError::Registry(ref m) if m.contains("my_msgs/Thing")));
    }

    #[test]
    fn custom_schemas_extend_the_table() {
        let mut registry = StaticRegistry::new().with_schema("my_msgs.msg.Thing", json!({"a": "int32"}));
        registry
            .extend_schemas_from_json(r#"{"my_msgs/Other": {"b": "string"}}"#)
            .unwrap();
        assert_eq!(registry.describe_schema("my_msgs/Thing").unwrap(), json!({"a": "int32"}));
        assert_eq!(registry.describe_schema("my_msgs/msg/Other").unwrap(), json!({"b": "string"}));
    }

    #[test]
    fn load_reads_robots_file() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("robots.json");
        fs::write(&path, ROBOTS).expect("write");
        let registry = StaticRegistry::load(&path).unwrap();
        assert_eq!(registry.robots().unwrap().len(), 2);
    }

    #[test]
    fn malformed_robots_file_is_rejected() {
        let err = StaticRegistry::from_json_str("{\"r1\": {}}").unwrap_err();
        assert_eq!(err.kind(), "registry");
    }
}
