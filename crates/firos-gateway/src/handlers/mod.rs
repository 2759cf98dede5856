//! The three request handlers behind the route table.
//!
//! - [`ingest`] – `POST /firos/`: broker notifications → deduplicated topic
//!   updates. Always acknowledged with 200.
//! - [`catalog`] – `GET /robots/`: every robot and its topic descriptors.
//! - [`snapshot`] – `GET /robot/{id}/`: current broker state of one robot.

pub mod catalog;
pub mod ingest;
pub mod snapshot;

pub use catalog::{RobotCatalog, RobotDescriptor, TopicDescriptor};
pub use ingest::{IngestReport, NotificationIngest};
pub use snapshot::{RobotSnapshot, SnapshotOutcome};
