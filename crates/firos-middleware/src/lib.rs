//! `firos-middleware` – the collaborators around the gateway core.
//!
//! The gateway never talks to the robot topic space or the context broker
//! directly. It calls the seams defined in [`adapter`], and this crate ships
//! one concrete implementation for each of them.
//!
//! # Modules
//!
//! - [`adapter`] – [`RobotRegistry`], [`PublishSink`], [`QuerySink`] and
//!   [`ValueCodec`] traits.
//! - [`bus`] – in-process topic bus built on Tokio broadcast channels, plus
//!   [`BusPublishSink`] which republishes command values onto it.
//! - [`registry`] – [`StaticRegistry`]: robots file + message schema table.
//! - [`context_broker`] – [`ContextBrokerClient`]: NGSIv1 HTTP query sink.
//! - [`codec`] – [`QuotedJsonCodec`]: decodes single-quoted pseudo-JSON values.

pub mod adapter;
pub mod bus;
pub mod codec;
pub mod context_broker;
pub mod registry;

pub use adapter::{PublishSink, QuerySink, RobotRegistry, ValueCodec};
pub use bus::{BusPublishSink, EventBus, TopicSubscriber};
pub use codec::{QuotedJsonCodec, parse_quoted_json};
pub use context_broker::ContextBrokerClient;
pub use registry::StaticRegistry;
