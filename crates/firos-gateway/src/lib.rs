//! `firos-gateway` – the NGSI ⇄ robot topic gateway core.
//!
//! Receives context broker notifications over HTTP, extracts the command
//! attributes each robot accepts, drops updates whose stamp was already
//! seen and republishes the rest through a [`PublishSink`]. The same HTTP
//! surface answers robot catalog and robot snapshot queries.
//!
//! # Modules
//!
//! - [`router`] – [`RouteTable`]: ordered first-match-wins routing.
//! - [`payload`] – request body / query string decoding into [`Payload`].
//! - [`dedup`] – [`UpdateDedupCache`]: last-seen stamp per robot attribute.
//! - [`handlers`] – notification ingest, robot catalog, robot snapshot.
//! - [`response`] – CORS annotation and the fixed response shapes.
//! - [`http`] – one-request-per-connection HTTP/1.1 reader/writer.
//! - [`server`] – [`Gateway`] dispatch and the [`GatewayServer`] accept loop.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use firos_gateway::{Collaborators, Gateway, GatewayServer, UpdateDedupCache};
//! use firos_middleware::{
//!     BusPublishSink, ContextBrokerClient, EventBus, QuotedJsonCodec, StaticRegistry,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let bus = Arc::new(EventBus::default());
//!     let collaborators = Collaborators {
//!         registry: Arc::new(StaticRegistry::new()),
//!         publisher: Arc::new(BusPublishSink::new(Arc::clone(&bus))),
//!         query: Arc::new(ContextBrokerClient::new("http://localhost:1026")),
//!         codec: Arc::new(QuotedJsonCodec),
//!     };
//!     let gateway = Gateway::new(collaborators, Arc::new(UpdateDedupCache::new()))
//!         .expect("routes compile");
//!     GatewayServer::new(Arc::new(gateway))
//!         .run()
//!         .await
//!         .expect("gateway server failed");
//! }
//! ```
//!
//! [`PublishSink`]: firos_middleware::PublishSink

pub mod dedup;
pub mod handlers;
pub mod http;
pub mod payload;
pub mod response;
pub mod router;
pub mod server;

#[cfg(test)]
pub(crate) mod testing;

pub use dedup::UpdateDedupCache;
pub use http::{HttpRequest, HttpResponse, Method};
pub use payload::Payload;
pub use router::{RouteMatch, RouteTable};
pub use server::{Collaborators, DEFAULT_PORT, Endpoint, Gateway, GatewayServer, default_routes};
