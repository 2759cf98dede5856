//! In-process topic bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others. Each [`Event`] is addressed by its `source`, which is
//! `"<robot>/<topic>"` for command updates coming out of the gateway.
//!
//! [`BusPublishSink`] is the [`PublishSink`] the gateway uses in production:
//! robot-side bridges subscribe to the bus and forward updates to the actual
//! robot topics.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use firos_types::{DecodedValue, Event, EventPayload, FirosError};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::adapter::PublishSink;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
pub const DEFAULT_CAPACITY: usize = 256;

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channel.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to every current subscriber.
    ///
    /// Returns the number of receivers that were handed the event, or a
    /// [`FirosError::Channel`] error when nobody is listening.
    pub fn publish(&self, event: Event) -> Result<usize, FirosError> {
        self.sender
            .send(event)
            .map_err(|e| FirosError::Channel(format!("event bus send error: {e}")))
    }

    /// Subscribe to all events on the bus.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Subscribe and return a [`TopicSubscriber`] filtered to the given
    /// source prefix (e.g. `"r1/"` for every topic of robot `r1`).
    pub fn subscribe_topic(&self, topic: impl Into<String>) -> TopicSubscriber {
        TopicSubscriber {
            topic: topic.into(),
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Source-prefix subscriber
// ---------------------------------------------------------------------------

/// A subscriber that only delivers events whose `source` field starts with the
/// given topic prefix.
pub struct TopicSubscriber {
    topic: String,
    receiver: broadcast::Receiver<Event>,
}

impl TopicSubscriber {
    /// Wait for the next event that matches this subscriber's topic filter.
    ///
    /// Returns `None` when the bus is closed and no further events will arrive.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.source.starts_with(&self.topic) => {
                    return Some(event);
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = %self.topic, lagged_by = n, "TopicSubscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// PublishSink over the bus
// ---------------------------------------------------------------------------

/// Republishes accepted command values as [`EventPayload::TopicUpdate`]
/// events.
#[derive(Clone, Debug)]
pub struct BusPublishSink {
    bus: Arc<EventBus>,
}

impl BusPublishSink {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl PublishSink for BusPublishSink {
    async fn publish(
        &self,
        robot: &str,
        topic: &str,
        value: &DecodedValue,
    ) -> Result<(), FirosError> {
        let event = Event {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: format!("{robot}/{topic}"),
            payload: EventPayload::TopicUpdate {
                robot: robot.to_string(),
                topic: topic.to_string(),
                value: value.to_value(),
            },
        };
        match self.bus.publish(event) {
            Ok(receivers) => debug!(robot, topic, receivers, "topic update published"),
            // Nobody listening on the bus is a normal condition for the
            // gateway, the update is simply dropped.
            Err(e) => debug!(robot, topic, error = %e, "topic update dropped"),
        }
        Ok(())
    }
}
