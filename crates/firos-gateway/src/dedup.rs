//! [`UpdateDedupCache`] – last-seen update stamp per robot attribute.
//!
//! The cache is the only shared mutable state of the gateway. The
//! check-then-record sequence runs under a single lock so two concurrent
//! notifications carrying the same stamp cannot both decide to forward.
//! Entries are never evicted; the key space is bounded by the robots and
//! command attributes that exist.

use std::collections::HashMap;

use firos_types::UpdateStamp;
use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct UpdateDedupCache {
    stamps: Mutex<HashMap<String, HashMap<String, UpdateStamp>>>,
}

impl UpdateDedupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when no stamp is recorded for `(robot, attribute)` or
    /// the recorded one differs from `stamp`, recording `stamp` in that case.
    pub fn should_forward(&self, robot: &str, attribute: &str, stamp: &UpdateStamp) -> bool {
        let mut stamps = self.stamps.lock();
        let robot_stamps = stamps.entry(robot.to_string()).or_default();
        match robot_stamps.get(attribute) {
            Some(last) if last == stamp => false,
            _ => {
                robot_stamps.insert(attribute.to_string(), stamp.clone());
                true
            }
        }
    }

    pub fn last_stamp(&self, robot: &str, attribute: &str) -> Option<UpdateStamp> {
        self.stamps
            .lock()
            .get(robot)
            .and_then(|attrs| attrs.get(attribute))
            .cloned()
    }

    /// Number of recorded `(robot, attribute)` entries.
    pub fn len(&self) -> usize {
        self.stamps.lock().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
