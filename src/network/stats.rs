use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::network::types::Frame;

/// Live tally of frames by top-level protocol name, shared by every
/// capture task.
#[derive(Clone, Default)]
pub struct ProtocolStats {
    counts: Arc<Mutex<HashMap<String, u64>>>,
}

impl ProtocolStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, name: &str) {
        *self.counts.lock().entry(name.to_string()).or_insert(0) += 1;
    }

    pub fn clear(&self) {
        self.counts.lock().clear();
    }

    /// Rebuilds the tally from scratch. Frames with no decodable top-level
    /// layer stay out of the mapping.
    pub fn recompute(&self, frames: &[Frame]) {
        let mut counts = self.counts.lock();
        counts.clear();
        for frame in frames {
            if let Some(name) = frame.protocol {
                *counts.entry(name.to_string()).or_insert(0) += 1;
            }
        }
    }

    /// Point-in-time copy; no entry can be observed mid-increment.
    pub fn snapshot(&self) -> HashMap<String, u64> {
        self.counts.lock().clone()
    }
}
