use std::sync::Arc;

use parking_lot::Mutex;

use crate::network::types::Frame;

/// Append-only, insertion-ordered collection of frames, shared by every
/// capture task. Indices are stable once assigned; entries only disappear
/// through `clear`.
#[derive(Clone, Default)]
pub struct FrameStore {
    frames: Arc<Mutex<Vec<Frame>>>,
}

impl FrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a frame and returns the index it was assigned.
    pub fn append(&self, frame: Frame) -> usize {
        let mut frames = self.frames.lock();
        frames.push(frame);
        frames.len() - 1
    }

    pub fn clear(&self) {
        self.frames.lock().clear();
    }

    /// `None` when the index is out of bounds, including under concurrent
    /// append between a length snapshot and this call.
    pub fn get(&self, index: usize) -> Option<Frame> {
        self.frames.lock().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    /// Point-in-time copy for filtering and serialization.
    pub fn snapshot(&self) -> Vec<Frame> {
        self.frames.lock().clone()
    }
}
