use std::{
    collections::VecDeque,
    sync::atomic::{AtomicU64, Ordering},
};

use parking_lot::Mutex;
use vr_voice::AudioFrame;

/// Bounded FIFO of one participant's processed frames. When full the oldest
/// frame is dropped to make room.
pub struct AudioQueue {
    depth: usize,
    frames: Mutex<VecDeque<AudioFrame>>,
    dropped: AtomicU64,
}

impl AudioQueue {
    pub fn new(depth: usize) -> Self {
        let depth = depth.max(1);
        Self {
            depth,
            frames: Mutex::new(VecDeque::with_capacity(depth)),
            dropped: AtomicU64::new(0),
        }
    }

    /// Returns `true` if an old frame was evicted.
    pub fn push(&self, frame: AudioFrame) -> bool {
        let mut q = self.frames.lock();
        let evicted = if q.len() >= self.depth {
            q.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        };
        q.push_back(frame);
        evicted
    }

    pub fn latest(&self) -> Option<AudioFrame> {
        self.frames.lock().back().cloned()
    }

    pub fn drain(&self) -> Vec<AudioFrame> {
        self.frames.lock().drain(..).collect()
    }

    pub fn clear(&self) {
        self.frames.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
