//! Minimum-statistics noise floor tracker.
//!
//! Keeps the last N frame energies; the floor follows their minimum with
//! 0.95/0.05 smoothing. Shared by the noise suppressor and the AGC.

use std::collections::VecDeque;

const SMOOTHING: f32 = 0.95;

#[derive(Debug, Clone)]
pub struct NoiseFloor {
    history: VecDeque<f32>,
    capacity: usize,
    estimate: f32,
    primed: bool,
}

impl NoiseFloor {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            estimate: 0.0,
            primed: false,
        }
    }

    /// Record one frame energy and return the updated floor.
    pub fn update(&mut self, energy: f32) -> f32 {
        let energy = if energy.is_finite() { energy.max(0.0) } else { 0.0 };
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(energy);

        let minimum = self.history.iter().copied().fold(f32::INFINITY, f32::min);
        if self.primed {
            self.estimate = SMOOTHING * self.estimate + (1.0 - SMOOTHING) * minimum;
        } else {
            self.estimate = minimum;
            self.primed = true;
        }
        self.estimate
    }

    pub fn estimate(&self) -> f32 {
        self.estimate
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.estimate = 0.0;
        self.primed = false;
    }
}
