//! Trailing moving-average filters for classifier outputs

use std::collections::VecDeque;

/// Simple moving average over the last `size` samples
#[derive(Debug, Clone)]
pub struct MovingAverage {
    window: VecDeque<f32>,
    size: usize,
}

impl MovingAverage {
    /// Create a new filter; a zero size is treated as 1
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            window: VecDeque::with_capacity(size),
            size,
        }
    }

    /// Add a sample and get the current average
    pub fn push(&mut self, value: f32) -> f32 {
        if self.window.len() == self.size {
            self.window.pop_front();
        }
        self.window.push_back(value);
        self.window.iter().sum::<f32>() / self.window.len() as f32
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }
}

/// Element-wise moving average over probability vectors.
///
/// A sample with a different length than the buffered ones clears the
/// history first.
#[derive(Debug, Clone)]
pub struct VectorMovingAverage {
    window: VecDeque<Vec<f32>>,
    size: usize,
}

impl VectorMovingAverage {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            window: VecDeque::with_capacity(size),
            size,
        }
    }

    pub fn push(&mut self, values: &[f32]) -> Vec<f32> {
        if self
            .window
            .front()
            .is_some_and(|front| front.len() != values.len())
        {
            self.window.clear();
        }
        if self.window.len() == self.size {
            self.window.pop_front();
        }
        self.window.push_back(values.to_vec());

        let count = self.window.len() as f32;
        let mut sum = vec![0.0; values.len()];
        for sample in &self.window {
            for (acc, v) in sum.iter_mut().zip(sample) {
                *acc += v;
            }
        }
        sum.into_iter().map(|v| v / count).collect()
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }
}
