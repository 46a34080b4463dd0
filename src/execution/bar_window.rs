use crate::models::PriceBar;
use std::collections::VecDeque;

/// Rolling window of bars for the traded pair
///
/// Ordered and append-only: a bar is only accepted when it is strictly newer
/// than the newest bar already held. Oldest bars fall off once `capacity` is
/// reached.
#[derive(Debug, Clone)]
pub struct BarWindow {
    bars: VecDeque<PriceBar>,
    capacity: usize,
}

impl BarWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            bars: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Append a bar; returns false when it is not newer than the window
    pub fn push(&mut self, bar: PriceBar) -> bool {
        if let Some(last) = self.bars.back() {
            if bar.timestamp <= last.timestamp {
                return false;
            }
        }

        self.bars.push_back(bar);
        while self.bars.len() > self.capacity {
            self.bars.pop_front();
        }
        true
    }

    /// Append every new bar from an oldest-first batch, returns how many were taken
    pub fn extend<I: IntoIterator<Item = PriceBar>>(&mut self, bars: I) -> usize {
        let mut added = 0;
        for bar in bars {
            if self.push(bar) {
                added += 1;
            }
        }
        added
    }

    pub fn bars(&self) -> Vec<PriceBar> {
        self.bars.iter().cloned().collect()
    }

    /// The N most recent bars, oldest first
    pub fn recent(&self, n: usize) -> Vec<PriceBar> {
        let skip = self.bars.len().saturating_sub(n);
        self.bars.iter().skip(skip).cloned().collect()
    }

    pub fn latest(&self) -> Option<&PriceBar> {
        self.bars.back()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
