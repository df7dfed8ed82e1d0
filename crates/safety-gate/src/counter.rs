//! Drowsy-event counter

use tracing::{debug, info};

/// Counts hidden→visible overlay edges outside the challenge
#[derive(Debug, Clone, Default)]
pub struct DrowsyEventCounter {
    count: u32,
}

impl DrowsyEventCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one overlay show edge. Returns true if the count changed.
    pub fn record(&mut self, in_challenge: bool) -> bool {
        if in_challenge {
            debug!("Overlay edge during challenge not counted");
            return false;
        }
        self.count = self.count.saturating_add(1);
        info!(count = self.count, "Drowsy event recorded");
        true
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn reset(&mut self) {
        if self.count > 0 {
            info!(previous = self.count, "Drowsy event counter reset");
        }
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_record_and_reset() {
        let mut counter = DrowsyEventCounter::new();
        assert!(counter.record(false));
        assert!(counter.record(false));
        assert!(!counter.record(true));
        assert_eq!(counter.count(), 2);
        counter.reset();
        assert_eq!(counter.count(), 0);
    }

    proptest! {
        #[test]
        fn prop_counts_only_edges_outside_challenge(
            edges in proptest::collection::vec(any::<bool>(), 0..100)
        ) {
            let mut counter = DrowsyEventCounter::new();
            for &in_challenge in &edges {
                counter.record(in_challenge);
            }
            let expected = edges.iter().filter(|&&c| !c).count() as u32;
            prop_assert_eq!(counter.count(), expected);
        }
    }
}
