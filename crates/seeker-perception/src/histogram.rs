//! Per-signature sighting counts used to vote on which marker is the fish.

use seeker_types::SIGNATURE_COUNT;

/// Counts how often each signature (1..=4) was the selected block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureHistogram {
    counts: [u32; SIGNATURE_COUNT],
}

impl SignatureHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one sighting of `signature`.  Signatures outside `1..=4` are
    /// ignored and `false` is returned.
    pub fn record(&mut self, signature: u16) -> bool {
        match Self::slot(signature) {
            Some(i) => {
                self.counts[i] = self.counts[i].saturating_add(1);
                true
            }
            None => false,
        }
    }

    /// Signature with the highest count.  Ties go to the lowest signature,
    /// so an empty histogram reports signature 1.
    pub fn most_frequent(&self) -> u16 {
        let mut best = 0;
        for (i, &count) in self.counts.iter().enumerate() {
            if count > self.counts[best] {
                best = i;
            }
        }
        best as u16 + 1
    }

    pub fn count(&self, signature: u16) -> u32 {
        Self::slot(signature).map_or(0, |i| self.counts[i])
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().fold(0, |acc, &c| acc.saturating_add(c))
    }

    pub fn reset(&mut self) {
        self.counts = [0; SIGNATURE_COUNT];
    }

    fn slot(signature: u16) -> Option<usize> {
        let i = usize::from(signature).checked_sub(1)?;
        (i < SIGNATURE_COUNT).then_some(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_histogram_reports_lowest_signature() {
        assert_eq!(SignatureHistogram::new().most_frequent(), 1);
    }

    #[test]
    fn highest_count_wins() {
        let mut h = SignatureHistogram::new();
        h.record(3);
        h.record(3);
        h.record(2);
        assert_eq!(h.most_frequent(), 3);
        assert_eq!(h.count(3), 2);
        assert_eq!(h.total(), 3);
    }

    #[test]
    fn ties_go_to_lowest_signature() {
        let mut h = SignatureHistogram::new();
        h.record(4);
        h.record(2);
        assert_eq!(h.most_frequent(), 2);
    }

    #[test]
    fn out_of_range_signatures_are_ignored() {
        let mut h = SignatureHistogram::new();
        assert!(!h.record(0));
        assert!(!h.record(5));
        assert_eq!(h.total(), 0);
        assert_eq!(h.count(7), 0);
    }

    #[test]
    fn reset_zeroes_all_counts() {
        let mut h = SignatureHistogram::new();
        h.record(1);
        h.record(4);
        h.reset();
        assert_eq!(h.total(), 0);
        assert_eq!(h, SignatureHistogram::new());
    }
}
