//! Per-generation memoization of agent scores.
//!
//! Selection schemes may ask for the same (agent, case) score many times
//! within a generation; the cache guarantees each pair is computed at most
//! once. It is cleared wholesale between generations because population slots
//! are reused by new offspring.

/// Score store for a fixed population size over a fixed case set.
#[derive(Debug)]
pub struct ScoreCache {
    /// Row-major: `slot * num_cases + case`. `None` means not computed yet.
    entries: Vec<Option<f64>>,
    /// Aggregate score per slot, set once every case has been scored.
    totals: Vec<Option<f64>>,
    num_cases: usize,
}

impl ScoreCache {
    #[must_use]
    pub fn new(num_slots: usize, num_cases: usize) -> Self {
        Self {
            entries: vec![None; num_slots * num_cases],
            totals: vec![None; num_slots],
            num_cases,
        }
    }

    #[must_use]
    pub fn num_slots(&self) -> usize {
        self.totals.len()
    }

    #[must_use]
    pub fn num_cases(&self) -> usize {
        self.num_cases
    }

    fn index(&self, slot: usize, case: usize) -> usize {
        debug_assert!(slot < self.num_slots() && case < self.num_cases);
        slot * self.num_cases + case
    }

    /// Returns the cached score for `(slot, case)`, computing and storing it
    /// on first use.
    pub fn get_or_compute(
        &mut self,
        slot: usize,
        case: usize,
        compute: impl FnOnce() -> f64,
    ) -> f64 {
        let index = self.index(slot, case);
        if let Some(score) = self.entries[index] {
            return score;
        }
        let score = compute();
        self.entries[index] = Some(score);
        score
    }

    /// Scores every case for a slot (reusing cached scores) and records the
    /// total. Returns the total.
    pub fn evaluate(&mut self, slot: usize, mut compute: impl FnMut(usize) -> f64) -> f64 {
        let total = (0..self.num_cases)
            .map(|case| self.get_or_compute(slot, case, || compute(case)))
            .sum();
        self.totals[slot] = Some(total);
        total
    }

    /// The slot's aggregate score, if [`ScoreCache::evaluate`] has run this
    /// generation.
    #[must_use]
    pub fn total(&self, slot: usize) -> Option<f64> {
        self.totals[slot]
    }

    /// A single cached case score, if computed this generation.
    #[must_use]
    pub fn case_score(&self, slot: usize, case: usize) -> Option<f64> {
        self.entries[self.index(slot, case)]
    }

    /// Drops every cached score and total. Run this when a generation turns
    /// over and slots change owners.
    pub fn clear_all(&mut self) {
        self.entries.fill(None);
        self.totals.fill(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_pair_computed_once() {
        let mut cache = ScoreCache::new(2, 3);
        let mut calls = 0;
        for _ in 0..5 {
            let score = cache.get_or_compute(1, 2, || {
                calls += 1;
                42.0
            });
            assert_eq!(score, 42.0);
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_evaluate_records_total() {
        let mut cache = ScoreCache::new(1, 4);
        assert_eq!(cache.total(0), None);
        #[expect(clippy::cast_precision_loss)]
        let total = cache.evaluate(0, |case| case as f64);
        assert_eq!(total, 6.0);
        assert_eq!(cache.total(0), Some(6.0));
        assert_eq!(cache.case_score(0, 3), Some(3.0));
    }

    #[test]
    fn test_evaluate_reuses_cached_scores() {
        let mut cache = ScoreCache::new(1, 3);
        cache.get_or_compute(0, 0, || 10.0);
        let mut calls = 0;
        let total = cache.evaluate(0, |_| {
            calls += 1;
            1.0
        });
        // Case 0 came from the cache; only cases 1 and 2 were computed.
        assert_eq!(calls, 2);
        assert_eq!(total, 12.0);
    }

    #[test]
    fn test_clear_all_resets_everything() {
        let mut cache = ScoreCache::new(2, 2);
        cache.evaluate(0, |_| 1.0);
        cache.evaluate(1, |_| 2.0);
        cache.clear_all();
        assert_eq!(cache.total(0), None);
        assert_eq!(cache.total(1), None);
        assert_eq!(cache.case_score(0, 0), None);
        let mut calls = 0;
        cache.get_or_compute(0, 0, || {
            calls += 1;
            5.0
        });
        assert_eq!(calls, 1);
    }
}
