// THEORY:
// The census turns a stream of classified contours into counts. Two policies
// exist and a pipeline uses exactly one of them for its whole run:
//
// - **Per-frame**: the table is wiped at the start of every frame and every
//   surviving contour adds one to its label. Nothing survives between frames.
// - **Cumulative dedup**: the table only ever grows. A run-wide set remembers
//   every `BoundingBoxKey` already counted; a contour is counted the first time
//   its exact box is seen and ignored afterwards. This is the same
//   "pixel-exact box means same object" approximation described on
//   `BoundingBoxKey`: a blob that moves one pixel is counted again.
//
// `CounterTable` is a fixed record with one field per label, so a count for a
// label outside the enumeration cannot be represented at all.

use crate::core_modules::blob::BoundingBoxKey;
use crate::core_modules::classifier::Category;
use serde::Deserialize;
use std::collections::HashSet;

/// Non-negative count per label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterTable {
    pub standing_human: u64,
    pub lying_human: u64,
    pub child: u64,
    pub animal: u64,
    pub unknown: u64,
}

impl CounterTable {
    pub fn get(&self, category: Category) -> u64 {
        match category {
            Category::StandingHuman => self.standing_human,
            Category::LyingHuman => self.lying_human,
            Category::Child => self.child,
            Category::Animal => self.animal,
            Category::Unknown => self.unknown,
        }
    }

    pub fn increment(&mut self, category: Category) {
        let slot = match category {
            Category::StandingHuman => &mut self.standing_human,
            Category::LyingHuman => &mut self.lying_human,
            Category::Child => &mut self.child,
            Category::Animal => &mut self.animal,
            Category::Unknown => &mut self.unknown,
        };
        *slot += 1;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn total(&self) -> u64 {
        Category::ALL.iter().map(|c| self.get(*c)).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, u64)> + '_ {
        Category::ALL.iter().map(move |c| (*c, self.get(*c)))
    }
}

/// Which counting policy a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CountingPolicy {
    PerFrame,
    CumulativeDedup,
}

/// The stateful counter owned by the processing loop.
#[derive(Debug, Clone)]
pub enum Counter {
    PerFrame {
        table: CounterTable,
    },
    CumulativeDedup {
        /// Every box counted so far in this run. Never cleared.
        seen: HashSet<BoundingBoxKey>,
        table: CounterTable,
    },
}

impl Counter {
    pub fn new(policy: CountingPolicy) -> Self {
        match policy {
            CountingPolicy::PerFrame => Counter::PerFrame {
                table: CounterTable::default(),
            },
            CountingPolicy::CumulativeDedup => Counter::CumulativeDedup {
                seen: HashSet::new(),
                table: CounterTable::default(),
            },
        }
    }

    pub fn policy(&self) -> CountingPolicy {
        match self {
            Counter::PerFrame { .. } => CountingPolicy::PerFrame,
            Counter::CumulativeDedup { .. } => CountingPolicy::CumulativeDedup,
        }
    }

    /// Called once before the first contour of every frame.
    pub fn begin_frame(&mut self) {
        if let Counter::PerFrame { table } = self {
            table.reset();
        }
    }

    /// Records one surviving contour. Returns `true` when it was counted.
    pub fn record(&mut self, key: BoundingBoxKey, category: Category) -> bool {
        match self {
            Counter::PerFrame { table } => {
                table.increment(category);
                true
            }
            Counter::CumulativeDedup { seen, table } => {
                if seen.insert(key) {
                    table.increment(category);
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn table(&self) -> &CounterTable {
        match self {
            Counter::PerFrame { table } => table,
            Counter::CumulativeDedup { table, .. } => table,
        }
    }

    /// Number of distinct boxes remembered (always zero for the per-frame policy).
    pub fn seen_keys(&self) -> usize {
        match self {
            Counter::PerFrame { .. } => 0,
            Counter::CumulativeDedup { seen, .. } => seen.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_starts_at_zero_and_increments_per_label() {
        let mut table = CounterTable::default();
        assert_eq!(table.total(), 0);
        table.increment(Category::Child);
        table.increment(Category::Child);
        table.increment(Category::Animal);
        assert_eq!(table.get(Category::Child), 2);
        assert_eq!(table.get(Category::Animal), 1);
        assert_eq!(table.get(Category::StandingHuman), 0);
        assert_eq!(table.total(), 3);
        table.reset();
        assert_eq!(table, CounterTable::default());
    }

    #[test]
    fn same_box_over_many_frames_counts_once() {
        let mut counter = Counter::new(CountingPolicy::CumulativeDedup);
        let key = BoundingBoxKey::new(10, 10, 20, 40);

        let mut newly = Vec::new();
        for _ in 0..7 {
            counter.begin_frame();
            newly.push(counter.record(key, Category::Child));
        }

        assert_eq!(counter.table().child, 1);
        assert_eq!(newly, vec![true, false, false, false, false, false, false]);
        assert_eq!(counter.seen_keys(), 1);
    }

    #[test]
    fn a_key_repeated_within_one_frame_counts_once() {
        let mut counter = Counter::new(CountingPolicy::CumulativeDedup);
        let key = BoundingBoxKey::new(4, 4, 30, 60);

        counter.begin_frame();
        let newly = [counter.record(key, Category::StandingHuman), counter.record(key, Category::StandingHuman)];

        assert_eq!(newly, [true, false]);
        assert_eq!(counter.table().standing_human, 1);
        assert_eq!(counter.table().total(), 1);
    }

    #[test]
    fn per_frame_counts_a_repeated_key_every_time() {
        let mut counter = Counter::new(CountingPolicy::PerFrame);
        let key = BoundingBoxKey::new(4, 4, 30, 60);

        counter.begin_frame();
        let newly = [counter.record(key, Category::Child), counter.record(key, Category::Child)];

        assert_eq!(newly, [true, true]);
        assert_eq!(counter.table().child, 2);
    }

    #[test]
    fn a_one_pixel_shift_is_a_new_detection() {
        let mut counter = Counter::new(CountingPolicy::CumulativeDedup);
        counter.begin_frame();
        assert!(counter.record(BoundingBoxKey::new(10, 10, 20, 40), Category::Child));
        counter.begin_frame();
        assert!(counter.record(BoundingBoxKey::new(11, 10, 20, 40), Category::Child));
        assert_eq!(counter.table().child, 2);
    }

    #[test]
    fn cumulative_counts_are_never_reset() {
        let mut counter = Counter::new(CountingPolicy::CumulativeDedup);
        counter.begin_frame();
        counter.record(BoundingBoxKey::new(0, 0, 5, 5), Category::Animal);
        counter.begin_frame();
        counter.begin_frame();
        assert_eq!(counter.table().animal, 1);
    }

    #[test]
    fn per_frame_table_matches_the_frame_multiset_and_resets() {
        let mut counter = Counter::new(CountingPolicy::PerFrame);
        let labels = [
            Category::Child,
            Category::StandingHuman,
            Category::Child,
            Category::Unknown,
        ];

        counter.begin_frame();
        for (i, label) in labels.iter().enumerate() {
            assert!(counter.record(BoundingBoxKey::new(i as u32, 0, 3, 3), *label));
        }
        let table = *counter.table();
        assert_eq!(table.child, 2);
        assert_eq!(table.standing_human, 1);
        assert_eq!(table.unknown, 1);
        assert_eq!(table.total(), labels.len() as u64);

        counter.begin_frame();
        assert_eq!(counter.table().total(), 0);

        // The same boxes on the next frame are counted again.
        for (i, label) in labels.iter().enumerate() {
            counter.record(BoundingBoxKey::new(i as u32, 0, 3, 3), *label);
        }
        assert_eq!(*counter.table(), table);
        assert_eq!(counter.seen_keys(), 0);
    }
}
