use std::collections::BTreeMap;

use crate::geometry::track_distance;
use crate::observation::Tracks;

use super::relation::OwnershipRelation;
use super::PairKey;

/// Per owned pair, consecutive frames spent far apart while both are visible.
#[derive(Clone, Debug, Default)]
pub struct SeparationMonitor {
    counts: BTreeMap<PairKey, u32>,
}

impl SeparationMonitor {
    /// Advance every owned pair that is fully visible this frame.
    ///
    /// Pairs beyond `max_distance` gain one frame; pairs within it reset to 0
    /// on this exact frame. Pairs with either side unseen are left as they are.
    /// Returns pairs whose count exceeds `sustain_frames`, in edge order.
    pub fn update(
        &mut self,
        relation: &OwnershipRelation,
        persons: &Tracks,
        bags: &Tracks,
        max_distance: f32,
        sustain_frames: u32,
    ) -> Vec<PairKey> {
        let mut sustained = Vec::new();
        for (person, bag) in relation.edges() {
            let Some(dist) = track_distance(persons, person, bags, bag) else {
                continue;
            };
            let key = PairKey::new(person, bag);
            let count = self.counts.entry(key).or_insert(0);
            if dist > max_distance {
                *count = count.saturating_add(1);
            } else {
                *count = 0;
            }
            if *count > sustain_frames {
                sustained.push(key);
            }
        }
        sustained
    }

    pub fn count(&self, key: PairKey) -> u32 {
        self.counts.get(&key).copied().unwrap_or(0)
    }

    pub fn forget(&mut self, key: PairKey) {
        self.counts.remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BoundingBox, TrackId};

    fn at(id: u64, x: f32) -> Tracks {
        let mut t = Tracks::new();
        t.insert(TrackId(id), BoundingBox::centered(x, 0.0, 40.0, 80.0));
        t
    }

    fn owned() -> OwnershipRelation {
        let mut rel = OwnershipRelation::new();
        rel.insert(TrackId(1), TrackId(10));
        rel
    }

    const KEY: PairKey = PairKey {
        person: TrackId(1),
        bag: TrackId(10),
    };

    #[test]
    fn close_pair_never_counts() {
        let mut monitor = SeparationMonitor::default();
        let rel = owned();
        for _ in 0..100 {
            let fired = monitor.update(&rel, &at(1, 0.0), &at(10, 150.0), 200.0, 8);
            assert!(fired.is_empty());
            assert_eq!(monitor.count(KEY), 0);
        }
    }

    #[test]
    fn resets_on_the_frame_they_reunite() {
        let mut monitor = SeparationMonitor::default();
        let rel = owned();
        for _ in 0..5 {
            monitor.update(&rel, &at(1, 0.0), &at(10, 250.0), 200.0, 8);
        }
        assert_eq!(monitor.count(KEY), 5);
        monitor.update(&rel, &at(1, 0.0), &at(10, 199.0), 200.0, 8);
        assert_eq!(monitor.count(KEY), 0);
    }

    #[test]
    fn unseen_side_leaves_count_unchanged() {
        let mut monitor = SeparationMonitor::default();
        let rel = owned();
        monitor.update(&rel, &at(1, 0.0), &at(10, 250.0), 200.0, 8);
        monitor.update(&rel, &Tracks::new(), &at(10, 250.0), 200.0, 8);
        monitor.update(&rel, &at(1, 0.0), &Tracks::new(), 200.0, 8);
        assert_eq!(monitor.count(KEY), 1);
    }

    #[test]
    fn fires_after_sustain_frames_exceeded() {
        let mut monitor = SeparationMonitor::default();
        let rel = owned();
        for _ in 0..8 {
            assert!(monitor
                .update(&rel, &at(1, 0.0), &at(10, 300.0), 200.0, 8)
                .is_empty());
        }
        let fired = monitor.update(&rel, &at(1, 0.0), &at(10, 300.0), 200.0, 8);
        assert_eq!(fired, vec![KEY]);
    }
}
