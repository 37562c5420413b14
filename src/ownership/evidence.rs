use std::collections::BTreeMap;

use crate::geometry::nearest;
use crate::observation::Tracks;

use super::relation::OwnershipRelation;
use super::PairKey;

/// Cumulative association evidence per (person, bag) pair.
///
/// Counters only grow while a pair accumulates. A miss never decrements them;
/// they are dropped only when the pair's edge terminates.
#[derive(Clone, Debug, Default)]
pub struct EvidenceLedger {
    counts: BTreeMap<PairKey, u32>,
}

impl EvidenceLedger {
    /// Credit each visible bag's nearest visible person when within `radius`.
    ///
    /// Returns the pairs credited this frame.
    pub fn associate(&mut self, persons: &Tracks, bags: &Tracks, radius: f32) -> Vec<PairKey> {
        let mut credited = Vec::new();
        for (&bag, bag_box) in bags {
            let Some((person, dist)) = nearest(bag_box.center(), persons) else {
                continue;
            };
            if dist < radius {
                let key = PairKey::new(person, bag);
                let count = self.counts.entry(key).or_insert(0);
                *count = count.saturating_add(1);
                credited.push(key);
            }
        }
        credited
    }

    /// Promote every pair whose evidence exceeds `frame_threshold`.
    ///
    /// Returns only the edges that were not already in the relation.
    pub fn confirm(&self, relation: &mut OwnershipRelation, frame_threshold: u32) -> Vec<PairKey> {
        self.counts
            .iter()
            .filter(|&(_, &count)| count > frame_threshold)
            .filter_map(|(key, _)| relation.insert(key.person, key.bag).then_some(*key))
            .collect()
    }

    pub fn count(&self, key: PairKey) -> u32 {
        self.counts.get(&key).copied().unwrap_or(0)
    }

    pub fn forget(&mut self, key: PairKey) {
        self.counts.remove(&key);
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
