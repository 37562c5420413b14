use std::collections::{BTreeMap, BTreeSet};

use crate::observation::Tracks;
use crate::TrackId;

use super::relation::OwnershipRelation;

/// Per-bag count of frames spent without a visible custodian.
///
/// Custodians are the bag's confirmed owners. An owner that exits stays a
/// custodian here after the ownership relation drops it, so its bag keeps
/// accumulating toward left-behind while the owner is gone. A custodian is
/// released only by a confirmed separation.
///
/// A left-behind bag is forgotten once it is out of view with no owner in the
/// relation, so bags that leave the scene for good stop being counted.
#[derive(Clone, Debug, Default)]
pub struct ReleaseMonitor {
    counts: BTreeMap<TrackId, u32>,
    custodians: BTreeMap<TrackId, BTreeSet<TrackId>>,
}

impl ReleaseMonitor {
    /// Advance every watched bag by one frame.
    ///
    /// A bag is actively owned iff it is visible and at least one custodian is
    /// visible. Actively owned bags hold their count (or reset it to 0 when
    /// `reset_on_return`); every other watched bag gains one frame.
    /// Returns bags that crossed `release_threshold` on this frame.
    pub fn update(
        &mut self,
        relation: &OwnershipRelation,
        persons: &Tracks,
        bags: &Tracks,
        release_threshold: u32,
        reset_on_return: bool,
    ) -> Vec<TrackId> {
        for (person, bag) in relation.edges() {
            self.custodians.entry(bag).or_default().insert(person);
        }

        let mut crossed = Vec::new();
        for (&bag, custodians) in &self.custodians {
            let actively_owned =
                bags.contains_key(&bag) && custodians.iter().any(|p| persons.contains_key(p));
            let count = self.counts.entry(bag).or_insert(0);
            if actively_owned {
                if reset_on_return {
                    *count = 0;
                }
                continue;
            }
            let before = *count;
            *count = count.saturating_add(1);
            if before <= release_threshold && *count > release_threshold {
                crossed.push(bag);
            }
        }
        self.prune_vanished(relation, bags, release_threshold);
        crossed
    }

    fn prune_vanished(
        &mut self,
        relation: &OwnershipRelation,
        bags: &Tracks,
        release_threshold: u32,
    ) {
        let counts = &self.counts;
        self.custodians.retain(|bag, _| {
            bags.contains_key(bag)
                || relation.contains_bag(*bag)
                || counts.get(bag).map_or(true, |count| *count <= release_threshold)
        });
        let custodians = &self.custodians;
        self.counts
            .retain(|bag, _| custodians.contains_key(bag) || bags.contains_key(bag));
    }

    pub fn count(&self, bag: TrackId) -> u32 {
        self.counts.get(&bag).copied().unwrap_or(0)
    }

    pub fn is_left_behind(&self, bag: TrackId, release_threshold: u32) -> bool {
        self.count(bag) > release_threshold
    }

    /// Mark `bag` left-behind immediately.
    pub fn force_left_behind(&mut self, bag: TrackId, release_threshold: u32) {
        self.counts.insert(bag, release_threshold.saturating_add(1));
    }

    /// Stop treating `person` as a custodian of `bag`.
    pub fn release_custodian(&mut self, bag: TrackId, person: TrackId) {
        if let Some(set) = self.custodians.get_mut(&bag) {
            set.remove(&person);
            if set.is_empty() {
                self.custodians.remove(&bag);
            }
        }
    }

    /// Bags with a count or a custodian.
    pub fn watched_bags(&self) -> usize {
        self.counts.len().max(self.custodians.len())
    }

    /// Every bag with a nonzero count.
    pub fn counts(&self) -> impl Iterator<Item = (TrackId, u32)> + '_ {
        self.counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(bag, count)| (*bag, *count))
    }
}
