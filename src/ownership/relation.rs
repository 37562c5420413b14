use std::collections::{BTreeMap, BTreeSet};

use crate::TrackId;

/// Many-to-many ownership between people and bags.
///
/// Kept as two inverse maps. Every mutation updates both sides, and empty sets
/// are pruned so that a key is present iff it has at least one edge.
#[derive(Clone, Debug, Default)]
pub struct OwnershipRelation {
    person_bags: BTreeMap<TrackId, BTreeSet<TrackId>>,
    bag_owners: BTreeMap<TrackId, BTreeSet<TrackId>>,
}

impl OwnershipRelation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an edge. Returns false when it already existed.
    pub fn insert(&mut self, person: TrackId, bag: TrackId) -> bool {
        let inserted = self.person_bags.entry(person).or_default().insert(bag);
        self.bag_owners.entry(bag).or_default().insert(person);
        inserted
    }

    /// Remove a single edge. Returns false when it did not exist.
    pub fn remove(&mut self, person: TrackId, bag: TrackId) -> bool {
        let removed = remove_from(&mut self.person_bags, person, bag);
        remove_from(&mut self.bag_owners, bag, person);
        removed
    }

    /// Remove every edge of `person`, returning the bags they owned.
    pub fn remove_person(&mut self, person: TrackId) -> BTreeSet<TrackId> {
        let bags = self.person_bags.remove(&person).unwrap_or_default();
        for bag in &bags {
            remove_from(&mut self.bag_owners, *bag, person);
        }
        bags
    }

    pub fn owns(&self, person: TrackId, bag: TrackId) -> bool {
        self.person_bags
            .get(&person)
            .is_some_and(|bags| bags.contains(&bag))
    }

    pub fn bags_of(&self, person: TrackId) -> impl Iterator<Item = TrackId> + '_ {
        self.person_bags
            .get(&person)
            .into_iter()
            .flat_map(|bags| bags.iter().copied())
    }

    pub fn owners_of(&self, bag: TrackId) -> impl Iterator<Item = TrackId> + '_ {
        self.bag_owners
            .get(&bag)
            .into_iter()
            .flat_map(|owners| owners.iter().copied())
    }

    /// People with at least one owned bag.
    pub fn owners(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.person_bags.keys().copied()
    }

    /// All edges as `(person, bag)`, ordered by person then bag.
    pub fn edges(&self) -> impl Iterator<Item = (TrackId, TrackId)> + '_ {
        self.person_bags
            .iter()
            .flat_map(|(person, bags)| bags.iter().map(move |bag| (*person, *bag)))
    }

    pub fn contains_person(&self, person: TrackId) -> bool {
        self.person_bags.contains_key(&person)
    }

    pub fn contains_bag(&self, bag: TrackId) -> bool {
        self.bag_owners.contains_key(&bag)
    }

    pub fn len(&self) -> usize {
        self.person_bags.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.person_bags.is_empty()
    }

    /// True when both maps describe exactly the same edge set.
    pub fn is_symmetric(&self) -> bool {
        let forward = self.edges().collect::<BTreeSet<_>>();
        let backward = self
            .bag_owners
            .iter()
            .flat_map(|(bag, owners)| owners.iter().map(move |person| (*person, *bag)))
            .collect::<BTreeSet<_>>();
        let no_empty = self.person_bags.values().all(|s| !s.is_empty())
            && self.bag_owners.values().all(|s| !s.is_empty());
        forward == backward && no_empty
    }
}

fn remove_from(
    map: &mut BTreeMap<TrackId, BTreeSet<TrackId>>,
    key: TrackId,
    value: TrackId,
) -> bool {
    let Some(set) = map.get_mut(&key) else {
        return false;
    };
    let removed = set.remove(&value);
    if set.is_empty() {
        map.remove(&key);
    }
    removed
}
