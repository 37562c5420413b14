use crate::observation::Tracks;
use crate::TrackId;

use super::relation::OwnershipRelation;
use super::release::ReleaseMonitor;

/// An owner that vanished from the person tracks this frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Departure {
    pub person: TrackId,
    /// Bags still attended at departure; each one raises LEFT_WITHOUT_BAG.
    pub unattended: Vec<TrackId>,
    /// Every bag the person owned, alerted or not.
    pub owned: Vec<TrackId>,
}

/// Evaluate every owner missing from `persons` and purge them from `relation`.
///
/// A bag alerts only while its release count is still below the threshold,
/// i.e. it has not already been marked left-behind. The owner's edges are
/// removed whether or not anything alerted.
pub fn detect_departures(
    relation: &mut OwnershipRelation,
    release: &ReleaseMonitor,
    persons: &Tracks,
    release_threshold: u32,
) -> Vec<Departure> {
    let missing = relation
        .owners()
        .filter(|person| !persons.contains_key(person))
        .collect::<Vec<_>>();

    missing
        .into_iter()
        .map(|person| {
            let owned = relation.remove_person(person).into_iter().collect::<Vec<_>>();
            let unattended = owned
                .iter()
                .copied()
                .filter(|bag| release.count(*bag) < release_threshold)
                .collect();
            Departure {
                person,
                unattended,
                owned,
            }
        })
        .collect()
}
