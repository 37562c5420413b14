//! Ownership and abandonment state machine.
//!
//! Per ownership edge:
//!
//! ```text
//! NONE -> EVIDENCE_ACCUMULATING -> OWNED -> RELEASED   (owner absent past the release threshold)
//!                                        -> SEPARATED  (owner far from bag past the sustain threshold)
//!                                        -> VOID       (owner exits)
//! ```
//!
//! SEPARATED and VOID dissolve the edge and drop its evidence, so a later edge
//! between the same ids must accumulate from zero. RELEASED is a flag on the
//! bag; the edge itself lives on until separation or exit.
//!
//! Frames must be applied strictly in order. Later passes read state written
//! by earlier passes of the same frame (exit sees edges already dissolved by
//! separation).

mod evidence;
mod exit;
mod relation;
mod release;
mod separation;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::observation::FrameObservation;
use crate::{Event, EventKind, Timestamp, TrackId};

pub use evidence::EvidenceLedger;
pub use exit::{detect_departures, Departure};
pub use relation::OwnershipRelation;
pub use release::ReleaseMonitor;
pub use separation::SeparationMonitor;

pub const DEFAULT_PROXIMITY_RADIUS: f32 = 120.0;
pub const DEFAULT_FRAME_THRESHOLD: u32 = 8;
pub const DEFAULT_RELEASE_THRESHOLD: u32 = 12;
pub const DEFAULT_SEPARATION_DISTANCE: f32 = 200.0;
pub const DEFAULT_SEPARATION_FRAMES: u32 = 8;

/// Explicit key for per-pair counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairKey {
    pub person: TrackId,
    pub bag: TrackId,
}

impl PairKey {
    pub fn new(person: TrackId, bag: TrackId) -> Self {
        Self { person, bag }
    }
}

/// Construction-time tuning for the tracker.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Max center distance for a bag to credit its nearest person.
    pub proximity_radius: f32,
    /// Evidence frames a pair must exceed to become an ownership edge.
    pub frame_threshold: u32,
    /// Unattended frames a bag must exceed to be left-behind.
    pub release_threshold: u32,
    /// Center distance beyond which an owned pair counts as separated.
    pub separation_distance: f32,
    /// Separated frames a pair must exceed to fire MOVED_AWAY/LEFT_BEHIND.
    pub separation_frames: u32,
    /// Reset a bag's release count to 0 whenever it is actively owned again.
    pub release_reset_on_return: bool,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            proximity_radius: DEFAULT_PROXIMITY_RADIUS,
            frame_threshold: DEFAULT_FRAME_THRESHOLD,
            release_threshold: DEFAULT_RELEASE_THRESHOLD,
            separation_distance: DEFAULT_SEPARATION_DISTANCE,
            separation_frames: DEFAULT_SEPARATION_FRAMES,
            release_reset_on_return: false,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("proximity_radius", self.proximity_radius),
            ("separation_distance", self.separation_distance),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(anyhow!("{} must be a positive distance (got {})", name, value));
            }
        }
        if self.release_threshold == u32::MAX {
            return Err(anyhow!("release_threshold must leave room to exceed it"));
        }
        Ok(())
    }
}

/// Everything that happened on one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameReport {
    pub frame_number: u64,
    pub timestamp: Timestamp,
    /// Events in emission order.
    pub events: Vec<Event>,
    /// Edges confirmed on this frame.
    pub confirmed: Vec<PairKey>,
    /// Bags whose release count crossed the threshold on this frame.
    pub newly_left_behind: Vec<TrackId>,
    /// Owners purged on this frame after leaving the scene.
    pub departed: Vec<TrackId>,
}

impl FrameReport {
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }
}

/// Single-writer state machine; feed it one frame at a time.
#[derive(Clone, Debug, Default)]
pub struct OwnershipTracker {
    thresholds: Thresholds,
    evidence: EvidenceLedger,
    relation: OwnershipRelation,
    release: ReleaseMonitor,
    separation: SeparationMonitor,
    last_frame: Option<u64>,
}

impl OwnershipTracker {
    pub fn new(thresholds: Thresholds) -> Result<Self> {
        thresholds.validate()?;
        Ok(Self {
            thresholds,
            ..Self::default()
        })
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Run associate, confirm, release, separation and exit for one frame.
    ///
    /// Fails without touching state when `frame_number` does not advance.
    pub fn process_frame(&mut self, obs: &FrameObservation) -> Result<FrameReport> {
        if let Some(last) = self.last_frame {
            if obs.frame_number <= last {
                return Err(anyhow!(
                    "frame {} arrived after frame {}; frames must be applied in order",
                    obs.frame_number,
                    last
                ));
            }
            if obs.frame_number > last + 1 {
                log::warn!(
                    "frame gap: {} -> {} ({} frames skipped)",
                    last,
                    obs.frame_number,
                    obs.frame_number - last - 1
                );
            }
        }
        self.last_frame = Some(obs.frame_number);

        let t = self.thresholds;
        let timestamp = obs.captured_at.unwrap_or_else(Timestamp::now);
        let frame_number = obs.frame_number;
        let stamp = move |kind: EventKind, key: PairKey| {
            Event::new(timestamp, frame_number, kind, key.person, key.bag)
        };
        let mut report = FrameReport {
            frame_number,
            timestamp,
            ..FrameReport::default()
        };

        self.evidence
            .associate(&obs.persons, &obs.bags, t.proximity_radius);

        report.confirmed = self.evidence.confirm(&mut self.relation, t.frame_threshold);
        for key in &report.confirmed {
            log::info!(
                "frame {}: P{} confirmed as owner of B{}",
                obs.frame_number,
                key.person,
                key.bag
            );
        }

        report.newly_left_behind = self.release.update(
            &self.relation,
            &obs.persons,
            &obs.bags,
            t.release_threshold,
            t.release_reset_on_return,
        );

        let separated = self.separation.update(
            &self.relation,
            &obs.persons,
            &obs.bags,
            t.separation_distance,
            t.separation_frames,
        );
        for key in separated {
            report.events.push(stamp(EventKind::MovedAway, key));
            report.events.push(stamp(EventKind::LeftBehind, key));
            self.relation.remove(key.person, key.bag);
            self.release.force_left_behind(key.bag, t.release_threshold);
            self.release.release_custodian(key.bag, key.person);
            self.evidence.forget(key);
            self.separation.forget(key);
        }

        let departures = detect_departures(
            &mut self.relation,
            &self.release,
            &obs.persons,
            t.release_threshold,
        );
        for departure in departures {
            for bag in &departure.unattended {
                let key = PairKey::new(departure.person, *bag);
                report.events.push(stamp(EventKind::LeftWithoutBag, key));
            }
            for bag in &departure.owned {
                let key = PairKey::new(departure.person, *bag);
                self.evidence.forget(key);
                self.separation.forget(key);
            }
            report.departed.push(departure.person);
        }

        Ok(report)
    }

    pub fn relation(&self) -> &OwnershipRelation {
        &self.relation
    }

    pub fn last_frame(&self) -> Option<u64> {
        self.last_frame
    }

    /// True once the bag's release count exceeds the release threshold.
    pub fn is_left_behind(&self, bag: TrackId) -> bool {
        self.release
            .is_left_behind(bag, self.thresholds.release_threshold)
    }

    pub fn left_behind_bags(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.release
            .counts()
            .filter(|(_, count)| *count > self.thresholds.release_threshold)
            .map(|(bag, _)| bag)
    }

    /// Bags the release pass still holds state for.
    pub fn watched_bags(&self) -> usize {
        self.release.watched_bags()
    }

    pub fn release_count(&self, bag: TrackId) -> u32 {
        self.release.count(bag)
    }

    pub fn evidence_count(&self, person: TrackId, bag: TrackId) -> u32 {
        self.evidence.count(PairKey::new(person, bag))
    }

    pub fn separation_count(&self, person: TrackId, bag: TrackId) -> u32 {
        self.separation.count(PairKey::new(person, bag))
    }

    pub fn owners_of(&self, bag: TrackId) -> Vec<TrackId> {
        self.relation.owners_of(bag).collect()
    }

    pub fn bags_of(&self, person: TrackId) -> Vec<TrackId> {
        self.relation.bags_of(person).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoundingBox;

    fn frame(n: u64, person_x: Option<f32>, bag_x: Option<f32>) -> FrameObservation {
        let mut obs = FrameObservation::new(n).with_timestamp(Timestamp {
            secs: 1_000 + n,
            micros: 0,
        });
        if let Some(x) = person_x {
            obs = obs.with_person(1, BoundingBox::centered(x, 200.0, 40.0, 100.0));
        }
        if let Some(x) = bag_x {
            obs = obs.with_bag(10, BoundingBox::centered(x, 200.0, 30.0, 30.0));
        }
        obs
    }

    fn owned_tracker() -> Result<(OwnershipTracker, u64)> {
        let mut tracker = OwnershipTracker::new(Thresholds::default())?;
        for n in 1..=9 {
            tracker.process_frame(&frame(n, Some(100.0), Some(150.0)))?;
        }
        assert_eq!(tracker.bags_of(TrackId(1)), vec![TrackId(10)]);
        Ok((tracker, 9))
    }

    #[test]
    fn rejects_out_of_order_frames_without_mutation() -> Result<()> {
        let mut tracker = OwnershipTracker::new(Thresholds::default())?;
        tracker.process_frame(&frame(5, Some(100.0), Some(150.0)))?;
        assert!(tracker.process_frame(&frame(5, Some(100.0), Some(150.0))).is_err());
        assert!(tracker.process_frame(&frame(3, Some(100.0), Some(150.0))).is_err());
        assert_eq!(tracker.evidence_count(TrackId(1), TrackId(10)), 1);
        assert_eq!(tracker.last_frame(), Some(5));
        Ok(())
    }

    #[test]
    fn gap_frames_are_processed() -> Result<()> {
        let mut tracker = OwnershipTracker::new(Thresholds::default())?;
        tracker.process_frame(&frame(1, Some(100.0), Some(150.0)))?;
        tracker.process_frame(&frame(4, Some(100.0), Some(150.0)))?;
        assert_eq!(tracker.evidence_count(TrackId(1), TrackId(10)), 2);
        Ok(())
    }

    #[test]
    fn invalid_thresholds_are_rejected() {
        let bad = Thresholds {
            proximity_radius: f32::NAN,
            ..Thresholds::default()
        };
        assert!(OwnershipTracker::new(bad).is_err());
        let bad = Thresholds {
            separation_distance: 0.0,
            ..Thresholds::default()
        };
        assert!(OwnershipTracker::new(bad).is_err());
    }

    #[test]
    fn separation_fires_once_and_edge_must_reform_from_zero() -> Result<()> {
        let (mut tracker, mut n) = owned_tracker()?;
        let mut fired = Vec::new();
        for _ in 0..20 {
            n += 1;
            let report = tracker.process_frame(&frame(n, Some(100.0), Some(400.0)))?;
            fired.extend(report.events);
        }
        assert_eq!(fired.len(), 2);
        assert_eq!(tracker.evidence_count(TrackId(1), TrackId(10)), 0);
        assert_eq!(tracker.separation_count(TrackId(1), TrackId(10)), 0);

        // Reunite: a new edge needs nine fresh frames of evidence.
        for i in 1..=9 {
            n += 1;
            let report = tracker.process_frame(&frame(n, Some(380.0), Some(400.0)))?;
            assert_eq!(report.confirmed.is_empty(), i < 9);
        }
        assert_eq!(tracker.owners_of(TrackId(10)), vec![TrackId(1)]);
        Ok(())
    }

    #[test]
    fn events_share_frame_and_timestamp() -> Result<()> {
        let (mut tracker, mut n) = owned_tracker()?;
        let mut reports = Vec::new();
        for _ in 0..9 {
            n += 1;
            reports.push(tracker.process_frame(&frame(n, Some(100.0), Some(400.0)))?);
        }
        let last = reports.pop().unwrap();
        assert!(reports.iter().all(|r| !r.has_events()));
        assert_eq!(last.events.len(), 2);
        assert_eq!(last.events[0].kind, EventKind::MovedAway);
        assert_eq!(last.events[1].kind, EventKind::LeftBehind);
        assert_eq!(last.events[0].timestamp, last.events[1].timestamp);
        assert_eq!(last.events[0].frame_number, n);
        assert!(last.events.iter().all(|e| e.evidence_image.is_none()));
        Ok(())
    }

    #[test]
    fn exit_after_separation_is_silent() -> Result<()> {
        let (mut tracker, mut n) = owned_tracker()?;
        for _ in 0..9 {
            n += 1;
            tracker.process_frame(&frame(n, Some(100.0), Some(400.0)))?;
        }
        n += 1;
        let report = tracker.process_frame(&frame(n, None, Some(400.0)))?;
        assert!(report.events.is_empty());
        assert!(report.departed.is_empty());
        assert!(tracker.is_left_behind(TrackId(10)));
        Ok(())
    }

    #[test]
    fn unknown_ids_query_as_empty() -> Result<()> {
        let tracker = OwnershipTracker::new(Thresholds::default())?;
        assert_eq!(tracker.release_count(TrackId(42)), 0);
        assert_eq!(tracker.evidence_count(TrackId(1), TrackId(42)), 0);
        assert_eq!(tracker.separation_count(TrackId(1), TrackId(42)), 0);
        assert!(tracker.owners_of(TrackId(42)).is_empty());
        assert!(tracker.bags_of(TrackId(42)).is_empty());
        assert!(!tracker.is_left_behind(TrackId(42)));
        assert_eq!(tracker.left_behind_bags().count(), 0);
        Ok(())
    }
}
