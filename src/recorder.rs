use crate::evidence::{EvidenceFrame, SnapshotWriter};
use crate::storage::EventLogStore;
use crate::Event;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecorderStats {
    pub recorded: u64,
    pub snapshot_failures: u64,
    pub store_failures: u64,
}

/// Persists events, attaching an evidence snapshot when one can be written.
///
/// Recording never fails the caller: a lost snapshot or a rejected append is
/// logged and counted, and the remaining events are still attempted.
pub struct EventRecorder {
    store: Box<dyn EventLogStore>,
    snapshots: Option<SnapshotWriter>,
    stats: RecorderStats,
}

impl EventRecorder {
    pub fn new(store: Box<dyn EventLogStore>) -> Self {
        Self {
            store,
            snapshots: None,
            stats: RecorderStats::default(),
        }
    }

    pub fn with_snapshots(mut self, writer: SnapshotWriter) -> Self {
        self.snapshots = Some(writer);
        self
    }

    /// Record `events` in order; returns how many reached the store.
    pub fn record(&mut self, events: &[Event], frame: Option<&EvidenceFrame>) -> usize {
        let mut persisted = 0;
        for event in events {
            let evidence_image = self.snapshot(event, frame);
            let record = event.clone().with_evidence_image(evidence_image);
            match self.store.append(&record) {
                Ok(_) => {
                    persisted += 1;
                    self.stats.recorded += 1;
                }
                Err(e) => {
                    self.stats.store_failures += 1;
                    log::error!(
                        "failed to persist {} event (person {}, bag {}, frame {}): {}",
                        record.kind,
                        record.person_id,
                        record.bag_id,
                        record.frame_number,
                        e
                    );
                }
            }
        }
        persisted
    }

    fn snapshot(&mut self, event: &Event, frame: Option<&EvidenceFrame>) -> Option<String> {
        let writer = self.snapshots.as_ref()?;
        let Some(frame) = frame else {
            self.stats.snapshot_failures += 1;
            log::warn!(
                "no frame available for {} snapshot at frame {}",
                event.kind,
                event.frame_number
            );
            return None;
        };
        match writer.write(event, frame) {
            Ok(name) => Some(name),
            Err(e) => {
                self.stats.snapshot_failures += 1;
                log::warn!("evidence snapshot failed: {:#}", e);
                None
            }
        }
    }

    pub fn stats(&self) -> RecorderStats {
        self.stats
    }

    pub fn store(&self) -> &dyn EventLogStore {
        self.store.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryEventLog;
    use crate::{EventKind, Timestamp, TrackId};
    use anyhow::{anyhow, Result};

    struct RejectingStore;

    impl EventLogStore for RejectingStore {
        fn append(&mut self, _ev: &Event) -> Result<[u8; 32]> {
            Err(anyhow!("disk full"))
        }

        fn read_events(&self, _limit: usize) -> Result<Vec<Event>> {
            Ok(Vec::new())
        }

        fn count(&self) -> Result<u64> {
            Ok(0)
        }
    }

    fn events() -> Vec<Event> {
        let ts = Timestamp {
            secs: 1_700_000_100,
            micros: 7,
        };
        vec![
            Event::new(ts, 40, EventKind::MovedAway, TrackId(1), TrackId(10)),
            Event::new(ts, 40, EventKind::LeftBehind, TrackId(1), TrackId(10)),
        ]
    }

    #[test]
    fn records_without_snapshots() -> Result<()> {
        let mut recorder = EventRecorder::new(Box::new(InMemoryEventLog::new()));
        assert_eq!(recorder.record(&events(), None), 2);

        let stored = recorder.store().read_events(10)?;
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|ev| ev.evidence_image.is_none()));
        assert_eq!(recorder.stats().snapshot_failures, 0);
        Ok(())
    }

    #[test]
    fn attaches_snapshot_names() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let writer = SnapshotWriter::new(dir.path())?;
        let mut recorder =
            EventRecorder::new(Box::new(InMemoryEventLog::new())).with_snapshots(writer);
        let frame = EvidenceFrame::from_rgb(vec![0u8; 8 * 8 * 3], 8, 8)?;

        assert_eq!(recorder.record(&events(), Some(&frame)), 2);
        let stored = recorder.store().read_events(10)?;
        assert_eq!(
            stored[0].evidence_image.as_deref(),
            Some("1700000100_000007_MOVED_AWAY_P1_B10.jpg")
        );
        assert!(dir
            .path()
            .join("1700000100_000007_LEFT_BEHIND_P1_B10.jpg")
            .exists());
        Ok(())
    }

    #[test]
    fn missing_frame_still_records_event() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let writer = SnapshotWriter::new(dir.path())?;
        let mut recorder =
            EventRecorder::new(Box::new(InMemoryEventLog::new())).with_snapshots(writer);

        assert_eq!(recorder.record(&events(), None), 2);
        assert_eq!(recorder.stats().snapshot_failures, 2);
        assert_eq!(recorder.stats().recorded, 2);
        Ok(())
    }

    #[test]
    fn store_failure_is_counted_not_raised() {
        let mut recorder = EventRecorder::new(Box::new(RejectingStore));
        assert_eq!(recorder.record(&events(), None), 0);
        assert_eq!(
            recorder.stats(),
            RecorderStats {
                recorded: 0,
                snapshot_failures: 0,
                store_failures: 2,
            }
        );
    }
}
