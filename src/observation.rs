//! Per-frame observations handed to the kernel by the upstream tracker.
//!
//! Class partitioning is authoritative: a track listed under `persons` is a
//! person, a track under `bags` is a bag. Absence from a map means "not
//! observed this frame" (occluded, exited, or a detection miss).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::{BoundingBox, Timestamp, TrackId};

/// Visible tracks of one class for one frame.
pub type Tracks = BTreeMap<TrackId, BoundingBox>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameObservation {
    /// 1-based, one per processed frame.
    pub frame_number: u64,
    #[serde(default)]
    pub persons: Tracks,
    #[serde(default)]
    pub bags: Tracks,
    /// Decoded frame on disk, attached to events as evidence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_path: Option<PathBuf>,
    /// Capture time; the kernel reads the wall clock when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<Timestamp>,
}

impl FrameObservation {
    pub fn new(frame_number: u64) -> Self {
        Self {
            frame_number,
            ..Self::default()
        }
    }

    pub fn with_person(mut self, id: u64, bbox: BoundingBox) -> Self {
        self.persons.insert(TrackId(id), bbox);
        self
    }

    pub fn with_bag(mut self, id: u64, bbox: BoundingBox) -> Self {
        self.bags.insert(TrackId(id), bbox);
        self
    }

    pub fn with_frame_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.frame_path = Some(path.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.captured_at = Some(timestamp);
        self
    }

    pub fn person_visible(&self, id: TrackId) -> bool {
        self.persons.contains_key(&id)
    }

    pub fn bag_visible(&self, id: TrackId) -> bool {
        self.bags.contains_key(&id)
    }
}
