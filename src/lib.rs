//! Bag Witness
//!
//! This crate implements an event kernel for unattended-baggage surveillance.
//! It consumes per-frame tracked detections (people and bags, already resolved
//! into stable track ids by an upstream tracker) and derives ownership and
//! abandonment events.
//!
//! # Architecture
//!
//! Each frame flows through five ordered passes inside [`OwnershipTracker`]:
//!
//! 1. **Associate**: every visible bag credits its nearest visible person.
//! 2. **Confirm**: accumulated evidence past the frame threshold becomes ownership.
//! 3. **Release**: per bag, count frames without a visible custodian.
//! 4. **Separate**: per owned pair, count frames spent far apart; fire on sustain.
//! 5. **Exit**: an owner that vanishes while its bag is still attended fires an alert.
//!
//! State persists across frames in per-entity counters owned by the tracker
//! instance. Emitted [`Event`]s are handed to an [`EventRecorder`], which writes
//! evidence snapshots and appends hash-chained records to an [`EventLogStore`].
//!
//! # Module Structure
//!
//! - `ownership`: the per-frame state machine
//! - `observation`, `geometry`: inputs and shared geometry
//! - `annotate`: labels and overlays for a rendering collaborator
//! - `evidence`, `recorder`, `storage`, `log`, `verify`: evidence capture and the event log
//! - `ingest`, `config`: observation sources and daemon configuration

use anyhow::{anyhow, Result};
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::RngCore;
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

pub mod annotate;
pub mod config;
pub mod evidence;
pub mod geometry;
pub mod ingest;
pub mod log;
pub mod observation;
pub mod ownership;
pub mod recorder;
pub mod storage;
pub mod verify;

pub use annotate::{annotate, Annotation, AnnotationStyle};
pub use config::BagWatchdConfig;
pub use evidence::{EvidenceFrame, SnapshotWriter};
pub use geometry::Point;
pub use ingest::{open_source, JsonLinesSource, ObservationSource, SyntheticSource};
pub use log::{hash_record, sign_record, verify_record_signature};
pub use observation::{FrameObservation, Tracks};
pub use ownership::{FrameReport, OwnershipRelation, OwnershipTracker, PairKey, Thresholds};
pub use recorder::{EventRecorder, RecorderStats};
pub use storage::{export_event_log, EventExport, EventLogStore, InMemoryEventLog, SqliteEventLog};

pub fn shared_memory_uri() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!(
        "file:bag_witness_{:x}?mode=memory&cache=shared",
        u64::from_le_bytes(bytes)
    )
}

pub(crate) fn open_db_connection(db_path: &str) -> Result<Connection> {
    if db_path.starts_with("file:") {
        return Ok(Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        )?);
    }
    Ok(Connection::open(db_path)?)
}

// -------------------- Track Identity --------------------

/// Stable identity assigned by the upstream tracker.
///
/// Unique among concurrently visible entities of one class. The kernel treats a
/// reported id as the same entity for as long as the tracker reports it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TrackId {
    fn from(id: u64) -> Self {
        TrackId(id)
    }
}

// -------------------- Bounding Boxes --------------------

/// Axis-aligned box in frame pixel coordinates.
///
/// Serialized as `[left, top, right, bottom]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl BoundingBox {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Box of the given size centered on `(cx, cy)`.
    pub fn centered(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self::new(
            cx - width / 2.0,
            cy - height / 2.0,
            cx + width / 2.0,
            cy + height / 2.0,
        )
    }

    pub fn center(&self) -> Point {
        Point {
            x: (self.left + self.right) / 2.0,
            y: (self.top + self.bottom) / 2.0,
        }
    }

    pub fn top_left(&self) -> Point {
        Point {
            x: self.left,
            y: self.top,
        }
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.left, b.top, b.right, b.bottom]
    }
}

// -------------------- Timestamps --------------------

/// Wall-clock instant with microsecond precision.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp {
    pub secs: u64,
    pub micros: u32,
}

impl Timestamp {
    /// Current wall-clock time. A clock set before the epoch reads as zero.
    pub fn now() -> Self {
        let since = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            secs: since.as_secs(),
            micros: since.subsec_micros(),
        }
    }

    /// Filesystem-safe stem, e.g. `1700000000_000042`.
    pub fn file_stem(&self) -> String {
        format!("{}_{:06}", self.secs, self.micros)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.secs, self.micros)
    }
}

// -------------------- Event Types --------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// Owner walked away from a still-visible bag.
    MovedAway,
    /// Bag abandoned after a sustained separation.
    LeftBehind,
    /// Owner left the scene while the bag was still attended.
    LeftWithoutBag,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::MovedAway => "MOVED_AWAY",
            EventKind::LeftBehind => "LEFT_BEHIND",
            EventKind::LeftWithoutBag => "LEFT_WITHOUT_BAG",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "MOVED_AWAY" => Ok(EventKind::MovedAway),
            "LEFT_BEHIND" => Ok(EventKind::LeftBehind),
            "LEFT_WITHOUT_BAG" => Ok(EventKind::LeftWithoutBag),
            other => Err(anyhow!("unknown event kind {:?}", other)),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -------------------- Events --------------------

/// A single detected condition. Created once, never mutated after recording.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: Timestamp,
    pub frame_number: u64,
    pub kind: EventKind,
    pub person_id: TrackId,
    pub bag_id: TrackId,
    /// Evidence snapshot file name; `None` when no snapshot could be written.
    pub evidence_image: Option<String>,
}

impl Event {
    pub fn new(
        timestamp: Timestamp,
        frame_number: u64,
        kind: EventKind,
        person_id: TrackId,
        bag_id: TrackId,
    ) -> Self {
        Self {
            timestamp,
            frame_number,
            kind,
            person_id,
            bag_id,
            evidence_image: None,
        }
    }

    pub fn with_evidence_image(mut self, evidence_image: Option<String>) -> Self {
        self.evidence_image = evidence_image;
        self
    }
}

// -------------------- Device Keys --------------------

pub fn signing_key_from_seed(seed: &str) -> Result<SigningKey> {
    let trimmed = seed.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("device_key_seed is required"));
    }
    let mut hasher = Sha256::new();
    hasher.update(trimmed.as_bytes());
    let digest: [u8; 32] = hasher.finalize().into();
    Ok(SigningKey::from_bytes(&digest))
}

pub fn verifying_key_from_seed(seed: &str) -> Result<VerifyingKey> {
    Ok(signing_key_from_seed(seed)?.verifying_key())
}

pub(crate) fn verifying_key_from_bytes(bytes: &[u8]) -> Result<VerifyingKey> {
    if bytes.len() != 32 {
        return Err(anyhow!(
            "invalid verifying key bytes: expected 32 bytes, got {}",
            bytes.len()
        ));
    }
    let mut key_bytes = [0u8; 32];
    key_bytes.copy_from_slice(bytes);
    VerifyingKey::from_bytes(&key_bytes).map_err(|e| anyhow!("invalid verifying key bytes: {}", e))
}

pub fn device_public_key_from_db(conn: &Connection) -> Result<VerifyingKey> {
    let bytes: Vec<u8> = conn
        .query_row(
            "SELECT public_key FROM device_metadata WHERE id = 1",
            [],
            |row| row.get(0),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                anyhow!("device public key not found in database")
            }
            _ => anyhow!("failed to read device public key from database: {}", e),
        })?;
    verifying_key_from_bytes(&bytes)
}
