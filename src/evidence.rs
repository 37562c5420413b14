//! Evidence frames and snapshot capture.
//!
//! - `EvidenceFrame`: owned RGB8 pixels for one frame, zeroized on drop.
//! - `SnapshotWriter`: writes one JPEG per event into an evidence directory.
//!
//! Snapshot names derive from the event timestamp so the event log record and
//! the image can be joined by file name alone.

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use zeroize::Zeroize;

use crate::Event;

pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Raw RGB8 frame retained only long enough to write evidence.
///
/// Not `Clone`: each frame has exactly one owner.
pub struct EvidenceFrame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl EvidenceFrame {
    /// Wrap a tightly packed RGB8 buffer.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|px| px.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow: {}x{}", width, height))?;
        if data.len() != expected {
            return Err(anyhow!(
                "rgb buffer is {} bytes, expected {} for {}x{}",
                data.len(),
                expected,
                width,
                height
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Decode an image file (JPEG or PNG) into an evidence frame.
    pub fn load(path: &Path) -> Result<Self> {
        let img = image::open(path)
            .with_context(|| format!("failed to decode frame {}", path.display()))?
            .to_rgb8();
        let (width, height) = img.dimensions();
        Self::from_rgb(img.into_raw(), width, height)
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

impl Drop for EvidenceFrame {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}

/// Writes evidence snapshots under a single directory.
#[derive(Clone, Debug)]
pub struct SnapshotWriter {
    dir: PathBuf,
    quality: u8,
}

impl SnapshotWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create evidence dir {}", dir.display()))?;
        Ok(Self {
            dir,
            quality: DEFAULT_JPEG_QUALITY,
        })
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `{secs}_{micros}_{KIND}_P{person}_B{bag}.jpg`
    pub fn snapshot_name(event: &Event) -> String {
        format!(
            "{}_{}_P{}_B{}.jpg",
            event.timestamp.file_stem(),
            event.kind,
            event.person_id,
            event.bag_id
        )
    }

    /// Encode `frame` as the snapshot for `event`; returns the file name.
    pub fn write(&self, event: &Event, frame: &EvidenceFrame) -> Result<String> {
        let name = Self::snapshot_name(event);
        let path = self.dir.join(&name);
        let file = File::create(&path)
            .with_context(|| format!("failed to create snapshot {}", path.display()))?;
        let mut encoder = JpegEncoder::new_with_quality(BufWriter::new(file), self.quality);
        encoder
            .encode(&frame.data, frame.width, frame.height, ExtendedColorType::Rgb8)
            .with_context(|| format!("failed to encode snapshot {}", path.display()))?;
        Ok(name)
    }
}
