//! Observation sources.
//!
//! Sources yield one `FrameObservation` per processed frame:
//! - JSON-lines files or stdin (`JsonLinesSource`)
//! - Scripted scenes for demos and tests (`SyntheticSource`, `stub://`)
//!
//! Detection and tracking happen upstream; sources only deliver tracked boxes.
//! Ingestion is local-only: network URL schemes are rejected.

pub mod jsonl;
pub mod synthetic;

pub use jsonl::JsonLinesSource;
pub use synthetic::SyntheticSource;

use anyhow::{anyhow, Result};
use std::path::Path;

use crate::observation::FrameObservation;

/// Statistics for an observation source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub observations: u64,
    /// Malformed records dropped instead of returned as errors.
    pub skipped: u64,
    pub source: String,
}

pub trait ObservationSource {
    /// Next observation, or `None` once the source is exhausted.
    fn next_observation(&mut self) -> Result<Option<FrameObservation>>;

    fn stats(&self) -> SourceStats;

    /// Log and drop malformed records instead of failing on them.
    ///
    /// Sources that cannot produce malformed records ignore this.
    fn set_skip_malformed(&mut self, _skip: bool) {}
}

/// Open the source named by `input`.
///
/// `-` reads stdin, `stub://<scene>` replays a synthetic scene, and anything
/// else is a local JSON-lines file.
pub fn open_source(input: &str) -> Result<Box<dyn ObservationSource>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(anyhow!("input source is required"));
    }
    if input == "-" {
        return Ok(Box::new(JsonLinesSource::stdin()));
    }
    if let Some(scene) = input.strip_prefix("stub://") {
        return Ok(Box::new(SyntheticSource::new(scene)?));
    }
    if input.contains("://") {
        return Err(anyhow!(
            "input {} is not supported: only local files, '-' and stub:// scenes are accepted",
            input
        ));
    }
    Ok(Box::new(JsonLinesSource::open(Path::new(input))?))
}
