//! JSON-lines observation source.
//!
//! One `FrameObservation` object per line:
//!
//! ```text
//! {"frame_number": 1, "persons": {"1": [280, 200, 320, 300]}, "bags": {"10": [285, 285, 315, 315]}}
//! ```
//!
//! Blank lines are skipped. A malformed line is an error naming its line
//! number, or a logged warning once `set_skip_malformed(true)` is set.

use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::{ObservationSource, SourceStats};
use crate::observation::FrameObservation;

pub struct JsonLinesSource {
    name: String,
    reader: Box<dyn BufRead>,
    line_number: u64,
    observations: u64,
    skipped: u64,
    skip_malformed: bool,
    buf: String,
}

impl JsonLinesSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open observations {}", path.display()))?;
        Ok(Self::from_reader(
            path.display().to_string(),
            Box::new(BufReader::new(file)),
        ))
    }

    pub fn stdin() -> Self {
        Self::from_reader("-", Box::new(BufReader::new(std::io::stdin())))
    }

    pub fn from_reader(name: impl Into<String>, reader: Box<dyn BufRead>) -> Self {
        Self {
            name: name.into(),
            reader,
            line_number: 0,
            observations: 0,
            skipped: 0,
            skip_malformed: false,
            buf: String::new(),
        }
    }
}

impl ObservationSource for JsonLinesSource {
    fn next_observation(&mut self) -> Result<Option<FrameObservation>> {
        loop {
            self.buf.clear();
            let read = self
                .reader
                .read_line(&mut self.buf)
                .with_context(|| format!("failed to read {}", self.name))?;
            if read == 0 {
                return Ok(None);
            }
            self.line_number += 1;
            let line = self.buf.trim();
            if line.is_empty() {
                continue;
            }
            let err = match serde_json::from_str::<FrameObservation>(line) {
                Ok(obs) => {
                    self.observations += 1;
                    return Ok(Some(obs));
                }
                Err(e) => anyhow!(
                    "{}:{}: malformed observation: {}",
                    self.name,
                    self.line_number,
                    e
                ),
            };
            if !self.skip_malformed {
                return Err(err);
            }
            self.skipped += 1;
            log::warn!("skipping line: {}", err);
        }
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            observations: self.observations,
            skipped: self.skipped,
            source: self.name.clone(),
        }
    }

    fn set_skip_malformed(&mut self, skip: bool) {
        self.skip_malformed = skip;
    }
}
