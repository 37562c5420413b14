//! Scripted scenes (`stub://<scene>`) for demos and tests.
//!
//! `walkaway`: bag 10 rests at (300, 300). Person 1 stands beside it for 20
//! frames, then walks right at 20 px per frame and leaves the scene after
//! frame 45. The bag stays in view until frame 60.

use anyhow::{anyhow, Result};

use super::{ObservationSource, SourceStats};
use crate::observation::FrameObservation;
use crate::{BoundingBox, Timestamp};

const WALKAWAY_FRAMES: u64 = 60;
const WALKAWAY_DEPARTS_AFTER: u64 = 20;
const WALKAWAY_EXITS_AFTER: u64 = 45;
const WALKAWAY_STEP_PX: f32 = 20.0;
const SCENE_EPOCH_SECS: u64 = 1_700_000_000;
const FRAME_INTERVAL_US: u64 = 100_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scene {
    WalkAway,
}

pub struct SyntheticSource {
    scene: Scene,
    name: String,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new(scene: &str) -> Result<Self> {
        let parsed = match scene {
            "walkaway" => Scene::WalkAway,
            other => return Err(anyhow!("unknown synthetic scene {:?}", other)),
        };
        log::info!("SyntheticSource: replaying stub://{}", scene);
        Ok(Self {
            scene: parsed,
            name: format!("stub://{}", scene),
            frame_count: 0,
        })
    }

    fn timestamp(frame_number: u64) -> Timestamp {
        let offset_us = frame_number * FRAME_INTERVAL_US;
        Timestamp {
            secs: SCENE_EPOCH_SECS + offset_us / 1_000_000,
            micros: (offset_us % 1_000_000) as u32,
        }
    }

    fn walkaway(frame_number: u64) -> FrameObservation {
        let mut obs = FrameObservation::new(frame_number)
            .with_timestamp(Self::timestamp(frame_number))
            .with_bag(10, BoundingBox::centered(300.0, 300.0, 30.0, 30.0));
        if frame_number <= WALKAWAY_EXITS_AFTER {
            let walked = frame_number.saturating_sub(WALKAWAY_DEPARTS_AFTER) as f32;
            let x = 300.0 + walked * WALKAWAY_STEP_PX;
            obs = obs.with_person(1, BoundingBox::centered(x, 250.0, 40.0, 100.0));
        }
        obs
    }
}

impl ObservationSource for SyntheticSource {
    fn next_observation(&mut self) -> Result<Option<FrameObservation>> {
        let total = match self.scene {
            Scene::WalkAway => WALKAWAY_FRAMES,
        };
        if self.frame_count >= total {
            return Ok(None);
        }
        self.frame_count += 1;
        let obs = match self.scene {
            Scene::WalkAway => Self::walkaway(self.frame_count),
        };
        Ok(Some(obs))
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            observations: self.frame_count,
            skipped: 0,
            source: self.name.clone(),
        }
    }
}
