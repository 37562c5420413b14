use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::evidence::DEFAULT_JPEG_QUALITY;
use crate::ownership::Thresholds;

const DEFAULT_DB_PATH: &str = "bagwatch.db";
const DEFAULT_INPUT: &str = "-";
const DEFAULT_EVIDENCE_DIR: &str = "evidence";

#[derive(Debug, Deserialize, Default)]
struct BagWatchdConfigFile {
    db_path: Option<String>,
    input: Option<String>,
    evidence: Option<EvidenceConfigFile>,
    thresholds: Option<ThresholdsConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct EvidenceConfigFile {
    enabled: Option<bool>,
    dir: Option<PathBuf>,
    jpeg_quality: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
struct ThresholdsConfigFile {
    proximity_radius: Option<f32>,
    frame_threshold: Option<u32>,
    release_threshold: Option<u32>,
    separation_distance: Option<f32>,
    separation_frames: Option<u32>,
    release_reset_on_return: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct BagWatchdConfig {
    pub db_path: String,
    pub input: String,
    /// `None` disables evidence snapshots.
    pub evidence_dir: Option<PathBuf>,
    pub jpeg_quality: u8,
    pub thresholds: Thresholds,
}

impl BagWatchdConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("BAGWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: BagWatchdConfigFile) -> Self {
        let db_path = file.db_path.unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let input = file.input.unwrap_or_else(|| DEFAULT_INPUT.to_string());
        let evidence = file.evidence.unwrap_or_default();
        let evidence_dir = if evidence.enabled.unwrap_or(true) {
            Some(
                evidence
                    .dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_EVIDENCE_DIR)),
            )
        } else {
            None
        };
        let defaults = Thresholds::default();
        let t = file.thresholds.unwrap_or_default();
        let thresholds = Thresholds {
            proximity_radius: t.proximity_radius.unwrap_or(defaults.proximity_radius),
            frame_threshold: t.frame_threshold.unwrap_or(defaults.frame_threshold),
            release_threshold: t.release_threshold.unwrap_or(defaults.release_threshold),
            separation_distance: t
                .separation_distance
                .unwrap_or(defaults.separation_distance),
            separation_frames: t.separation_frames.unwrap_or(defaults.separation_frames),
            release_reset_on_return: t
                .release_reset_on_return
                .unwrap_or(defaults.release_reset_on_return),
        };
        Self {
            db_path,
            input,
            evidence_dir,
            jpeg_quality: evidence.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
            thresholds,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("BAGWATCH_DB_PATH") {
            if !path.trim().is_empty() {
                self.db_path = path;
            }
        }
        if let Ok(input) = std::env::var("BAGWATCH_INPUT") {
            if !input.trim().is_empty() {
                self.input = input;
            }
        }
        if let Ok(dir) = std::env::var("BAGWATCH_EVIDENCE_DIR") {
            if !dir.trim().is_empty() {
                self.evidence_dir = Some(PathBuf::from(dir));
            }
        }
        if let Ok(radius) = std::env::var("BAGWATCH_PROXIMITY_RADIUS") {
            self.thresholds.proximity_radius = radius
                .trim()
                .parse()
                .map_err(|_| anyhow!("BAGWATCH_PROXIMITY_RADIUS must be a number of pixels"))?;
        }
        if let Ok(frames) = std::env::var("BAGWATCH_FRAME_THRESHOLD") {
            self.thresholds.frame_threshold = parse_frames("BAGWATCH_FRAME_THRESHOLD", &frames)?;
        }
        if let Ok(frames) = std::env::var("BAGWATCH_RELEASE_FRAMES") {
            self.thresholds.release_threshold = parse_frames("BAGWATCH_RELEASE_FRAMES", &frames)?;
        }
        if let Ok(distance) = std::env::var("BAGWATCH_SEPARATION_DISTANCE") {
            self.thresholds.separation_distance = distance.trim().parse().map_err(|_| {
                anyhow!("BAGWATCH_SEPARATION_DISTANCE must be a number of pixels")
            })?;
        }
        if let Ok(frames) = std::env::var("BAGWATCH_SEPARATION_FRAMES") {
            self.thresholds.separation_frames =
                parse_frames("BAGWATCH_SEPARATION_FRAMES", &frames)?;
        }
        if let Ok(flag) = std::env::var("BAGWATCH_RESET_ON_RETURN") {
            self.thresholds.release_reset_on_return = parse_flag("BAGWATCH_RESET_ON_RETURN", &flag)?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.db_path.trim().is_empty() {
            return Err(anyhow!("db_path must not be empty"));
        }
        if self.input.trim().is_empty() {
            return Err(anyhow!("input must not be empty"));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(anyhow!("evidence jpeg_quality must be between 1 and 100"));
        }
        self.thresholds.validate()
    }
}

fn read_config_file(path: &Path) -> Result<BagWatchdConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg: BagWatchdConfigFile = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn parse_frames(name: &str, value: &str) -> Result<u32> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow!("{} must be an integer number of frames", name))
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow!("{} must be true or false", name)),
    }
}
