//! bagwatchd - unattended-baggage event daemon
//!
//! This daemon:
//! 1. Reads tracked person/bag observations from the configured source
//! 2. Runs the ownership state machine one frame at a time
//! 3. Writes an evidence snapshot per event (when a frame image is available)
//! 4. Appends every event to the hash-chained, signed event log
//! 5. Optionally streams overlay annotations as JSON lines

use anyhow::{anyhow, Result};
use clap::Parser;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bag_witness::annotate::alert_text;
use bag_witness::{
    annotate, open_source, Annotation, BagWatchdConfig, EventRecorder, EvidenceFrame,
    OwnershipTracker, SnapshotWriter, SqliteEventLog,
};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(
    name = "bagwatchd",
    about = "Detect bags left behind by their owners from tracked observations"
)]
struct Args {
    /// Observation source: a JSON-lines file, '-' for stdin, or stub://walkaway
    #[arg(long, value_name = "SOURCE")]
    input: Option<String>,

    /// Path to the event log SQLite DB
    #[arg(long, value_name = "PATH")]
    db: Option<String>,

    /// Directory for evidence snapshots
    #[arg(long, value_name = "DIR", conflicts_with = "no_evidence")]
    evidence_dir: Option<PathBuf>,

    /// Disable evidence snapshots
    #[arg(long)]
    no_evidence: bool,

    /// Write per-frame overlay annotations (JSON lines) to this file
    #[arg(long, value_name = "PATH")]
    annotations: Option<PathBuf>,
}

#[derive(Serialize)]
struct AnnotationLine<'a> {
    frame_number: u64,
    annotations: &'a [Annotation],
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = BagWatchdConfig::load()?;
    if let Some(input) = args.input {
        cfg.input = input;
    }
    if let Some(db) = args.db {
        cfg.db_path = db;
    }
    if let Some(dir) = args.evidence_dir {
        cfg.evidence_dir = Some(dir);
    }
    if args.no_evidence {
        cfg.evidence_dir = None;
    }

    let device_key_seed =
        std::env::var("DEVICE_KEY_SEED").map_err(|_| anyhow!("DEVICE_KEY_SEED must be set"))?;
    let store = SqliteEventLog::open(&cfg.db_path, &device_key_seed)?;
    let mut recorder = EventRecorder::new(Box::new(store));
    if let Some(dir) = &cfg.evidence_dir {
        let writer = SnapshotWriter::new(dir.clone())?.with_quality(cfg.jpeg_quality);
        log::info!("evidence snapshots written to {}", writer.dir().display());
        recorder = recorder.with_snapshots(writer);
    } else {
        log::info!("evidence snapshots disabled");
    }

    let mut annotations = match &args.annotations {
        Some(path) => Some(BufWriter::new(File::create(path).map_err(|e| {
            anyhow!("failed to create annotations file {}: {}", path.display(), e)
        })?)),
        None => None,
    };

    let mut source = open_source(&cfg.input)?;
    source.set_skip_malformed(true);
    let mut tracker = OwnershipTracker::new(cfg.thresholds)?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .map_err(|e| anyhow!("failed to install Ctrl-C handler: {}", e))?;
    }

    log::info!("bagwatchd running. reading {}, writing to {}", cfg.input, cfg.db_path);
    log::info!(
        "thresholds: proximity={} confirm>{} release>{} separation={}/>{} reset_on_return={}",
        cfg.thresholds.proximity_radius,
        cfg.thresholds.frame_threshold,
        cfg.thresholds.release_threshold,
        cfg.thresholds.separation_distance,
        cfg.thresholds.separation_frames,
        cfg.thresholds.release_reset_on_return
    );

    let capture_frames = cfg.evidence_dir.is_some();
    let mut frames = 0u64;
    let mut rejected_frames = 0u64;
    let mut event_count = 0u64;
    let mut last_health_log = Instant::now();

    while running.load(Ordering::SeqCst) {
        let Some(obs) = source.next_observation()? else {
            log::info!("input exhausted");
            break;
        };

        let report = match tracker.process_frame(&obs) {
            Ok(report) => report,
            Err(e) => {
                rejected_frames += 1;
                log::warn!("frame rejected: {}", e);
                continue;
            }
        };
        frames += 1;
        log::debug!(
            "frame {}: persons={} bags={} edges={}",
            obs.frame_number,
            obs.persons.len(),
            obs.bags.len(),
            tracker.relation().len()
        );

        for bag in &report.newly_left_behind {
            log::warn!("bag {} flagged LEFT BEHIND at frame {}", bag, report.frame_number);
        }

        if report.has_events() {
            for ev in &report.events {
                log::warn!("frame {}: {}", ev.frame_number, alert_text(ev));
            }
            let frame = if capture_frames {
                obs.frame_path
                    .as_deref()
                    .and_then(|path| match EvidenceFrame::load(path) {
                        Ok(frame) => Some(frame),
                        Err(e) => {
                            log::warn!("evidence frame unavailable: {:#}", e);
                            None
                        }
                    })
            } else {
                None
            };
            event_count += recorder.record(&report.events, frame.as_ref()) as u64;
        }

        if let Some(out) = annotations.as_mut() {
            let overlay = annotate(&tracker, &obs, &report);
            let line = AnnotationLine {
                frame_number: report.frame_number,
                annotations: &overlay,
            };
            serde_json::to_writer(&mut *out, &line)?;
            writeln!(out)?;
        }

        if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
            let stats = source.stats();
            log::info!(
                "source={} observations={} skipped={} frames={} edges={} watched_bags={} left_behind={} events={}",
                stats.source,
                stats.observations,
                stats.skipped,
                frames,
                tracker.relation().len(),
                tracker.watched_bags(),
                tracker.left_behind_bags().count(),
                event_count
            );
            last_health_log = Instant::now();
        }
    }

    if let Some(out) = annotations.as_mut() {
        out.flush()?;
    }

    let stats = recorder.stats();
    log::info!(
        "bagwatchd stopped: frames={} rejected={} skipped_lines={} events={} snapshot_failures={} store_failures={}",
        frames,
        rejected_frames,
        source.stats().skipped,
        stats.recorded,
        stats.snapshot_failures,
        stats.store_failures
    );
    let left_behind = tracker.left_behind_bags().collect::<Vec<_>>();
    if !left_behind.is_empty() {
        log::warn!("bags still flagged LEFT BEHIND: {:?}", left_behind);
    }
    Ok(())
}
