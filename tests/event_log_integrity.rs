use anyhow::{anyhow, Result};
use rusqlite::{params, Connection};
use std::io::Write;

use bag_witness::verify::{load_verifying_key, verify_event_chain};
use bag_witness::{
    export_event_log, open_source, EventKind, EventRecorder, EvidenceFrame, JsonLinesSource,
    ObservationSource, OwnershipTracker, SnapshotWriter, SqliteEventLog, Thresholds,
};

const SEED: &str = "devkey:integration";

fn run(source: &mut dyn ObservationSource, recorder: &mut EventRecorder) -> Result<usize> {
    let mut tracker = OwnershipTracker::new(Thresholds::default())?;
    let mut recorded = 0;
    while let Some(obs) = source.next_observation()? {
        let report = tracker.process_frame(&obs)?;
        if report.has_events() {
            let frame = match obs.frame_path.as_deref() {
                Some(path) => Some(EvidenceFrame::load(path)?),
                None => None,
            };
            recorded += recorder.record(&report.events, frame.as_ref());
        }
    }
    Ok(recorded)
}

#[test]
fn walkaway_scene_is_logged_and_verifiable() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("bagwatch.db");
    let db = db_path.to_string_lossy().to_string();

    let store = SqliteEventLog::open(&db, SEED)?;
    let mut recorder = EventRecorder::new(Box::new(store));
    let mut source = open_source("stub://walkaway")?;
    assert_eq!(run(source.as_mut(), &mut recorder)?, 2);
    drop(recorder);

    let conn = Connection::open(&db_path)?;
    let key = load_verifying_key(&conn, None)?;
    let mut kinds = Vec::new();
    let count = verify_event_chain(&conn, &key, |_, ev, _| kinds.push((ev.frame_number, ev.kind)))?;
    assert_eq!(count, 2);
    assert_eq!(
        kinds,
        vec![(38, EventKind::MovedAway), (38, EventKind::LeftBehind)]
    );

    let export = export_event_log(&conn, usize::MAX)?;
    assert_eq!(export.total_events, 2);
    assert!(export.events.iter().all(|ev| ev.evidence_image.is_none()));
    Ok(())
}

#[test]
fn reopening_appends_to_the_same_chain() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db = dir.path().join("bagwatch.db").to_string_lossy().to_string();

    for _ in 0..2 {
        let store = SqliteEventLog::open(&db, SEED)?;
        let mut recorder = EventRecorder::new(Box::new(store));
        let mut source = open_source("stub://walkaway")?;
        run(source.as_mut(), &mut recorder)?;
    }

    let conn = Connection::open(&db)?;
    let key = load_verifying_key(&conn, None)?;
    assert_eq!(verify_event_chain(&conn, &key, |_, _, _| {})?, 4);
    assert!(SqliteEventLog::open(&db, "devkey:other").is_err());
    Ok(())
}

#[test]
fn snapshots_are_linked_from_records() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let frame_path = dir.path().join("frame.png");
    image::RgbImage::from_pixel(64, 48, image::Rgb([40, 80, 120])).save(&frame_path)?;

    let mut observations = tempfile::NamedTempFile::new()?;
    for n in 1..=9 {
        writeln!(
            observations,
            r#"{{"frame_number": {}, "persons": {{"3": [80, 150, 120, 250]}}, "bags": {{"30": [135, 185, 165, 215]}}}}"#,
            n
        )?;
    }
    writeln!(
        observations,
        r#"{{"frame_number": 10, "bags": {{"30": [135, 185, 165, 215]}}, "frame_path": "{}", "captured_at": {{"secs": 1700000500, "micros": 42}}}}"#,
        frame_path.display()
    )?;

    let evidence_dir = dir.path().join("evidence");
    let db = dir.path().join("bagwatch.db").to_string_lossy().to_string();
    let store = SqliteEventLog::open(&db, SEED)?;
    let mut recorder =
        EventRecorder::new(Box::new(store)).with_snapshots(SnapshotWriter::new(&evidence_dir)?);
    let mut source = JsonLinesSource::open(observations.path())?;
    assert_eq!(run(&mut source, &mut recorder)?, 1);

    let events = recorder.store().read_events(10)?;
    let ev = events.first().ok_or_else(|| anyhow!("no event recorded"))?;
    assert_eq!(ev.kind, EventKind::LeftWithoutBag);
    let name = ev
        .evidence_image
        .as_deref()
        .ok_or_else(|| anyhow!("snapshot not linked"))?;
    assert_eq!(name, "1700000500_000042_LEFT_WITHOUT_BAG_P3_B30.jpg");
    assert!(evidence_dir.join(name).exists());
    Ok(())
}

#[test]
fn tampering_is_detected_after_the_fact() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db = dir.path().join("bagwatch.db").to_string_lossy().to_string();
    {
        let store = SqliteEventLog::open(&db, SEED)?;
        let mut recorder = EventRecorder::new(Box::new(store));
        let mut source = open_source("stub://walkaway")?;
        run(source.as_mut(), &mut recorder)?;
    }

    let conn = Connection::open(&db)?;
    conn.execute(
        "UPDATE event_log SET payload_json = replace(payload_json, 'LEFT_BEHIND', 'MOVED_AWAY') WHERE id = ?1",
        params![2],
    )?;
    let key = load_verifying_key(&conn, None)?;
    let err = verify_event_chain(&conn, &key, |_, _, _| {})
        .err()
        .ok_or_else(|| anyhow!("tampered log verified"))?;
    assert!(err.to_string().contains("at id 2"));
    Ok(())
}
