use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use bag_witness::config::BagWatchdConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "BAGWATCH_CONFIG",
        "BAGWATCH_DB_PATH",
        "BAGWATCH_INPUT",
        "BAGWATCH_EVIDENCE_DIR",
        "BAGWATCH_PROXIMITY_RADIUS",
        "BAGWATCH_FRAME_THRESHOLD",
        "BAGWATCH_RELEASE_FRAMES",
        "BAGWATCH_SEPARATION_DISTANCE",
        "BAGWATCH_SEPARATION_FRAMES",
        "BAGWATCH_RESET_ON_RETURN",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_without_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = BagWatchdConfig::load().expect("load config");
    assert_eq!(cfg.db_path, "bagwatch.db");
    assert_eq!(cfg.input, "-");
    assert_eq!(cfg.evidence_dir, Some(PathBuf::from("evidence")));
    assert_eq!(cfg.thresholds.proximity_radius, 120.0);
    assert_eq!(cfg.thresholds.frame_threshold, 8);
    assert_eq!(cfg.thresholds.release_threshold, 12);
    assert_eq!(cfg.thresholds.separation_distance, 200.0);
    assert_eq!(cfg.thresholds.separation_frames, 8);
    assert!(!cfg.thresholds.release_reset_on_return);
}

#[test]
fn loads_json_config_with_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "db_path": "terminal_b.db",
        "input": "stub://walkaway",
        "evidence": { "dir": "/var/lib/bagwatch/evidence", "jpeg_quality": 70 },
        "thresholds": {
            "proximity_radius": 90.0,
            "frame_threshold": 5,
            "separation_frames": 4
        }
    }"#;
    file.write_all(json.as_bytes()).expect("write config");

    std::env::set_var("BAGWATCH_CONFIG", file.path());
    std::env::set_var("BAGWATCH_RELEASE_FRAMES", "30");
    std::env::set_var("BAGWATCH_RESET_ON_RETURN", "true");

    let cfg = BagWatchdConfig::load().expect("load config");
    assert_eq!(cfg.db_path, "terminal_b.db");
    assert_eq!(cfg.input, "stub://walkaway");
    assert_eq!(
        cfg.evidence_dir,
        Some(PathBuf::from("/var/lib/bagwatch/evidence"))
    );
    assert_eq!(cfg.jpeg_quality, 70);
    assert_eq!(cfg.thresholds.proximity_radius, 90.0);
    assert_eq!(cfg.thresholds.frame_threshold, 5);
    assert_eq!(cfg.thresholds.release_threshold, 30);
    assert_eq!(cfg.thresholds.separation_distance, 200.0);
    assert_eq!(cfg.thresholds.separation_frames, 4);
    assert!(cfg.thresholds.release_reset_on_return);

    clear_env();
}

#[test]
fn loads_toml_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
db_path = "gate_3.db"

[evidence]
enabled = false

[thresholds]
separation_distance = 250.0
"#;
    file.write_all(toml.as_bytes()).expect("write config");

    std::env::set_var("BAGWATCH_CONFIG", file.path());
    std::env::set_var("BAGWATCH_DB_PATH", "override.db");

    let cfg = BagWatchdConfig::load().expect("load config");
    assert_eq!(cfg.db_path, "override.db");
    assert_eq!(cfg.evidence_dir, None);
    assert_eq!(cfg.thresholds.separation_distance, 250.0);

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("BAGWATCH_PROXIMITY_RADIUS", "-5");
    assert!(BagWatchdConfig::load().is_err());
    clear_env();

    std::env::set_var("BAGWATCH_RELEASE_FRAMES", "a dozen");
    assert!(BagWatchdConfig::load().is_err());
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(b"{ not json").expect("write config");
    std::env::set_var("BAGWATCH_CONFIG", file.path());
    assert!(BagWatchdConfig::load().is_err());

    clear_env();
}
