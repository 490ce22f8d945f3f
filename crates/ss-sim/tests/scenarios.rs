//! Scenario files under `configs/` run through the simulated host.

use std::path::PathBuf;

use ss_sim::{RunRecord, run_path};

fn config(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../configs")
        .join(name)
}

fn run(name: &str) -> RunRecord {
    run_path(&config(name), None).unwrap()
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn vone_hotend_tracks_target_changes() {
    let record = run("vone_hotend.yaml");

    assert!(record.shutdown.is_none());
    // ticks at 0, 1, ..., 12
    assert_eq!(record.ticks, 13);
    assert_eq!(record.propagations, 3);
    assert_eq!(record.propagation_faults, 1);

    let sent: Vec<(&str, f64, f64)> = record
        .commands
        .iter()
        .map(|c| (c.heater.as_str(), c.at, c.target))
        .collect();
    let expected = [
        ("extruder_stage1", 1.0, 160.0),
        ("extruder_stage2", 1.0, 240.0),
        ("extruder_stage1", 5.0, 172.0),
        ("extruder_stage2", 5.0, 258.0),
        // stage1 is faulted at 8.0
        ("extruder_stage2", 8.0, 276.0),
    ];
    assert_eq!(sent.len(), expected.len());
    for ((heater, at, target), (want_heater, want_at, want_target)) in sent.iter().zip(expected) {
        assert_eq!(*heater, want_heater);
        assert_eq!(*at, want_at);
        assert_close(*target, want_target);
    }

    // restored stage stays stale until the next change; turning the
    // primary off is not propagated
    assert_close(record.final_target("extruder_stage1").unwrap(), 172.0);
    assert_close(record.final_target("extruder_stage2").unwrap(), 276.0);
    assert_eq!(record.final_target("extruder"), Some(0.0));
    assert_eq!(record.end_time, 12.0);
}

#[test]
fn missing_stage_shuts_down_before_any_tick() {
    let record = run("missing_stage.yaml");

    assert_eq!(record.ticks, 0);
    assert!(record.commands.is_empty());
    let message = record.shutdown.unwrap();
    assert!(message.starts_with("StageSync: "), "{message}");
    assert!(message.contains("'left' not found"), "{message}");
}

#[test]
fn removed_stage_does_not_block_others() {
    let record = run("dual_zone.json");

    assert!(record.shutdown.is_none());
    assert_eq!(record.propagation_faults, 1);

    let sent: Vec<(&str, f64)> = record
        .commands
        .iter()
        .map(|c| (c.heater.as_str(), c.at))
        .collect();
    assert_eq!(
        sent,
        [("zone_a", 0.0), ("zone_b", 0.0), ("zone_c", 1.5), ("zone_a", 3.0)]
    );
    assert_eq!(record.final_target("zone_a"), Some(90.0));
    assert_eq!(record.final_target("zone_c"), Some(180.0));
    assert_eq!(record.final_target("zone_b"), None);
}

#[test]
fn command_text_is_host_format() {
    let record = run("vone_hotend.yaml");
    assert_eq!(
        record.commands[0].script,
        r#"SET_HEATER_TEMPERATURE HEATER="extruder_stage1" TARGET="160.0""#
    );
}

#[test]
fn t_end_override_shortens_run() {
    let record = run_path(&config("vone_hotend.yaml"), Some(2.0)).unwrap();
    assert_eq!(record.ticks, 3);
    assert_eq!(record.commands.len(), 2);
    assert_eq!(record.end_time, 2.0);
}
