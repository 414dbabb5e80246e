//! End-to-end: ingest, replay, detect, report

mod common;

use common::*;
use telewatch_core::stream::MemoryLineSource;
use telewatch_core::{report, AnomalyKind, DetectionConfig, DetectionEngine, IngestionLoop};

fn ingest(ws: &Workspace, lines: Vec<String>) {
    let (raw, store, errors) = ws.open_sinks();
    IngestionLoop::new(MemoryLineSource::new(lines), raw, store, errors, stepping_clock())
        .run()
        .unwrap();
}

#[test]
fn failure_sequence_produces_expected_incidents() {
    let ws = Workspace::new();
    ingest(&ws, failure_sequence());

    let engine = DetectionEngine::new(DetectionConfig::default()).unwrap();
    let anomalies = engine.run_source(&ws.replay(), None).unwrap();

    let found: Vec<(i64, AnomalyKind)> = anomalies
        .iter()
        .map(|a| ((a.timestamp - t0()).num_seconds(), a.kind))
        .collect();
    assert_eq!(
        found,
        vec![
            (2, AnomalyKind::ThresholdBreachTemp),
            (2, AnomalyKind::RapidChangeTemp),
            (2, AnomalyKind::StatusCritical),
            (3, AnomalyKind::ThresholdBreachVoltage),
            (3, AnomalyKind::RapidChangeTemp),
            (3, AnomalyKind::StatusCritical),
            (4, AnomalyKind::RapidChangeTemp),
            (8, AnomalyKind::HeartbeatLoss),
            (9, AnomalyKind::RapidChangeTemp),
        ]
    );

    assert!(report::write_to(ws.report_path(), &anomalies).unwrap());
    let loaded = report::load(ws.report_path()).unwrap();
    assert_eq!(loaded, anomalies);
}

#[test]
fn healthy_device_leaves_no_report() {
    let ws = Workspace::new();
    let lines = (0..10).map(|i| line_at(i, 40.0 + i as f64, 5.0, "NORMAL")).collect();
    ingest(&ws, lines);

    let engine = DetectionEngine::new(DetectionConfig::default()).unwrap();
    let anomalies = engine.run_source(&ws.replay(), None).unwrap();

    assert!(anomalies.is_empty());
    assert!(!report::write_to(ws.report_path(), &anomalies).unwrap());
    assert!(!ws.report_path().exists());
}

#[test]
fn missing_store_detects_nothing() {
    let ws = Workspace::new();
    let engine = DetectionEngine::new(DetectionConfig::default()).unwrap();
    assert!(engine.run_source(&ws.replay(), Some(at(100))).unwrap().is_empty());
}

#[test]
fn trailing_silence_against_now() {
    let ws = Workspace::new();
    ingest(&ws, vec![line_at(0, 20.0, 5.0, "NORMAL")]);

    let engine = DetectionEngine::new(DetectionConfig::default()).unwrap();
    let anomalies = engine.run_source(&ws.replay(), Some(at(60))).unwrap();

    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].kind, AnomalyKind::HeartbeatLoss);
    assert_eq!(anomalies[0].timestamp, at(4));
    assert!(anomalies[0].description.contains("60.0 seconds"));
}

#[test]
fn coalescing_collapses_sustained_breach() {
    let ws = Workspace::new();
    let lines = (0..6).map(|i| line_at(i, 85.0, 5.0, "WARNING_TEMP_HIGH")).collect();
    ingest(&ws, lines);

    let per_sample = DetectionEngine::new(DetectionConfig::default()).unwrap();
    assert_eq!(per_sample.run_source(&ws.replay(), None).unwrap().len(), 6);

    let coalescing =
        DetectionEngine::new(DetectionConfig::default().with_episode_coalescing(true)).unwrap();
    let anomalies = coalescing.run_source(&ws.replay(), None).unwrap();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].timestamp, at(0));
}
