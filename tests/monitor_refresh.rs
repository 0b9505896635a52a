//! Refresh behavior of the backup monitor against a scripted server.

use std::sync::Arc;

use dupmon::api::models::BackupMetadata;
use dupmon::core::{BackupMonitor, Error, JobEvent, JobState, SimulatedServer, Simulator};

fn meta(started: &str, finished: &str) -> BackupMetadata {
    BackupMetadata {
        last_backup_started: Some(started.to_string()),
        last_backup_finished: Some(finished.to_string()),
        ..Default::default()
    }
}

fn failed_meta(started: &str, finished: &str, error_at: &str, message: &str) -> BackupMetadata {
    BackupMetadata {
        last_error_date: Some(error_at.to_string()),
        last_error_message: Some(message.to_string()),
        ..meta(started, finished)
    }
}

#[tokio::test]
async fn full_run_lifecycle_reports_each_event_once() {
    let (server, sim) = SimulatedServer::new();
    sim.set_backup(Simulator::backup(
        "1",
        "Documents",
        meta("20240601T100000Z", "20240601T103000Z"),
    ));
    let monitor = BackupMonitor::new(Arc::new(server), ["1"]);

    // First poll sees an old success: idle, no events invented.
    let report = monitor.refresh().await.unwrap();
    assert!(report.events.is_empty());
    assert_eq!(report.results["1"].as_ref().unwrap().state, JobState::Idle);

    sim.set_running("1");
    let report = monitor.refresh().await.unwrap();
    assert_eq!(
        report.events,
        vec![JobEvent::Started {
            backup_id: "1".into(),
            name: "Documents".into(),
        }]
    );

    // Still running: no repeat of Started.
    let report = monitor.refresh().await.unwrap();
    assert!(report.events.is_empty());
    assert_eq!(
        report.results["1"].as_ref().unwrap().state,
        JobState::Running
    );

    sim.set_complete("1");
    sim.set_backup(Simulator::backup(
        "1",
        "Documents",
        meta("20240601T110000Z", "20240601T113000Z"),
    ));
    let report = monitor.refresh().await.unwrap();
    assert_eq!(report.events.len(), 1);
    assert!(matches!(
        &report.events[0],
        JobEvent::Completed {
            warnings: false,
            ..
        }
    ));
    assert_eq!(
        report.results["1"].as_ref().unwrap().state,
        JobState::Succeeded
    );

    // Terminal state decays; nothing further is reported.
    let report = monitor.refresh().await.unwrap();
    assert!(report.events.is_empty());
    assert_eq!(report.results["1"].as_ref().unwrap().state, JobState::Idle);
}

#[tokio::test]
async fn failed_run_reports_failure_with_message() {
    let (server, sim) = SimulatedServer::new();
    sim.set_backup(Simulator::backup(
        "1",
        "Documents",
        meta("20240601T100000Z", "20240601T103000Z"),
    ));
    let monitor = BackupMonitor::new(Arc::new(server), ["1"]);
    monitor.refresh().await.unwrap();

    sim.set_running("1");
    monitor.refresh().await.unwrap();

    sim.clear_progress();
    sim.set_backup(Simulator::backup(
        "1",
        "Documents",
        failed_meta(
            "20240601T110000Z",
            "20240601T110500Z",
            "20240601T111000Z",
            "remote storage unreachable",
        ),
    ));
    let report = monitor.refresh().await.unwrap();
    assert_eq!(
        report.events,
        vec![JobEvent::Failed {
            backup_id: "1".into(),
            name: "Documents".into(),
            error: "remote storage unreachable".into(),
        }]
    );
    let snapshot = report.results["1"].as_ref().unwrap();
    assert_eq!(snapshot.state, JobState::Failed);
    assert!(snapshot.last_duration.is_none());
}

#[tokio::test]
async fn run_finishing_between_polls_emits_no_events() {
    let (server, sim) = SimulatedServer::new();
    sim.set_backup(Simulator::backup(
        "1",
        "Documents",
        meta("20240601T100000Z", "20240601T103000Z"),
    ));
    let monitor = BackupMonitor::new(Arc::new(server), ["1"]);
    monitor.refresh().await.unwrap();

    // Metadata advances but no poll ever observed the run in flight.
    sim.set_backup(Simulator::backup(
        "1",
        "Documents",
        meta("20240601T110000Z", "20240601T113000Z"),
    ));
    let report = monitor.refresh().await.unwrap();
    assert!(report.events.is_empty());
    assert_eq!(report.results["1"].as_ref().unwrap().state, JobState::Idle);
}

#[tokio::test]
async fn stale_id_is_reported_not_found_and_dropped() {
    let (server, sim) = SimulatedServer::new();
    sim.set_backup(Simulator::backup("1", "Documents", BackupMetadata::default()));
    let monitor = BackupMonitor::new(Arc::new(server), ["1", "9"]);

    let report = monitor.refresh().await.unwrap();
    assert!(report.results["1"].is_ok());
    assert_eq!(report.results["9"], Err(Error::NotFound("9".into())));
    assert_eq!(monitor.monitored().await, vec!["1".to_string()]);

    // The dropped id stays gone on later polls.
    let report = monitor.refresh().await.unwrap();
    assert!(!report.results.contains_key("9"));
}

#[tokio::test]
async fn backup_deleted_on_server_is_dropped_mid_flight() {
    let (server, sim) = SimulatedServer::new();
    sim.set_backup(Simulator::backup("1", "Documents", BackupMetadata::default()));
    let monitor = BackupMonitor::new(Arc::new(server), ["1"]);
    monitor.refresh().await.unwrap();

    sim.remove_backup("1");
    let report = monitor.refresh().await.unwrap();
    assert_eq!(report.results["1"], Err(Error::NotFound("1".into())));
    assert!(monitor.monitored().await.is_empty());
    assert!(monitor.snapshot("1").await.is_none());
}

#[tokio::test]
async fn one_failing_backup_does_not_hide_the_others() {
    let (server, sim) = SimulatedServer::new();
    sim.set_backup(Simulator::backup(
        "1",
        "Documents",
        meta("20240601T100000Z", "20240601T103000Z"),
    ));
    sim.set_backup(Simulator::backup(
        "2",
        "Photos",
        meta("20240601T100000Z", "20240601T103000Z"),
    ));
    let monitor = BackupMonitor::new(Arc::new(server), ["1", "2"]);
    monitor.refresh().await.unwrap();

    sim.fail_backup("2", Error::Connection("connection refused".into()));
    let report = monitor.refresh().await.unwrap();
    assert!(report.results["1"].is_ok());
    assert!(matches!(report.results["2"], Err(Error::Connection(_))));

    // The last good snapshot survives the transient failure.
    let retained = monitor.snapshot("2").await.unwrap();
    assert_eq!(retained.name, "Photos");

    sim.clear_backup_failure("2");
    let report = monitor.refresh().await.unwrap();
    assert!(report.results["2"].is_ok());
    assert!(report.events.is_empty());
}

#[tokio::test]
async fn listing_failure_is_reported_per_backup_and_recovers() {
    let (server, sim) = SimulatedServer::new();
    sim.set_backup(Simulator::backup(
        "1",
        "Documents",
        meta("20240601T100000Z", "20240601T103000Z"),
    ));
    let monitor = BackupMonitor::new(Arc::new(server), ["1"]);
    monitor.refresh().await.unwrap();

    sim.fail_listing(Some(Error::Connection("connection refused".into())));
    let report = monitor.refresh().await.unwrap();
    assert!(matches!(report.results["1"], Err(Error::Connection(_))));
    assert!(report.events.is_empty());
    assert!(monitor.snapshot("1").await.is_some());

    sim.fail_listing(None);
    let report = monitor.refresh().await.unwrap();
    assert!(report.results["1"].is_ok());
    assert!(report.events.is_empty());
}

#[tokio::test]
async fn progress_failure_is_reported_per_backup() {
    let (server, sim) = SimulatedServer::new();
    sim.set_backup(Simulator::backup("1", "Documents", BackupMetadata::default()));
    let monitor = BackupMonitor::new(Arc::new(server), ["1"]);

    sim.fail_progress(Some(Error::Connection("timed out".into())));
    let report = monitor.refresh().await.unwrap();
    assert!(matches!(report.results["1"], Err(Error::Connection(_))));
    assert!(report.events.is_empty());
}

#[tokio::test]
async fn auth_failure_aborts_the_whole_refresh() {
    let (server, sim) = SimulatedServer::new();
    sim.set_backup(Simulator::backup("1", "Documents", BackupMetadata::default()));
    let monitor = BackupMonitor::new(Arc::new(server), ["1"]);

    sim.fail_listing(Some(Error::Auth("password rejected".into())));
    let err = monitor.refresh().await.unwrap_err();
    assert!(err.is_terminal());
    assert_eq!(err, Error::Auth("password rejected".into()));
}

#[tokio::test]
async fn repeated_polls_of_stable_state_are_quiet() {
    let (server, sim) = SimulatedServer::new();
    sim.set_backup(Simulator::backup(
        "1",
        "Documents",
        meta("20240601T100000Z", "20240601T103000Z"),
    ));
    let monitor = BackupMonitor::new(Arc::new(server), ["1"]);

    let first = monitor.refresh().await.unwrap();
    for _ in 0..3 {
        let report = monitor.refresh().await.unwrap();
        assert!(report.events.is_empty());
        assert_eq!(report.results["1"], first.results["1"]);
    }
}
