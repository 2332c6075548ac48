mod common;

use common::{dispatcher, BrokenDirectory, FakeLocation, RecordingPresenter, RecordingSender, Shown};
use fall_sentinel::alert::{AlertOutcome, EmergencyDispatcher};
use fall_sentinel::model::{AlertKind, AlertTrigger, IncidentStatus, Location, Severity};
use fall_sentinel::store::{IncidentStore, MemoryIncidentStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

fn fall() -> AlertTrigger {
    AlertTrigger {
        kind: AlertKind::Fall,
        severity: Severity::Fall,
        detected_at: chrono::Utc::now(),
        peak_magnitude: Some(16.2),
    }
}

fn dispatched(outcome: AlertOutcome) -> fall_sentinel::alert::DispatchReport {
    match outcome {
        AlertOutcome::Dispatched(report) => report,
        other => panic!("expected dispatch, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn notifies_every_contact_after_full_countdown() {
    let sender = Arc::new(RecordingSender::default());
    let presenter = Arc::new(RecordingPresenter::default());
    let location = Location::new(6.9271, 79.8612);
    let dispatcher = dispatcher(FakeLocation::Known(location), sender.clone(), presenter.clone());

    let started = Instant::now();
    let report = dispatched(dispatcher.run(fall()).await);

    assert!(started.elapsed() >= Duration::from_secs(5));
    assert_eq!(sender.attempted_numbers(), vec!["+15550001", "+15550002", "+15550003"]);
    assert_eq!(report.notified(), 3);
    assert_eq!(report.location, Some(location));
    assert!(sender
        .attempts
        .lock()
        .iter()
        .all(|(_, text)| text.contains("https://maps.google.com/?q=6.927100,79.861200")));

    assert_eq!(
        presenter.shown(),
        vec![
            Shown::Started(5),
            Shown::Tick(5),
            Shown::Tick(4),
            Shown::Tick(3),
            Shown::Tick(2),
            Shown::Tick(1),
            Shown::Dispatched { notified: 3, attempted: 3 },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn location_failure_does_not_block_notifications() {
    let sender = Arc::new(RecordingSender::default());
    let dispatcher = dispatcher(FakeLocation::Failing, sender.clone(), Arc::default());

    let report = dispatched(dispatcher.run(fall()).await);

    assert_eq!(report.location, None);
    assert_eq!(sender.attempted_numbers().len(), 3);
    assert!(report.message.ends_with("Location unavailable."));
}

#[tokio::test(start_paused = true)]
async fn hanging_location_lookup_times_out() {
    let sender = Arc::new(RecordingSender::default());
    let dispatcher = dispatcher(FakeLocation::Hanging, sender.clone(), Arc::default());

    let started = Instant::now();
    let report = dispatched(dispatcher.run(fall()).await);

    // 5s countdown + 3s location budget
    assert!(started.elapsed() >= Duration::from_secs(8));
    assert!(started.elapsed() < Duration::from_secs(9));
    assert_eq!(report.location, None);
    assert_eq!(report.notified(), 3);
}

#[tokio::test(start_paused = true)]
async fn one_failing_contact_does_not_stop_the_others() {
    let sender = Arc::new(RecordingSender::failing(&["+15550002"]));
    let dispatcher = dispatcher(FakeLocation::Failing, sender.clone(), Arc::default());

    let report = dispatched(dispatcher.run(fall()).await);

    assert_eq!(sender.attempted_numbers(), vec!["+15550001", "+15550002", "+15550003"]);
    assert_eq!(report.attempted(), 3);
    assert_eq!(report.notified(), 2);
    let failed: Vec<_> = report
        .deliveries
        .iter()
        .filter(|d| d.error.is_some())
        .map(|d| d.contact.name.as_str())
        .collect();
    assert_eq!(failed, vec!["Ben"]);
}

#[tokio::test(start_paused = true)]
async fn slow_contact_is_abandoned_after_its_own_timeout() {
    let sender = Arc::new(RecordingSender::hanging(&["+15550002"]));
    let dispatcher = dispatcher(FakeLocation::Failing, sender.clone(), Arc::default());

    let started = Instant::now();
    let report = dispatched(dispatcher.run(fall()).await);

    assert!(started.elapsed() < Duration::from_secs(16));
    assert_eq!(report.notified(), 2);
    let ben = report
        .deliveries
        .iter()
        .find(|d| d.contact.name == "Ben")
        .unwrap();
    assert!(ben.error.as_deref().unwrap().contains("timed out"));
}

#[tokio::test(start_paused = true)]
async fn cancelling_mid_countdown_sends_nothing() {
    let sender = Arc::new(RecordingSender::default());
    let presenter = Arc::new(RecordingPresenter::default());
    let dispatcher = dispatcher(FakeLocation::Failing, sender.clone(), presenter.clone());
    let flag = dispatcher.cancel_flag();

    let (outcome, _) = tokio::join!(dispatcher.run(fall()), async {
        sleep(Duration::from_millis(2_500)).await;
        flag.cancel();
    });

    assert!(matches!(outcome, AlertOutcome::Cancelled { remaining_secs: 2 }));
    assert!(sender.attempts.lock().is_empty());
    assert_eq!(presenter.shown().last(), Some(&Shown::Cancelled));
    assert!(dispatcher.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn cancelling_during_the_last_tick_still_wins() {
    let sender = Arc::new(RecordingSender::default());
    let dispatcher = dispatcher(FakeLocation::Failing, sender.clone(), Arc::default());
    let flag = dispatcher.cancel_flag();

    // After the final per-tick check, before the countdown ends.
    let (outcome, _) = tokio::join!(dispatcher.run(fall()), async {
        sleep(Duration::from_millis(4_500)).await;
        flag.cancel();
    });

    assert!(matches!(outcome, AlertOutcome::Cancelled { remaining_secs: 0 }));
    assert!(sender.attempts.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_set_before_the_countdown_is_honoured() {
    let sender = Arc::new(RecordingSender::default());
    let presenter = Arc::new(RecordingPresenter::default());
    let dispatcher = dispatcher(FakeLocation::Failing, sender.clone(), presenter.clone());

    dispatcher.cancel();
    let outcome = dispatcher.run(fall()).await;

    assert!(matches!(outcome, AlertOutcome::Cancelled { remaining_secs: 5 }));
    assert!(sender.attempts.lock().is_empty());
    assert_eq!(presenter.shown(), vec![Shown::Started(5), Shown::Cancelled]);
}

#[tokio::test(start_paused = true)]
async fn unreachable_directory_degrades_to_no_sends() {
    let sender = Arc::new(RecordingSender::default());
    let dispatcher = EmergencyDispatcher::new(
        common::alert_config(),
        Arc::new(FakeLocation::Failing),
        Arc::new(BrokenDirectory),
        sender.clone(),
        Arc::new(RecordingPresenter::default()),
    );

    let report = dispatched(dispatcher.run(fall()).await);
    assert_eq!(report.attempted(), 0);
    assert!(sender.attempts.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn incidents_are_recorded_for_both_outcomes() {
    let store = Arc::new(MemoryIncidentStore::default());
    let sender = Arc::new(RecordingSender::failing(&["+15550003"]));
    let dispatcher = dispatcher(
        FakeLocation::Known(Location::new(1.0, 2.0)),
        sender,
        Arc::default(),
    )
    .with_incident_store(store.clone());

    dispatched(dispatcher.run(fall()).await);

    let flag = dispatcher.cancel_flag();
    let (outcome, _) = tokio::join!(dispatcher.run(AlertTrigger::manual_test()), async {
        sleep(Duration::from_millis(500)).await;
        flag.cancel();
    });
    assert!(matches!(outcome, AlertOutcome::Cancelled { .. }));

    let recent = store.recent(10).await.unwrap();
    assert_eq!(recent.len(), 2);

    assert_eq!(recent[0].status, IncidentStatus::Cancelled);
    assert_eq!(recent[0].kind, AlertKind::ManualTest);
    assert_eq!(recent[0].contacts_attempted, 0);

    assert_eq!(recent[1].status, IncidentStatus::Dispatched);
    assert_eq!(recent[1].contacts_attempted, 3);
    assert_eq!(recent[1].contacts_notified, 2);
    assert_eq!(recent[1].location, Some(Location::new(1.0, 2.0)));
    assert_eq!(recent[1].peak_magnitude, Some(16.2));
}
