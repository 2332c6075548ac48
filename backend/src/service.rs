//! Host adapter around the detector.
//!
//! [`FallMonitor`] owns the detector behind a lock, so accelerometer and
//! gyroscope callbacks may interleave freely, and launches the emergency flow
//! at most once at a time.

use crate::alert::{AlertOutcome, EmergencyDispatcher};
use crate::collaborators::AlertPresenter;
use crate::logic::{DetectionEvent, FallDetector};
use crate::model::{AlertKind, AlertTrigger, FallDetectionState, MotionSample, SensorKind, Severity};
use crate::sensors::SensorSource;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Pushed to every connected client.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitorEvent {
    Validating { magnitude: f64 },
    OrientationChanged { rotation: f64 },
    InactivityConfirmed,
    EpisodeExpired,
    FallConfirmed { peak_magnitude: f64, severity: Severity },
    CountdownStarted { kind: AlertKind, seconds: u32 },
    CountdownTick { remaining_secs: u32 },
    AlertCancelled,
    AlertDispatched { notified: u32, attempted: u32 },
    MonitorDisabled { reason: String },
}

impl From<&DetectionEvent> for MonitorEvent {
    fn from(event: &DetectionEvent) -> Self {
        match *event {
            DetectionEvent::PotentialFall { magnitude, .. } => Self::Validating { magnitude },
            DetectionEvent::OrientationChanged { rotation } => {
                Self::OrientationChanged { rotation }
            }
            DetectionEvent::InactivityConfirmed { .. } => Self::InactivityConfirmed,
            DetectionEvent::EpisodeExpired { .. } => Self::EpisodeExpired,
            DetectionEvent::FallConfirmed {
                peak_magnitude,
                severity,
                ..
            } => Self::FallConfirmed {
                peak_magnitude,
                severity,
            },
        }
    }
}

/// Relays the countdown to clients over the event channel.
pub struct BroadcastPresenter {
    tx: broadcast::Sender<MonitorEvent>,
}

impl BroadcastPresenter {
    pub fn new(tx: broadcast::Sender<MonitorEvent>) -> Self {
        Self { tx }
    }
}

impl AlertPresenter for BroadcastPresenter {
    fn countdown_started(&self, trigger: &AlertTrigger, seconds: u32) {
        let _ = self.tx.send(MonitorEvent::CountdownStarted {
            kind: trigger.kind,
            seconds,
        });
    }

    fn countdown_tick(&self, remaining_secs: u32) {
        let _ = self.tx.send(MonitorEvent::CountdownTick { remaining_secs });
    }

    fn alert_cancelled(&self) {
        let _ = self.tx.send(MonitorEvent::AlertCancelled);
    }

    fn alert_dispatched(&self, notified: u32, attempted: u32) {
        let _ = self.tx.send(MonitorEvent::AlertDispatched {
            notified,
            attempted,
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorExit {
    /// A required sensor could not be subscribed; nothing was monitored.
    Disabled { reason: String },
    StreamsClosed,
}

pub struct FallMonitor {
    detector: Mutex<FallDetector>,
    dispatcher: Arc<EmergencyDispatcher>,
    events: broadcast::Sender<MonitorEvent>,
    alert_in_flight: Arc<AtomicBool>,
    enabled: AtomicBool,
}

impl FallMonitor {
    pub fn new(
        detector: FallDetector,
        dispatcher: EmergencyDispatcher,
        events: broadcast::Sender<MonitorEvent>,
    ) -> Self {
        Self {
            detector: Mutex::new(detector),
            dispatcher: Arc::new(dispatcher),
            events,
            alert_in_flight: Arc::new(AtomicBool::new(false)),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn is_alert_in_flight(&self) -> bool {
        self.alert_in_flight.load(Ordering::SeqCst)
    }

    /// Subscribes to both sensors and feeds the detector until the streams end.
    ///
    /// Without an accelerometer or gyroscope the monitor disables itself and
    /// returns immediately instead of failing the host.
    pub async fn run(&self, source: &dyn SensorSource) -> MonitorExit {
        let subscribed = source
            .subscribe(SensorKind::Accelerometer)
            .and_then(|accel| Ok((accel, source.subscribe(SensorKind::Gyroscope)?)));

        let (mut accel, mut gyro) = match subscribed {
            Ok(streams) => streams,
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(error = %reason, "⚠️ Fall detection disabled");
                self.enabled.store(false, Ordering::SeqCst);
                let _ = self.events.send(MonitorEvent::MonitorDisabled {
                    reason: reason.clone(),
                });
                return MonitorExit::Disabled { reason };
            }
        };

        tracing::info!("Fall monitor listening to accelerometer and gyroscope");
        let (mut accel_open, mut gyro_open) = (true, true);
        loop {
            tokio::select! {
                sample = accel.next(), if accel_open => match sample {
                    Some(sample) => { self.on_sample(&sample); }
                    None => accel_open = false,
                },
                sample = gyro.next(), if gyro_open => match sample {
                    Some(sample) => { self.on_sample(&sample); }
                    None => gyro_open = false,
                },
                else => break,
            }
        }

        tracing::info!("Sensor streams closed, fall monitor stopped");
        MonitorExit::StreamsClosed
    }

    /// Feeds one sample; starts the emergency flow when a fall is confirmed.
    pub fn on_sample(&self, sample: &MotionSample) -> Option<DetectionEvent> {
        if !self.is_enabled() {
            return None;
        }

        let event = self.detector.lock().process(sample)?;
        self.report(&event);

        if let DetectionEvent::FallConfirmed {
            started_at,
            peak_magnitude,
            severity,
        } = event
        {
            let detected_at =
                DateTime::<Utc>::from_timestamp_millis(started_at).unwrap_or_else(Utc::now);
            let _ = self.start_alert(AlertTrigger {
                kind: AlertKind::Fall,
                severity,
                detected_at,
                peak_magnitude: Some(peak_magnitude),
            });
        }
        Some(event)
    }

    /// Forces a confirmation as if a fall had been detected.
    pub fn trigger_test_alert(&self) -> Option<JoinHandle<AlertOutcome>> {
        let event = self
            .detector
            .lock()
            .force_confirm(Utc::now().timestamp_millis());
        tracing::info!("🧪 Manual test alert triggered");
        self.report(&event);
        self.start_alert(AlertTrigger::manual_test())
    }

    pub fn cancel_alert(&self) {
        tracing::info!("User requested alert cancellation");
        self.dispatcher.cancel();
    }

    pub fn reset(&self) {
        self.detector.lock().reset();
        tracing::info!("♻️ Detector reset");
    }

    pub fn snapshot(&self) -> FallDetectionState {
        self.detector
            .lock()
            .snapshot(self.dispatcher.is_cancelled())
    }

    fn report(&self, event: &DetectionEvent) {
        match event {
            DetectionEvent::PotentialFall { magnitude, .. } => {
                tracing::info!(magnitude = *magnitude, "🟡 Potential fall, validating");
            }
            DetectionEvent::EpisodeExpired { .. } => {
                tracing::info!("⚪ Episode expired without confirmation");
            }
            DetectionEvent::FallConfirmed {
                peak_magnitude,
                severity,
                ..
            } => {
                tracing::warn!(peak = *peak_magnitude, %severity, "🔴 Fall confirmed");
            }
            other => tracing::debug!(event = ?other, "Detector update"),
        }
        let _ = self.events.send(MonitorEvent::from(event));
    }

    fn start_alert(&self, trigger: AlertTrigger) -> Option<JoinHandle<AlertOutcome>> {
        if self.alert_in_flight.swap(true, Ordering::SeqCst) {
            tracing::warn!(kind = %trigger.kind, "Emergency alert already in progress, ignoring");
            return None;
        }
        let in_flight = InFlight(Arc::clone(&self.alert_in_flight));
        self.dispatcher.arm();

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::error!(error = %e, "No async runtime to run the emergency alert");
                return None;
            }
        };

        let dispatcher = Arc::clone(&self.dispatcher);
        Some(runtime.spawn(async move {
            let _in_flight = in_flight;
            dispatcher.run(trigger).await
        }))
    }
}

/// Releases the one-alert slot however the alert task ends, panics and aborts included.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
