//! Emergency-alert flow: grace-period countdown, then contact fan-out.

use crate::collaborators::{AlertPresenter, ContactDirectory, LocationProvider, MessageSender};
use crate::config::AlertConfig;
use crate::error::SentinelError;
use crate::model::{
    AlertKind, AlertTrigger, EmergencyContact, Incident, IncidentStatus, Location, Severity,
};
use crate::store::IncidentStore;
use futures_util::future::join_all;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, timeout};
use uuid::Uuid;

/// User override shared between the countdown task and whoever cancels.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Delivery {
    pub contact: EmergencyContact,
    /// `None` on success.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub incident_id: Uuid,
    pub location: Option<Location>,
    pub message: String,
    pub deliveries: Vec<Delivery>,
}

impl DispatchReport {
    pub fn attempted(&self) -> u32 {
        self.deliveries.len() as u32
    }

    pub fn notified(&self) -> u32 {
        self.deliveries.iter().filter(|d| d.error.is_none()).count() as u32
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AlertOutcome {
    Cancelled { remaining_secs: u32 },
    Dispatched(DispatchReport),
}

pub struct EmergencyDispatcher {
    config: AlertConfig,
    location: Arc<dyn LocationProvider>,
    contacts: Arc<dyn ContactDirectory>,
    sender: Arc<dyn MessageSender>,
    presenter: Arc<dyn AlertPresenter>,
    incidents: Option<Arc<dyn IncidentStore>>,
    cancelled: CancelFlag,
}

impl EmergencyDispatcher {
    pub fn new(
        config: AlertConfig,
        location: Arc<dyn LocationProvider>,
        contacts: Arc<dyn ContactDirectory>,
        sender: Arc<dyn MessageSender>,
        presenter: Arc<dyn AlertPresenter>,
    ) -> Self {
        Self {
            config,
            location,
            contacts,
            sender,
            presenter,
            incidents: None,
            cancelled: CancelFlag::default(),
        }
    }

    pub fn with_incident_store(mut self, store: Arc<dyn IncidentStore>) -> Self {
        self.incidents = Some(store);
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancelled.clone()
    }

    pub fn cancel(&self) {
        self.cancelled.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.is_cancelled()
    }

    /// Drops a stale cancellation. Must happen before the flow is handed to
    /// a task, so a cancel issued in between is kept.
    pub(crate) fn arm(&self) {
        self.cancelled.clear();
    }

    /// Runs the countdown and, unless cancelled, notifies every contact.
    ///
    /// A cancellation already set when this starts aborts before the first tick.
    pub async fn run(&self, trigger: AlertTrigger) -> AlertOutcome {
        let seconds = self.config.countdown_secs;
        tracing::warn!(
            kind = %trigger.kind,
            severity = %trigger.severity,
            seconds,
            "Emergency countdown started"
        );
        self.presenter.countdown_started(&trigger, seconds);

        for remaining in (1..=seconds).rev() {
            if self.cancelled.is_cancelled() {
                return self.abort(&trigger, remaining).await;
            }
            self.presenter.countdown_tick(remaining);
            sleep(self.config.tick).await;
        }

        // Last chance before anything irreversible happens.
        if self.cancelled.is_cancelled() {
            return self.abort(&trigger, 0).await;
        }

        let report = self.dispatch(&trigger).await;
        self.presenter
            .alert_dispatched(report.notified(), report.attempted());
        self.record(&trigger, IncidentStatus::Dispatched, &report).await;
        AlertOutcome::Dispatched(report)
    }

    async fn abort(&self, trigger: &AlertTrigger, remaining_secs: u32) -> AlertOutcome {
        tracing::info!(remaining_secs, "🛡️ Emergency alert cancelled by user");
        self.presenter.alert_cancelled();
        let report = DispatchReport {
            incident_id: Uuid::new_v4(),
            location: None,
            message: String::new(),
            deliveries: Vec::new(),
        };
        self.record(trigger, IncidentStatus::Cancelled, &report).await;
        AlertOutcome::Cancelled { remaining_secs }
    }

    async fn dispatch(&self, trigger: &AlertTrigger) -> DispatchReport {
        let location = self.fetch_location().await;
        let message = compose_message(trigger, location.as_ref());

        let contacts = match self.contacts.emergency_contacts().await {
            Ok(contacts) => contacts,
            Err(e) => {
                tracing::error!(error = %e, "No contacts to notify");
                Vec::new()
            }
        };

        let sends = contacts.into_iter().map(|contact| {
            let message = message.as_str();
            async move {
                let result = timeout(
                    self.config.send_timeout,
                    self.sender
                        .send_emergency_message(&contact.phone_number, message),
                )
                .await
                .unwrap_or_else(|_| {
                    Err(SentinelError::send_failed(
                        contact.phone_number.clone(),
                        "timed out",
                    ))
                });

                let error = match result {
                    Ok(()) => {
                        tracing::info!(
                            contact = %contact.name,
                            sender = self.sender.name(),
                            "Emergency contact notified"
                        );
                        None
                    }
                    Err(e) => {
                        tracing::warn!(
                            contact = %contact.name,
                            error = %e,
                            "Failed to notify emergency contact"
                        );
                        Some(e.to_string())
                    }
                };
                Delivery { contact, error }
            }
        });
        let deliveries = join_all(sends).await;

        DispatchReport {
            incident_id: Uuid::new_v4(),
            location,
            message,
            deliveries,
        }
    }

    async fn fetch_location(&self) -> Option<Location> {
        match timeout(self.config.location_timeout, self.location.last_known_location()).await {
            Ok(Ok(location)) => location,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Proceeding without location");
                None
            }
            Err(_) => {
                tracing::warn!(
                    timeout = ?self.config.location_timeout,
                    "Location lookup timed out"
                );
                None
            }
        }
    }

    async fn record(
        &self,
        trigger: &AlertTrigger,
        status: IncidentStatus,
        report: &DispatchReport,
    ) {
        let Some(store) = &self.incidents else {
            return;
        };
        let incident = Incident {
            id: report.incident_id,
            kind: trigger.kind,
            status,
            severity: trigger.severity,
            detected_at: trigger.detected_at,
            peak_magnitude: trigger.peak_magnitude,
            location: report.location,
            contacts_attempted: report.attempted(),
            contacts_notified: report.notified(),
        };
        if let Err(e) = store.record(&incident).await {
            tracing::error!(incident_id = %incident.id, error = %e, "Failed to record incident");
        }
    }
}

pub fn compose_message(trigger: &AlertTrigger, location: Option<&Location>) -> String {
    let event = match (trigger.kind, trigger.severity) {
        (AlertKind::ManualTest, _) => {
            "TEST ALERT: This is a test of the fall detection emergency alert."
        }
        (AlertKind::Fall, Severity::HardImpact) => {
            "EMERGENCY: A hard fall was detected. I may be injured and need help."
        }
        (AlertKind::Fall, Severity::Fall) => "EMERGENCY: A fall was detected. I may need help.",
    };
    let when = trigger.detected_at.format("%Y-%m-%d %H:%M:%S UTC");

    match location {
        Some(location) => format!(
            "{event} Detected at {when}. My last known location: {}",
            location.maps_url()
        ),
        None => format!("{event} Detected at {when}. Location unavailable."),
    }
}
