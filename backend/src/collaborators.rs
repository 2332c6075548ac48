//! Boundary of the emergency flow.
//!
//! The detector never talks to the platform directly; these traits are what a
//! host implements to plug in real location services, address books and
//! message gateways.

use crate::error::{Result, SentinelError};
use crate::model::{AlertTrigger, EmergencyContact, Location};
use async_trait::async_trait;

#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Best effort. `Ok(None)` when no fix has ever been recorded.
    async fn last_known_location(&self) -> Result<Option<Location>>;
}

#[async_trait]
pub trait ContactDirectory: Send + Sync {
    async fn emergency_contacts(&self) -> Result<Vec<EmergencyContact>>;
}

#[async_trait]
pub trait MessageSender: Send + Sync {
    fn name(&self) -> &str;

    async fn send_emergency_message(&self, phone_number: &str, text: &str) -> Result<()>;
}

/// The user-facing side of the grace period.
pub trait AlertPresenter: Send + Sync {
    fn countdown_started(&self, trigger: &AlertTrigger, seconds: u32);

    fn countdown_tick(&self, remaining_secs: u32);

    fn alert_cancelled(&self);

    fn alert_dispatched(&self, notified: u32, attempted: u32);
}

/// Location fixed at startup, e.g. a home address from configuration.
pub struct StaticLocation(pub Option<Location>);

#[async_trait]
impl LocationProvider for StaticLocation {
    async fn last_known_location(&self) -> Result<Option<Location>> {
        Ok(self.0)
    }
}

pub struct StaticContacts(pub Vec<EmergencyContact>);

#[async_trait]
impl ContactDirectory for StaticContacts {
    async fn emergency_contacts(&self) -> Result<Vec<EmergencyContact>> {
        if self.0.is_empty() {
            return Err(SentinelError::ContactsUnavailable(
                "no emergency contacts registered".to_string(),
            ));
        }
        Ok(self.0.clone())
    }
}

/// Writes messages to the log instead of a carrier gateway.
pub struct LogMessageSender;

#[async_trait]
impl MessageSender for LogMessageSender {
    fn name(&self) -> &str {
        "log"
    }

    async fn send_emergency_message(&self, phone_number: &str, text: &str) -> Result<()> {
        tracing::info!(to = phone_number, message = text, "📨 Emergency message");
        Ok(())
    }
}

pub struct NoopPresenter;

impl AlertPresenter for NoopPresenter {
    fn countdown_started(&self, _trigger: &AlertTrigger, _seconds: u32) {}

    fn countdown_tick(&self, _remaining_secs: u32) {}

    fn alert_cancelled(&self) {}

    fn alert_dispatched(&self, _notified: u32, _attempted: u32) {}
}
