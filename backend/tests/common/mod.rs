#![allow(dead_code)]

use async_trait::async_trait;
use fall_sentinel::alert::EmergencyDispatcher;
use fall_sentinel::collaborators::{
    AlertPresenter, ContactDirectory, LocationProvider, MessageSender, StaticContacts,
};
use fall_sentinel::config::AlertConfig;
use fall_sentinel::model::{AlertTrigger, EmergencyContact, Location};
use fall_sentinel::{Result, SentinelError};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

pub fn contacts() -> Vec<EmergencyContact> {
    vec![
        EmergencyContact::new("Ana", "+15550001"),
        EmergencyContact::new("Ben", "+15550002"),
        EmergencyContact::new("Chen", "+15550003"),
    ]
}

/// Records every attempt; numbers in `failing` error out, numbers in `hanging` never answer.
#[derive(Default)]
pub struct RecordingSender {
    pub attempts: Mutex<Vec<(String, String)>>,
    pub failing: HashSet<String>,
    pub hanging: HashSet<String>,
}

impl RecordingSender {
    pub fn failing(numbers: &[&str]) -> Self {
        Self {
            failing: numbers.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn hanging(numbers: &[&str]) -> Self {
        Self {
            hanging: numbers.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn attempted_numbers(&self) -> Vec<String> {
        let mut numbers: Vec<_> = self.attempts.lock().iter().map(|(n, _)| n.clone()).collect();
        numbers.sort();
        numbers
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send_emergency_message(&self, phone_number: &str, text: &str) -> Result<()> {
        self.attempts
            .lock()
            .push((phone_number.to_string(), text.to_string()));
        if self.hanging.contains(phone_number) {
            std::future::pending::<()>().await;
        }
        if self.failing.contains(phone_number) {
            return Err(SentinelError::send_failed(phone_number, "carrier rejected"));
        }
        Ok(())
    }
}

pub enum FakeLocation {
    Known(Location),
    Failing,
    Hanging,
}

#[async_trait]
impl LocationProvider for FakeLocation {
    async fn last_known_location(&self) -> Result<Option<Location>> {
        match self {
            Self::Known(location) => Ok(Some(*location)),
            Self::Failing => Err(SentinelError::LocationUnavailable("gps off".to_string())),
            Self::Hanging => {
                std::future::pending::<()>().await;
                Ok(None)
            }
        }
    }
}

pub struct BrokenDirectory;

#[async_trait]
impl ContactDirectory for BrokenDirectory {
    async fn emergency_contacts(&self) -> Result<Vec<EmergencyContact>> {
        Err(SentinelError::ContactsUnavailable("database locked".to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shown {
    Started(u32),
    Tick(u32),
    Cancelled,
    Dispatched { notified: u32, attempted: u32 },
}

#[derive(Default)]
pub struct RecordingPresenter {
    pub shown: Mutex<Vec<Shown>>,
}

impl RecordingPresenter {
    pub fn shown(&self) -> Vec<Shown> {
        self.shown.lock().clone()
    }
}

impl AlertPresenter for RecordingPresenter {
    fn countdown_started(&self, _trigger: &AlertTrigger, seconds: u32) {
        self.shown.lock().push(Shown::Started(seconds));
    }

    fn countdown_tick(&self, remaining_secs: u32) {
        self.shown.lock().push(Shown::Tick(remaining_secs));
    }

    fn alert_cancelled(&self) {
        self.shown.lock().push(Shown::Cancelled);
    }

    fn alert_dispatched(&self, notified: u32, attempted: u32) {
        self.shown.lock().push(Shown::Dispatched { notified, attempted });
    }
}

pub fn alert_config() -> AlertConfig {
    AlertConfig {
        countdown_secs: 5,
        tick: Duration::from_secs(1),
        location_timeout: Duration::from_secs(3),
        send_timeout: Duration::from_secs(10),
    }
}

pub fn dispatcher(
    location: FakeLocation,
    sender: Arc<RecordingSender>,
    presenter: Arc<RecordingPresenter>,
) -> EmergencyDispatcher {
    EmergencyDispatcher::new(
        alert_config(),
        Arc::new(location),
        Arc::new(StaticContacts(contacts())),
        sender,
        presenter,
    )
}
