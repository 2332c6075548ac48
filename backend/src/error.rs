//! Error types shared by the detector host, the alert flow and the gateway.

use crate::model::SensorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SentinelError {
    /// The host cannot deliver samples for this sensor.
    #[error("{0:?} sensor unavailable")]
    SensorUnavailable(SensorKind),

    #[error("location unavailable: {0}")]
    LocationUnavailable(String),

    #[error("contacts unavailable: {0}")]
    ContactsUnavailable(String),

    /// A single contact could not be reached.
    #[error("failed to send emergency message to {phone_number}: {reason}")]
    SendFailed { phone_number: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SentinelError>;

impl SentinelError {
    pub fn send_failed(phone_number: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SendFailed {
            phone_number: phone_number.into(),
            reason: reason.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
