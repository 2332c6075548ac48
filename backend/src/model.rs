use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// 1. INPUT: Motion samples (accelerometer in m/s², gyroscope in rad/s)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Accelerometer,
    Gyroscope,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct MotionSample {
    #[serde(rename = "sensor")]
    pub kind: SensorKind,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Milliseconds, monotonic per stream.
    #[serde(rename = "t")]
    pub timestamp_ms: i64,
}

impl MotionSample {
    pub fn accelerometer(x: f64, y: f64, z: f64, timestamp_ms: i64) -> Self {
        Self {
            kind: SensorKind::Accelerometer,
            x,
            y,
            z,
            timestamp_ms,
        }
    }

    pub fn gyroscope(x: f64, y: f64, z: f64, timestamp_ms: i64) -> Self {
        Self {
            kind: SensorKind::Gyroscope,
            x,
            y,
            z,
            timestamp_ms,
        }
    }

    /// Euclidean norm of the vector.
    pub fn magnitude(&self) -> f64 {
        (self.x.powi(2) + self.y.powi(2) + self.z.powi(2)).sqrt()
    }
}

// 2. STATE: Snapshot of the detector's working set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionPhase {
    Idle,
    Potential,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FallDetectionState {
    pub phase: DetectionPhase,
    pub acceleration_magnitude: f64,
    pub previous_acceleration_magnitude: f64,
    pub potential_fall_detected_at: Option<i64>,
    pub orientation_changed: bool,
    pub is_inactive: bool,
    pub inactivity_started_at: Option<i64>,
    pub confirmed: bool,
    pub alert_cancelled: bool,
}

// 3. COLLABORATOR DATA: Location and contacts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_m: Option<f32>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_m: None,
        }
    }

    pub fn maps_url(&self) -> String {
        format!(
            "https://maps.google.com/?q={:.6},{:.6}",
            self.latitude, self.longitude
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub phone_number: String,
}

impl EmergencyContact {
    pub fn new(name: impl Into<String>, phone_number: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone_number: phone_number.into(),
        }
    }
}

// 4. ALERTS: What started the emergency flow and how bad it looked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Fall,
    ManualTest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Fall,
    HardImpact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Dispatched,
    Cancelled,
}

macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!("unknown {}: {other}", stringify!($ty))),
                }
            }
        }
    };
}

text_enum!(AlertKind { Fall => "fall", ManualTest => "manual_test" });
text_enum!(Severity { Fall => "fall", HardImpact => "hard_impact" });
text_enum!(IncidentStatus { Dispatched => "dispatched", Cancelled => "cancelled" });

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AlertTrigger {
    pub kind: AlertKind,
    pub severity: Severity,
    pub detected_at: DateTime<Utc>,
    pub peak_magnitude: Option<f64>,
}

impl AlertTrigger {
    pub fn manual_test() -> Self {
        Self {
            kind: AlertKind::ManualTest,
            severity: Severity::Fall,
            detected_at: Utc::now(),
            peak_magnitude: None,
        }
    }
}

// 5. RECORDS: Incident history
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Incident {
    pub id: Uuid,
    pub kind: AlertKind,
    pub status: IncidentStatus,
    pub severity: Severity,
    pub detected_at: DateTime<Utc>,
    pub peak_magnitude: Option<f64>,
    pub location: Option<Location>,
    pub contacts_attempted: u32,
    pub contacts_notified: u32,
}

// 6. INPUT: Client Command (Frontend Buttons)
#[derive(Debug, Deserialize)]
pub struct ClientCommand {
    pub action: String,
}
