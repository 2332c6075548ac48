//! Runtime configuration.
//!
//! Everything is read from the environment (optionally seeded from a `.env`
//! file). Each tunable falls back to the default used on handsets, so an empty
//! environment yields a working gateway with no contacts.

use crate::error::{Result, SentinelError};
use crate::model::{EmergencyContact, Location};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Standard gravity used by the inactivity check (m/s²).
pub const GRAVITY: f64 = 9.8;

/// Thresholds and timers of the fall state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Upward crossing of this magnitude opens an episode (m/s²).
    pub fall_threshold: f64,
    /// Peak magnitude at or above this is reported as a hard impact (m/s²).
    pub impact_threshold: f64,
    /// Allowed deviation from [`GRAVITY`] while lying still (m/s²).
    pub inactivity_threshold: f64,
    pub inactivity_duration_ms: i64,
    /// Gyroscope magnitude that counts as a change of orientation (rad/s).
    pub orientation_rotation_threshold: f64,
    pub episode_timeout_ms: i64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            fall_threshold: 15.0,
            impact_threshold: 20.0,
            inactivity_threshold: 0.8,
            inactivity_duration_ms: 2_000,
            orientation_rotation_threshold: 1.5,
            episode_timeout_ms: 10_000,
        }
    }
}

impl DetectorConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            fall_threshold: env_or("FALL_THRESHOLD", defaults.fall_threshold)?,
            impact_threshold: env_or("IMPACT_THRESHOLD", defaults.impact_threshold)?,
            inactivity_threshold: env_or("INACTIVITY_THRESHOLD", defaults.inactivity_threshold)?,
            inactivity_duration_ms: env_or(
                "INACTIVITY_DURATION_MS",
                defaults.inactivity_duration_ms,
            )?,
            orientation_rotation_threshold: env_or(
                "ORIENTATION_ROTATION_THRESHOLD",
                defaults.orientation_rotation_threshold,
            )?,
            episode_timeout_ms: env_or("EPISODE_TIMEOUT_MS", defaults.episode_timeout_ms)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("fall_threshold", self.fall_threshold),
            ("impact_threshold", self.impact_threshold),
            ("inactivity_threshold", self.inactivity_threshold),
            ("orientation_rotation_threshold", self.orientation_rotation_threshold),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(SentinelError::config(format!("{name} must be positive, got {value}")));
            }
        }
        if self.inactivity_duration_ms <= 0 || self.episode_timeout_ms <= 0 {
            return Err(SentinelError::config("detector durations must be positive"));
        }
        if self.inactivity_duration_ms >= self.episode_timeout_ms {
            return Err(SentinelError::config(
                "inactivity duration must be shorter than the episode timeout",
            ));
        }
        Ok(())
    }
}

/// Grace period and I/O budgets of the emergency flow.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertConfig {
    /// Number of countdown ticks before contacts are notified.
    pub countdown_secs: u32,
    pub tick: Duration,
    pub location_timeout: Duration,
    /// Budget for each contact independently.
    pub send_timeout: Duration,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            countdown_secs: 5,
            tick: Duration::from_secs(1),
            location_timeout: Duration::from_secs(3),
            send_timeout: Duration::from_secs(10),
        }
    }
}

impl AlertConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            countdown_secs: env_or("ALERT_COUNTDOWN_SECS", defaults.countdown_secs)?,
            tick: defaults.tick,
            location_timeout: Duration::from_millis(env_or(
                "LOCATION_TIMEOUT_MS",
                defaults.location_timeout.as_millis() as u64,
            )?),
            send_timeout: Duration::from_millis(env_or(
                "SEND_TIMEOUT_MS",
                defaults.send_timeout.as_millis() as u64,
            )?),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.countdown_secs == 0 {
            return Err(SentinelError::config(
                "alert countdown must be at least one second",
            ));
        }
        let budgets = [
            ("tick", self.tick),
            ("location_timeout", self.location_timeout),
            ("send_timeout", self.send_timeout),
        ];
        for (name, value) in budgets {
            if value.is_zero() {
                return Err(SentinelError::config(format!("{name} must be non-zero")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SentinelConfig {
    pub host: String,
    pub port: u16,
    /// Incidents are kept in memory when unset.
    pub database_url: Option<String>,
    pub contacts: Vec<EmergencyContact>,
    pub last_known_location: Option<Location>,
    pub detector: DetectorConfig,
    pub alert: AlertConfig,
}

impl SentinelConfig {
    pub fn from_env() -> Result<Self> {
        let contacts = match env::var("EMERGENCY_CONTACTS") {
            Ok(raw) => parse_contacts(&raw)?,
            Err(_) => Vec::new(),
        };
        let last_known_location = match env::var("LAST_KNOWN_LOCATION") {
            Ok(raw) => Some(parse_location(&raw)?),
            Err(_) => None,
        };

        Ok(Self {
            host: env::var("SENTINEL_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("SENTINEL_PORT", 8080)?,
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            contacts,
            last_known_location,
            detector: DetectorConfig::from_env()?,
            alert: AlertConfig::from_env()?,
        })
    }
}

/// `[{"name": "...", "phone_number": "..."}]`
pub fn parse_contacts(raw: &str) -> Result<Vec<EmergencyContact>> {
    let contacts: Vec<EmergencyContact> = serde_json::from_str(raw)?;
    if let Some(bad) = contacts.iter().find(|c| c.phone_number.trim().is_empty()) {
        return Err(SentinelError::config(format!(
            "contact {} has no phone number",
            bad.name
        )));
    }
    Ok(contacts)
}

/// `"lat,lon"`
pub fn parse_location(raw: &str) -> Result<Location> {
    let (lat, lon) = raw
        .split_once(',')
        .ok_or_else(|| SentinelError::config(format!("expected `lat,lon`, got {raw:?}")))?;
    let parse = |part: &str| {
        part.trim()
            .parse::<f64>()
            .map_err(|e| SentinelError::config(format!("bad coordinate {part:?}: {e}")))
    };
    let location = Location::new(parse(lat)?, parse(lon)?);
    if !(-90.0..=90.0).contains(&location.latitude)
        || !(-180.0..=180.0).contains(&location.longitude)
    {
        return Err(SentinelError::config(format!("coordinates out of range: {raw}")));
    }
    Ok(location)
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| SentinelError::config(format!("{key}={raw:?}: {e}"))),
        Err(_) => Ok(default),
    }
}
