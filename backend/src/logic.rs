use crate::config::{DetectorConfig, GRAVITY};
use crate::model::{DetectionPhase, FallDetectionState, MotionSample, SensorKind, Severity};

#[derive(Debug, Clone, PartialEq)]
pub enum DetectionEvent {
    /// Upward crossing of the fall threshold; an episode (re)started.
    PotentialFall { magnitude: f64, at: i64 },
    OrientationChanged { rotation: f64 },
    InactivityConfirmed { since: i64 },
    /// The episode ran out of time without both conditions holding.
    EpisodeExpired { started_at: i64 },
    FallConfirmed {
        started_at: i64,
        peak_magnitude: f64,
        severity: Severity,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum OrientationCheck {
    Pending,
    Changed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum InactivityCheck {
    Moving,
    Settling { since: i64 },
    Inactive { since: i64 },
}

/// Everything tracked between a spike and its confirmation or expiry.
#[derive(Debug, Clone)]
struct Episode {
    started_at: i64,
    peak_magnitude: f64,
    orientation: OrientationCheck,
    inactivity: InactivityCheck,
}

impl Episode {
    fn new(started_at: i64, magnitude: f64) -> Self {
        Self {
            started_at,
            peak_magnitude: magnitude,
            orientation: OrientationCheck::Pending,
            inactivity: InactivityCheck::Moving,
        }
    }

    fn is_confirmed(&self) -> bool {
        self.orientation == OrientationCheck::Changed
            && matches!(self.inactivity, InactivityCheck::Inactive { .. })
    }

    fn track_acceleration(
        &mut self,
        magnitude: f64,
        now: i64,
        config: &DetectorConfig,
    ) -> Option<DetectionEvent> {
        self.peak_magnitude = self.peak_magnitude.max(magnitude);

        // Inactive is sticky for the rest of the episode.
        let near_gravity = (magnitude - GRAVITY).abs() < config.inactivity_threshold;
        match self.inactivity {
            InactivityCheck::Inactive { .. } => None,
            InactivityCheck::Moving if near_gravity => {
                self.inactivity = InactivityCheck::Settling { since: now };
                None
            }
            InactivityCheck::Settling { since } if near_gravity => {
                if now.saturating_sub(since) >= config.inactivity_duration_ms {
                    self.inactivity = InactivityCheck::Inactive { since };
                    Some(DetectionEvent::InactivityConfirmed { since })
                } else {
                    None
                }
            }
            _ => {
                self.inactivity = InactivityCheck::Moving;
                None
            }
        }
    }

    fn track_rotation(&mut self, rotation: f64, config: &DetectorConfig) -> Option<DetectionEvent> {
        if self.orientation == OrientationCheck::Pending
            && rotation > config.orientation_rotation_threshold
        {
            self.orientation = OrientationCheck::Changed;
            return Some(DetectionEvent::OrientationChanged { rotation });
        }
        None
    }
}

enum State {
    Idle,
    Potential(Episode),
}

/// Impact / orientation / inactivity state machine.
///
/// The detector is clock-free: every decision uses the timestamps carried by
/// the samples, so replaying a recording reproduces the same transitions.
/// It is not synchronized; hosts feeding it from several streams must wrap it
/// in a lock (see [`crate::service::FallMonitor`]).
pub struct FallDetector {
    config: DetectorConfig,
    state: State,
    acceleration_magnitude: f64,
    previous_acceleration_magnitude: f64,
}

impl FallDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            state: State::Idle,
            acceleration_magnitude: 0.0,
            previous_acceleration_magnitude: 0.0,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn phase(&self) -> DetectionPhase {
        match self.state {
            State::Idle => DetectionPhase::Idle,
            State::Potential(_) => DetectionPhase::Potential,
        }
    }

    pub fn process(&mut self, sample: &MotionSample) -> Option<DetectionEvent> {
        let magnitude = sample.magnitude();
        if !magnitude.is_finite() {
            tracing::debug!(?sample, "dropping non-finite sample");
            return None;
        }
        let now = sample.timestamp_ms;

        if sample.kind == SensorKind::Accelerometer {
            self.previous_acceleration_magnitude = self.acceleration_magnitude;
            self.acceleration_magnitude = magnitude;

            let threshold = self.config.fall_threshold;
            if magnitude >= threshold && self.previous_acceleration_magnitude < threshold {
                // A spike inside an open episode restarts it.
                self.state = State::Potential(Episode::new(now, magnitude));
                return Some(DetectionEvent::PotentialFall { magnitude, at: now });
            }
        }

        let config = &self.config;
        let State::Potential(episode) = &mut self.state else {
            return None;
        };

        if now.saturating_sub(episode.started_at) > config.episode_timeout_ms {
            let started_at = episode.started_at;
            self.state = State::Idle;
            return Some(DetectionEvent::EpisodeExpired { started_at });
        }

        let event = match sample.kind {
            SensorKind::Accelerometer => episode.track_acceleration(magnitude, now, config),
            SensorKind::Gyroscope => episode.track_rotation(magnitude, config),
        };

        if episode.is_confirmed() {
            let started_at = episode.started_at;
            let peak_magnitude = episode.peak_magnitude;
            let severity = self.severity_for(peak_magnitude);
            self.state = State::Idle;
            return Some(DetectionEvent::FallConfirmed {
                started_at,
                peak_magnitude,
                severity,
            });
        }

        event
    }

    /// Forces a confirmation without sensor input (manual test hook).
    ///
    /// With no open episode there is no impact to report, so the peak is 0.
    pub fn force_confirm(&mut self, now: i64) -> DetectionEvent {
        let peak_magnitude = match &self.state {
            State::Potential(episode) => episode.peak_magnitude,
            State::Idle => 0.0,
        };
        self.state = State::Idle;
        DetectionEvent::FallConfirmed {
            started_at: now,
            peak_magnitude,
            severity: self.severity_for(peak_magnitude),
        }
    }

    pub fn reset(&mut self) {
        self.state = State::Idle;
    }

    pub fn snapshot(&self, alert_cancelled: bool) -> FallDetectionState {
        let (
            potential_fall_detected_at,
            orientation_changed,
            is_inactive,
            inactivity_started_at,
            confirmed,
        ) = match &self.state {
            State::Idle => (None, false, false, None, false),
            State::Potential(episode) => {
                let (inactive, since) = match episode.inactivity {
                    InactivityCheck::Moving => (false, None),
                    InactivityCheck::Settling { since } => (false, Some(since)),
                    InactivityCheck::Inactive { since } => (true, Some(since)),
                };
                (
                    Some(episode.started_at),
                    episode.orientation == OrientationCheck::Changed,
                    inactive,
                    since,
                    episode.is_confirmed(),
                )
            }
        };

        FallDetectionState {
            phase: self.phase(),
            acceleration_magnitude: self.acceleration_magnitude,
            previous_acceleration_magnitude: self.previous_acceleration_magnitude,
            potential_fall_detected_at,
            orientation_changed,
            is_inactive,
            inactivity_started_at,
            confirmed,
            alert_cancelled,
        }
    }

    fn severity_for(&self, peak_magnitude: f64) -> Severity {
        if peak_magnitude >= self.config.impact_threshold {
            Severity::HardImpact
        } else {
            Severity::Fall
        }
    }
}

impl Default for FallDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}
