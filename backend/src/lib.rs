//! Fall detection with a cancellable emergency alert.
//!
//! [`logic::FallDetector`] turns accelerometer and gyroscope samples into
//! confirmed falls. [`service::FallMonitor`] hosts it, and on confirmation runs
//! the [`alert::EmergencyDispatcher`] grace period before notifying every
//! emergency contact. [`server`] exposes the monitor over HTTP and WebSocket.

pub mod alert;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod sensors;
pub mod server;
pub mod service;
pub mod store;
pub mod websockets;


pub use error::{Result, SentinelError};
pub use logic::{DetectionEvent, FallDetector};
pub use model::{FallDetectionState, MotionSample, SensorKind};
pub use service::{FallMonitor, MonitorEvent};
