//! Sensor subscription.

use crate::error::{Result, SentinelError};
use crate::model::{MotionSample, SensorKind};
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;

pub type SampleStream = BoxStream<'static, MotionSample>;

pub trait SensorSource: Send + Sync {
    /// Fails with [`SentinelError::SensorUnavailable`] when the host has no
    /// such sensor or it was already claimed.
    fn subscribe(&self, kind: SensorKind) -> Result<SampleStream>;
}

/// In-process source fed through a [`SensorFeed`].
pub struct ChannelSensorSource {
    accelerometer: Mutex<Option<mpsc::UnboundedReceiver<MotionSample>>>,
    gyroscope: Mutex<Option<mpsc::UnboundedReceiver<MotionSample>>>,
}

/// Producer side: routes each sample to the stream of its sensor.
#[derive(Clone)]
pub struct SensorFeed {
    accelerometer: mpsc::UnboundedSender<MotionSample>,
    gyroscope: mpsc::UnboundedSender<MotionSample>,
}

impl ChannelSensorSource {
    pub fn channel() -> (Self, SensorFeed) {
        let (accel_tx, accel_rx) = mpsc::unbounded_channel();
        let (gyro_tx, gyro_rx) = mpsc::unbounded_channel();
        let source = Self {
            accelerometer: Mutex::new(Some(accel_rx)),
            gyroscope: Mutex::new(Some(gyro_rx)),
        };
        let feed = SensorFeed {
            accelerometer: accel_tx,
            gyroscope: gyro_tx,
        };
        (source, feed)
    }

    /// Source for a device without a gyroscope.
    pub fn accelerometer_only() -> (Self, SensorFeed) {
        let (source, feed) = Self::channel();
        source.gyroscope.lock().take();
        (source, feed)
    }
}

impl SensorSource for ChannelSensorSource {
    fn subscribe(&self, kind: SensorKind) -> Result<SampleStream> {
        let slot = match kind {
            SensorKind::Accelerometer => &self.accelerometer,
            SensorKind::Gyroscope => &self.gyroscope,
        };
        let rx = slot
            .lock()
            .take()
            .ok_or(SentinelError::SensorUnavailable(kind))?;

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|sample| (sample, rx))
        });
        Ok(stream.boxed())
    }
}

impl SensorFeed {
    /// Returns `false` once the monitor has stopped listening.
    pub fn push(&self, sample: MotionSample) -> bool {
        let tx = match sample.kind {
            SensorKind::Accelerometer => &self.accelerometer,
            SensorKind::Gyroscope => &self.gyroscope,
        };
        tx.send(sample).is_ok()
    }
}
