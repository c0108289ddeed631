// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Adapter contracts for the platform sensor sources.
//!
//! Implementations live in the host platform layer. The core only relies on
//! the push contract: an adapter is started with a [`SensorSink`] and calls
//! [`SensorSink::push`] from whatever thread the platform delivers events
//! on; `push` never blocks and never panics.

use crate::data::{BarometerReading, MagnetometerReading, Position, SensorAvailability};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// One typed reading from a physical source.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorReading {
    Accelerometer([f64; 3]),
    Gyroscope([f64; 3]),
    Gravity([f64; 3]),
    /// Attitude quaternion `[x, y, z, w]` from the rotation-vector sensor.
    RotationVector([f64; 4]),
    Barometer(BarometerReading),
    Magnetometer(MagnetometerReading),
}

impl SensorReading {
    /// Whether this reading may trigger a sample emission. Barometer and
    /// magnetometer pushes only refresh the cached value.
    pub fn qualifies_for_emission(&self) -> bool {
        matches!(
            self,
            SensorReading::Accelerometer(_)
                | SensorReading::Gyroscope(_)
                | SensorReading::Gravity(_)
                | SensorReading::RotationVector(_)
        )
    }
}

/// A reading stamped with the sensor subsystem's monotonic clock
/// (nanoseconds since boot on Android).
#[derive(Debug, Clone, PartialEq)]
pub struct SensorEvent {
    pub elapsed_nanos: u64,
    pub reading: SensorReading,
}

/// Where adapters push their readings.
///
/// Cloneable and cheap; sends are lossy once the coordinator has shut down,
/// which is exactly the behavior a stopping session wants.
#[derive(Debug, Clone)]
pub struct SensorSink {
    tx: mpsc::UnboundedSender<SensorEvent>,
}

impl SensorSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<SensorEvent>) -> Self {
        Self { tx }
    }

    pub fn push(&self, event: SensorEvent) {
        let _ = self.tx.send(event);
    }
}

/// A push-style motion source (accelerometer, gyroscope, gravity,
/// rotation-vector, barometer, magnetometer).
pub trait MotionSensorAdapter: Send + Sync {
    /// Begin delivering readings into `sink`. Restartable: a second call
    /// replaces the previous sink.
    fn start(&self, sink: SensorSink);
    fn stop(&self);
    fn is_available(&self) -> bool;
}

/// Pull-style position source; the coordinator never waits on a fix, it
/// reads whatever the adapter last observed.
pub trait LocationAdapter: Send + Sync {
    fn start(&self, update_interval_ms: u64);
    fn stop(&self);
    fn is_available(&self) -> bool;
    fn last_known(&self) -> Option<Position>;
}

/// Motion-activity recognition source (walking, on_bicycle, in_vehicle...).
pub trait ActivityAdapter: Send + Sync {
    fn start(&self);
    fn stop(&self);
    fn is_available(&self) -> bool;
    fn latest_activity(&self) -> Option<String>;
}

/// The platform's sensor monotonic clock, on the same timebase as
/// [`SensorEvent::elapsed_nanos`].
pub trait SensorClock: Send + Sync {
    fn now_nanos(&self) -> u64;
}

/// Process-anchored default clock for platforms whose adapters stamp events
/// with [`Instant`]-derived values.
#[derive(Debug)]
pub struct SystemSensorClock {
    origin: Instant,
}

impl SystemSensorClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemSensorClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorClock for SystemSensorClock {
    fn now_nanos(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }
}

/// The set of adapters wired up by the host for one device.
///
/// Any adapter may be absent or unavailable; the coordinator records
/// whatever the device can produce and the availability bitset tells the
/// backend which fields to expect.
#[derive(Clone, Default)]
pub struct SensorSuite {
    pub accelerometer: Option<Arc<dyn MotionSensorAdapter>>,
    pub gyroscope: Option<Arc<dyn MotionSensorAdapter>>,
    pub gravity: Option<Arc<dyn MotionSensorAdapter>>,
    pub rotation_vector: Option<Arc<dyn MotionSensorAdapter>>,
    pub barometer: Option<Arc<dyn MotionSensorAdapter>>,
    pub magnetometer: Option<Arc<dyn MotionSensorAdapter>>,
    pub location: Option<Arc<dyn LocationAdapter>>,
    pub activity: Option<Arc<dyn ActivityAdapter>>,
}

impl SensorSuite {
    fn motion_adapters(&self) -> impl Iterator<Item = &Arc<dyn MotionSensorAdapter>> {
        [
            self.accelerometer.as_ref(),
            self.gyroscope.as_ref(),
            self.gravity.as_ref(),
            self.rotation_vector.as_ref(),
            self.barometer.as_ref(),
            self.magnetometer.as_ref(),
        ]
        .into_iter()
        .flatten()
    }

    /// Availability bitset, computed once at session start.
    pub fn availability(&self) -> SensorAvailability {
        let available =
            |adapter: &Option<Arc<dyn MotionSensorAdapter>>| -> bool {
                adapter.as_ref().is_some_and(|a| a.is_available())
            };
        SensorAvailability {
            has_accelerometer: available(&self.accelerometer),
            has_gyroscope: available(&self.gyroscope),
            has_gravity: available(&self.gravity),
            has_rotation_vector: available(&self.rotation_vector),
            has_barometer: available(&self.barometer),
            has_magnetometer: available(&self.magnetometer),
            has_gps: self.location.as_ref().is_some_and(|a| a.is_available()),
        }
    }

    pub fn start_all(&self, sink: &SensorSink, location_update_ms: u64) {
        for adapter in self.motion_adapters() {
            if adapter.is_available() {
                adapter.start(sink.clone());
            }
        }
        if let Some(location) = &self.location {
            if location.is_available() {
                location.start(location_update_ms);
            }
        }
        if let Some(activity) = &self.activity {
            if activity.is_available() {
                activity.start();
            }
        }
    }

    pub fn stop_all(&self) {
        for adapter in self.motion_adapters() {
            adapter.stop();
        }
        if let Some(location) = &self.location {
            location.stop();
        }
        if let Some(activity) = &self.activity {
            activity.stop();
        }
    }

    pub fn last_known_position(&self) -> Option<Position> {
        self.location.as_ref().and_then(|a| a.last_known())
    }

    pub fn latest_activity(&self) -> Option<String> {
        self.activity.as_ref().and_then(|a| a.latest_activity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    struct StubMotion {
        available: bool,
        starts: AtomicU32,
        stopped: AtomicBool,
    }

    impl StubMotion {
        fn new(available: bool) -> Arc<Self> {
            Arc::new(Self {
                available,
                starts: AtomicU32::new(0),
                stopped: AtomicBool::new(false),
            })
        }
    }

    impl MotionSensorAdapter for StubMotion {
        fn start(&self, _sink: SensorSink) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
        fn stop(&self) {
            self.stopped.store(true, Ordering::SeqCst);
        }
        fn is_available(&self) -> bool {
            self.available
        }
    }

    #[test]
    fn test_availability_reflects_adapter_state() {
        let suite = SensorSuite {
            accelerometer: Some(StubMotion::new(true) as Arc<dyn MotionSensorAdapter>),
            gyroscope: Some(StubMotion::new(false) as Arc<dyn MotionSensorAdapter>),
            ..Default::default()
        };
        let availability = suite.availability();
        assert!(availability.has_accelerometer);
        assert!(!availability.has_gyroscope);
        assert!(!availability.has_gps);
        assert!(!availability.has_barometer);
    }

    #[test]
    fn test_start_all_skips_unavailable_adapters() {
        let present = StubMotion::new(true);
        let missing = StubMotion::new(false);
        let suite = SensorSuite {
            accelerometer: Some(Arc::clone(&present) as Arc<dyn MotionSensorAdapter>),
            barometer: Some(Arc::clone(&missing) as Arc<dyn MotionSensorAdapter>),
            ..Default::default()
        };

        let (tx, _rx) = mpsc::unbounded_channel();
        suite.start_all(&SensorSink::new(tx), 2_000);

        assert_eq!(present.starts.load(Ordering::SeqCst), 1);
        assert_eq!(missing.starts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_sink_push_after_receiver_dropped_is_silent() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = SensorSink::new(tx);
        drop(rx);
        sink.push(SensorEvent {
            elapsed_nanos: 1,
            reading: SensorReading::Accelerometer([0.0, 0.0, 9.8]),
        });
    }

    #[test]
    fn test_qualifying_readings() {
        assert!(SensorReading::Accelerometer([0.0; 3]).qualifies_for_emission());
        assert!(SensorReading::RotationVector([0.0, 0.0, 0.0, 1.0]).qualifies_for_emission());
        assert!(!SensorReading::Barometer(BarometerReading {
            pressure_hpa: 1013.0,
            relative_altitude_m: None,
        })
        .qualifies_for_emission());
        assert!(!SensorReading::Magnetometer(MagnetometerReading {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        })
        .qualifies_for_emission());
    }
}
