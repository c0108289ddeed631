// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::data::{BarometerReading, ImuReading, MagnetometerReading, Sample};
use crate::sensors::{SensorEvent, SensorReading};

/// Turns the raw sensor event stream into throttled samples.
///
/// Keeps the latest value per modality and, on each qualifying push, decides
/// whether enough sensor-clock time has passed since the last emission.
/// Timestamps are sensor-monotonic plus a wall offset captured once at
/// session start, so they are wall-anchored but immune to clock changes
/// mid-session.
#[derive(Debug)]
pub(crate) struct SampleAssembler {
    min_gap_nanos: u64,
    boot_offset_nanos: i64,
    last_emit_nanos: Option<u64>,
    accel: Option<[f64; 3]>,
    gyro: Option<[f64; 3]>,
    gravity: Option<[f64; 3]>,
    attitude: Option<[f64; 4]>,
    barometer: Option<BarometerReading>,
    magnetometer: Option<MagnetometerReading>,
}

impl SampleAssembler {
    pub(crate) fn new(min_gap_nanos: u64, boot_offset_nanos: i64) -> Self {
        Self {
            min_gap_nanos,
            boot_offset_nanos,
            last_emit_nanos: None,
            accel: None,
            gyro: None,
            gravity: None,
            attitude: None,
            barometer: None,
            magnetometer: None,
        }
    }

    /// Fold one event into the modality cache; returns a sample when the
    /// throttle allows an emission.
    pub(crate) fn observe(&mut self, event: SensorEvent) -> Option<Sample> {
        let qualifies = event.reading.qualifies_for_emission();
        match event.reading {
            SensorReading::Accelerometer(v) => self.accel = Some(v),
            SensorReading::Gyroscope(v) => self.gyro = Some(v),
            SensorReading::Gravity(v) => self.gravity = Some(v),
            SensorReading::RotationVector(q) => self.attitude = Some(q),
            SensorReading::Barometer(b) => self.barometer = Some(b),
            SensorReading::Magnetometer(m) => self.magnetometer = Some(m),
        }
        if !qualifies || !self.emission_due(event.elapsed_nanos) {
            return None;
        }
        self.last_emit_nanos = Some(event.elapsed_nanos);
        Some(self.assemble(event.elapsed_nanos))
    }

    /// The first event of a session always emits; afterwards emissions must
    /// be at least `min_gap_nanos` apart on the sensor clock.
    fn emission_due(&self, elapsed_nanos: u64) -> bool {
        match self.last_emit_nanos {
            None => true,
            Some(last) => elapsed_nanos.saturating_sub(last) >= self.min_gap_nanos,
        }
    }

    fn assemble(&self, elapsed_nanos: u64) -> Sample {
        let imu = ImuReading {
            accel: self.accel,
            gyro: self.gyro,
            gravity: self.gravity,
            attitude: self.attitude,
        };
        Sample {
            ts: self.wall_ts(elapsed_nanos),
            imu: (!imu.is_empty()).then_some(imu),
            barometer: self.barometer.clone(),
            magnetometer: self.magnetometer.clone(),
            position: None,
            context: None,
        }
    }

    fn wall_ts(&self, elapsed_nanos: u64) -> f64 {
        (elapsed_nanos as i64 + self.boot_offset_nanos) as f64 / 1e9
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAP_50_HZ: u64 = 20_000_000;

    fn accel_at(nanos: u64) -> SensorEvent {
        SensorEvent {
            elapsed_nanos: nanos,
            reading: SensorReading::Accelerometer([0.0, 0.0, 9.81]),
        }
    }

    #[test]
    fn test_first_event_always_emits() {
        let mut assembler = SampleAssembler::new(GAP_50_HZ, 0);
        assert!(assembler.observe(accel_at(123)).is_some());
    }

    #[test]
    fn test_pushes_inside_the_gap_are_suppressed() {
        let mut assembler = SampleAssembler::new(GAP_50_HZ, 0);
        assert!(assembler.observe(accel_at(0)).is_some());
        assert!(assembler.observe(accel_at(GAP_50_HZ / 2)).is_none());
        assert!(assembler.observe(accel_at(GAP_50_HZ - 1)).is_none());
        assert!(assembler.observe(accel_at(GAP_50_HZ)).is_some());
    }

    #[test]
    fn test_emission_rate_tracks_the_configured_rate() {
        // 5 ms cadence against a 20 ms gap over one second: 50 emissions
        // within one of the ideal count.
        let mut assembler = SampleAssembler::new(GAP_50_HZ, 0);
        let mut emitted = 0usize;
        let mut t = 0u64;
        while t < 1_000_000_000 {
            if assembler.observe(accel_at(t)).is_some() {
                emitted += 1;
            }
            t += 5_000_000;
        }
        assert!((49..=51).contains(&emitted), "emitted {emitted}");
    }

    #[test]
    fn test_non_qualifying_readings_never_emit_but_are_cached() {
        let mut assembler = SampleAssembler::new(GAP_50_HZ, 0);
        assert!(assembler
            .observe(SensorEvent {
                elapsed_nanos: 0,
                reading: SensorReading::Barometer(BarometerReading {
                    pressure_hpa: 1008.0,
                    relative_altitude_m: Some(3.0),
                }),
            })
            .is_none());

        let sample = assembler.observe(accel_at(1)).unwrap();
        assert_eq!(sample.barometer.unwrap().pressure_hpa, 1008.0);
    }

    #[test]
    fn test_imu_groups_latest_values() {
        let mut assembler = SampleAssembler::new(GAP_50_HZ, 0);
        assembler.observe(SensorEvent {
            elapsed_nanos: 0,
            reading: SensorReading::Gyroscope([1.0, 2.0, 3.0]),
        });
        let sample = assembler
            .observe(SensorEvent {
                elapsed_nanos: GAP_50_HZ,
                reading: SensorReading::RotationVector([0.0, 0.0, 0.0, 1.0]),
            })
            .unwrap();

        let imu = sample.imu.unwrap();
        assert_eq!(imu.gyro, Some([1.0, 2.0, 3.0]));
        assert_eq!(imu.attitude, Some([0.0, 0.0, 0.0, 1.0]));
        assert_eq!(imu.accel, None);
    }

    #[test]
    fn test_ts_is_monotonic_plus_wall_offset() {
        // Session started at wall second 1_700_000_000 with the sensor
        // clock at 5 s.
        let offset = 1_700_000_000_000_000_000i64 - 5_000_000_000i64;
        let mut assembler = SampleAssembler::new(GAP_50_HZ, offset);
        let sample = assembler.observe(accel_at(6_000_000_000)).unwrap();
        assert!((sample.ts - 1_700_000_001.0).abs() < 1e-6);
    }

    #[test]
    fn test_out_of_order_event_does_not_emit() {
        let mut assembler = SampleAssembler::new(GAP_50_HZ, 0);
        assert!(assembler.observe(accel_at(GAP_50_HZ * 2)).is_some());
        assert!(assembler.observe(accel_at(0)).is_none());
    }
}
