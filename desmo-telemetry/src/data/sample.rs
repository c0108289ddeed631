// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// The unit of on-device record.
///
/// Every sample carries a timestamp; any nested payload the device cannot
/// produce is absent rather than zero-filled.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    /// Seconds since epoch, derived from the sensor monotonic clock plus a
    /// wall-clock offset captured once per session.
    pub ts: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imu: Option<ImuReading>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barometer: Option<BarometerReading>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnetometer: Option<MagnetometerReading>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<DeviceContext>,
}

/// Inertial measurement grouping: accelerometer, gyroscope, gravity and the
/// rotation-vector attitude quaternion (`[x, y, z, w]`, unit norm).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ImuReading {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accel: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gyro: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gravity: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attitude: Option<[f64; 4]>,
}

impl ImuReading {
    pub fn is_empty(&self) -> bool {
        self.accel.is_none()
            && self.gyro.is_none()
            && self.gravity.is_none()
            && self.attitude.is_none()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BarometerReading {
    pub pressure_hpa: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_altitude_m: Option<f64>,
}

/// Magnetic field strength in microtesla.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MagnetometerReading {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_mps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearing_deg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Wifi,
    Cellular,
    None,
    #[default]
    Unknown,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeviceContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_on: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_foreground: Option<bool>,
    /// Battery charge in `0.0..=1.0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charging: Option<bool>,
    #[serde(default)]
    pub network: NetworkType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion_activity: Option<String>,
}
