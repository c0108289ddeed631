// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use super::Sample;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Pickup,
    Drop,
    Transit,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Recording,
    Completed,
    Failed,
}

/// A remotely-identified recording interval, as surfaced to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: String,
    pub status: SessionStatus,
    pub delivery_id: String,
    pub session_type: SessionType,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Delivery address attached to a session start, when the host knows it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    pub platform: String,
    pub sdk_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
}

/// Which physical sources this device can produce, computed once at session
/// start so the backend knows which sample fields to expect.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SensorAvailability {
    pub has_accelerometer: bool,
    pub has_gyroscope: bool,
    pub has_gravity: bool,
    pub has_rotation_vector: bool,
    pub has_barometer: bool,
    pub has_gps: bool,
    pub has_magnetometer: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub delivery_id: String,
    pub session_type: SessionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_rider_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_location: Option<GeoPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_availability: Option<SensorAvailability>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StopSessionRequest {
    pub session_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_id: String,
    pub status: SessionStatus,
}

/// One upload: a batch of samples under the session that recorded them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryRequest {
    pub session_id: String,
    pub events: Vec<Sample>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_request_wire_shape() {
        let req = StartSessionRequest {
            delivery_id: "d1".into(),
            session_type: SessionType::Drop,
            external_rider_id: Some("rider-7".into()),
            address: None,
            device: Some(DeviceDescriptor {
                platform: "android".into(),
                sdk_version: "1.0.0".into(),
                model: Some("Pixel 8".into()),
                os_version: Some("14".into()),
                app_version: None,
            }),
            start_location: Some(GeoPoint {
                lat: 52.5,
                lng: 13.4,
            }),
            sensor_availability: Some(SensorAvailability {
                has_accelerometer: true,
                has_gyroscope: true,
                has_gps: true,
                ..Default::default()
            }),
        };

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["deliveryId"], "d1");
        assert_eq!(json["sessionType"], "drop");
        assert_eq!(json["externalRiderId"], "rider-7");
        assert_eq!(json["device"]["sdkVersion"], "1.0.0");
        assert_eq!(json["startLocation"]["lat"], 52.5);
        assert_eq!(json["sensorAvailability"]["hasAccelerometer"], true);
        assert_eq!(json["sensorAvailability"]["hasBarometer"], false);
        assert!(json.get("address").is_none());
    }

    #[test]
    fn test_session_response_decodes() {
        let response: SessionResponse =
            serde_json::from_str(r#"{"sessionId":"s1","status":"recording"}"#).unwrap();
        assert_eq!(response.session_id, "s1");
        assert_eq!(response.status, SessionStatus::Recording);
    }

    #[test]
    fn test_telemetry_request_round_trip() {
        let req = TelemetryRequest {
            session_id: "s1".into(),
            events: vec![Sample {
                ts: 10.5,
                ..Default::default()
            }],
        };
        let encoded = serde_json::to_string(&req).unwrap();
        assert!(encoded.contains("\"sessionId\":\"s1\""));
        let decoded: TelemetryRequest = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, req);
    }
}
