// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::data::DeviceDescriptor;
use crate::error::DesmoError;
use desmo_common::Endpoint;
use std::borrow::Cow;
use tracing::warn;

const SANDBOX_BASE_URL: &str = "https://api.sandbox.desmo.dev";
const LIVE_BASE_URL: &str = "https://api.desmo.dev";

/// Publishable api keys carry this prefix; anything else is rejected at
/// construction.
const API_KEY_PREFIX: &str = "pk_";

pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 50;
pub const MAX_SAMPLE_RATE_HZ: u32 = 100;
pub const DEFAULT_LOCATION_UPDATE_MS: u64 = 2_000;
pub const MIN_LOCATION_UPDATE_MS: u64 = 500;
pub const DEFAULT_UPLOAD_INTERVAL_MS: u64 = 5_000;
pub const MIN_UPLOAD_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 30_000;
pub const MIN_RETRY_INTERVAL_MS: u64 = 5_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Sandbox,
    Live,
}

impl Environment {
    pub fn base_url(&self) -> &'static str {
        match self {
            Environment::Sandbox => SANDBOX_BASE_URL,
            Environment::Live => LIVE_BASE_URL,
        }
    }
}

/// Collection cadences. Out-of-range values are clamped, not rejected: a
/// misconfigured host keeps recording at the nearest legal rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TelemetrySettings {
    /// Target emission rate for IMU-qualified samples, `1..=100` Hz.
    pub sample_rate_hz: u32,
    /// Requested location update interval, at least 500 ms.
    pub location_update_ms: u64,
    /// Buffer flush interval, at least 1000 ms.
    pub upload_interval_ms: u64,
    /// Pending-batch sweep interval, at least 5000 ms.
    pub retry_interval_ms: u64,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            location_update_ms: DEFAULT_LOCATION_UPDATE_MS,
            upload_interval_ms: DEFAULT_UPLOAD_INTERVAL_MS,
            retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
        }
    }
}

impl TelemetrySettings {
    /// Clamp every field into its legal range, logging anything that had to
    /// be adjusted.
    pub fn normalized(self) -> Self {
        let sample_rate_hz = self.sample_rate_hz.clamp(1, MAX_SAMPLE_RATE_HZ);
        if sample_rate_hz != self.sample_rate_hz {
            warn!(
                requested = self.sample_rate_hz,
                effective = sample_rate_hz,
                "sample_rate_hz out of range, clamped"
            );
        }
        let location_update_ms = self.location_update_ms.max(MIN_LOCATION_UPDATE_MS);
        if location_update_ms != self.location_update_ms {
            warn!(
                requested = self.location_update_ms,
                effective = location_update_ms,
                "location_update_ms below minimum, clamped"
            );
        }
        let upload_interval_ms = self.upload_interval_ms.max(MIN_UPLOAD_INTERVAL_MS);
        if upload_interval_ms != self.upload_interval_ms {
            warn!(
                requested = self.upload_interval_ms,
                effective = upload_interval_ms,
                "upload_interval_ms below minimum, clamped"
            );
        }
        let retry_interval_ms = self.retry_interval_ms.max(MIN_RETRY_INTERVAL_MS);
        if retry_interval_ms != self.retry_interval_ms {
            warn!(
                requested = self.retry_interval_ms,
                effective = retry_interval_ms,
                "retry_interval_ms below minimum, clamped"
            );
        }
        Self {
            sample_rate_hz,
            location_update_ms,
            upload_interval_ms,
            retry_interval_ms,
        }
    }

    /// Minimum spacing between emitted samples on the sensor clock.
    pub fn min_sample_gap_nanos(&self) -> u64 {
        1_000_000_000 / u64::from(self.sample_rate_hz.clamp(1, MAX_SAMPLE_RATE_HZ))
    }
}

/// Host-supplied description of the device the SDK runs on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub platform: String,
    pub model: Option<String>,
    pub os_version: Option<String>,
    pub app_version: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Config {
    api_key: String,
    pub environment: Environment,
    /// The SDK logs through `tracing` under the `desmo_telemetry` target;
    /// the embedding layer reads this flag to decide whether to install a
    /// subscriber for that target.
    pub logging_enabled: bool,
    pub telemetry: TelemetrySettings,
    pub device: DeviceInfo,
    /// Override for the environment base url, used by tests and staging.
    base_url_override: Option<String>,
}

impl Config {
    pub fn new(api_key: impl Into<String>, environment: Environment) -> Result<Self, DesmoError> {
        let api_key = api_key.into();
        if !api_key.starts_with(API_KEY_PREFIX) || api_key.len() <= API_KEY_PREFIX.len() {
            return Err(DesmoError::InvalidApiKey);
        }
        Ok(Self {
            api_key,
            environment,
            logging_enabled: false,
            telemetry: TelemetrySettings::default(),
            device: DeviceInfo::default(),
            base_url_override: None,
        })
    }

    pub fn with_telemetry(mut self, telemetry: TelemetrySettings) -> Self {
        self.telemetry = telemetry.normalized();
        self
    }

    pub fn with_device(mut self, device: DeviceInfo) -> Self {
        self.device = device;
        self
    }

    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.logging_enabled = enabled;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url_override = Some(base_url.into());
        self
    }

    /// The endpoint all session and telemetry requests go to.
    pub fn endpoint(&self) -> Result<Endpoint, DesmoError> {
        let base = self
            .base_url_override
            .as_deref()
            .unwrap_or_else(|| self.environment.base_url());
        let url = base.parse::<hyper::Uri>().map_err(|e| {
            DesmoError::Transport(crate::error::TransportError::network(anyhow::anyhow!(
                "invalid base url {base}: {e}"
            )))
        })?;
        Ok(Endpoint::from_url(url).with_api_key(Cow::Owned(self.api_key.clone())))
    }

    /// Device descriptor sent with the session start request.
    pub fn device_descriptor(&self) -> DeviceDescriptor {
        DeviceDescriptor {
            platform: self.device.platform.clone(),
            sdk_version: env!("CARGO_PKG_VERSION").to_string(),
            model: self.device.model.clone(),
            os_version: self.device.os_version.clone(),
            app_version: self.device.app_version.clone(),
        }
    }
}
