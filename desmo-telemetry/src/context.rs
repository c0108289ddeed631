// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::data::{DeviceContext, NetworkType};
use desmo_common::MutexExt;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Battery state read from the platform in one (costly) query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatterySnapshot {
    /// Charge in `0.0..=1.0`.
    pub level: Option<f64>,
    pub charging: Option<bool>,
}

/// Host-side view of the device state the context payload needs.
///
/// `screen_on` and `network_type` must be cheap; `battery` may hit a system
/// broadcast and is cached by the snapshotter.
pub trait PlatformContext: Send + Sync {
    fn screen_on(&self) -> Option<bool>;
    fn network_type(&self) -> NetworkType;
    fn battery(&self) -> Option<BatterySnapshot>;
}

/// Platform stub for hosts that wire no context source.
#[derive(Debug, Default)]
pub struct NullPlatformContext;

impl PlatformContext for NullPlatformContext {
    fn screen_on(&self) -> Option<bool> {
        None
    }
    fn network_type(&self) -> NetworkType {
        NetworkType::Unknown
    }
    fn battery(&self) -> Option<BatterySnapshot> {
        None
    }
}

/// Battery refreshes at most this often; it moves slowly and the underlying
/// broadcast is costly.
const BATTERY_CACHE_TTL: Duration = Duration::from_secs(30);

/// On-demand [`DeviceContext`] producer: screen and network sampled live on
/// every call, battery served from a 30-second cache.
pub struct ContextSnapshotter {
    platform: Arc<dyn PlatformContext>,
    battery_cache: Mutex<Option<(Instant, Option<BatterySnapshot>)>>,
}

impl ContextSnapshotter {
    pub fn new(platform: Arc<dyn PlatformContext>) -> Self {
        Self {
            platform,
            battery_cache: Mutex::new(None),
        }
    }

    pub fn snapshot(
        &self,
        app_foreground: bool,
        motion_activity: Option<String>,
    ) -> DeviceContext {
        let battery = self.cached_battery();
        DeviceContext {
            screen_on: self.platform.screen_on(),
            app_foreground: Some(app_foreground),
            battery_level: battery.and_then(|b| b.level),
            charging: battery.and_then(|b| b.charging),
            network: self.platform.network_type(),
            motion_activity,
        }
    }

    fn cached_battery(&self) -> Option<BatterySnapshot> {
        let mut cache = self.battery_cache.lock_or_panic();
        match &*cache {
            Some((read_at, snapshot)) if read_at.elapsed() < BATTERY_CACHE_TTL => *snapshot,
            _ => {
                let fresh = self.platform.battery();
                *cache = Some((Instant::now(), fresh));
                fresh
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingPlatform {
        battery_reads: AtomicU32,
    }

    impl PlatformContext for CountingPlatform {
        fn screen_on(&self) -> Option<bool> {
            Some(true)
        }
        fn network_type(&self) -> NetworkType {
            NetworkType::Wifi
        }
        fn battery(&self) -> Option<BatterySnapshot> {
            self.battery_reads.fetch_add(1, Ordering::SeqCst);
            Some(BatterySnapshot {
                level: Some(0.5),
                charging: Some(false),
            })
        }
    }

    #[test]
    fn test_snapshot_samples_live_fields() {
        let snapshotter = ContextSnapshotter::new(Arc::new(CountingPlatform {
            battery_reads: AtomicU32::new(0),
        }));
        let context = snapshotter.snapshot(true, Some("walking".into()));
        assert_eq!(context.screen_on, Some(true));
        assert_eq!(context.app_foreground, Some(true));
        assert_eq!(context.network, NetworkType::Wifi);
        assert_eq!(context.battery_level, Some(0.5));
        assert_eq!(context.motion_activity.as_deref(), Some("walking"));
    }

    #[test]
    fn test_battery_is_read_once_within_the_cache_window() {
        let platform = Arc::new(CountingPlatform {
            battery_reads: AtomicU32::new(0),
        });
        let snapshotter = ContextSnapshotter::new(Arc::clone(&platform) as Arc<dyn PlatformContext>);

        for _ in 0..10 {
            snapshotter.snapshot(true, None);
        }
        assert_eq!(platform.battery_reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_null_platform_yields_sparse_context() {
        let snapshotter = ContextSnapshotter::new(Arc::new(NullPlatformContext));
        let context = snapshotter.snapshot(false, None);
        assert_eq!(context.screen_on, None);
        assert_eq!(context.app_foreground, Some(false));
        assert_eq!(context.battery_level, None);
        assert_eq!(context.network, NetworkType::Unknown);
    }
}
