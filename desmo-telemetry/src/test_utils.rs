// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Scripted stand-ins for the platform adapters, used by the unit and
//! scenario tests. Not part of the SDK surface.

use crate::context::{BatterySnapshot, PlatformContext};
use crate::data::{NetworkType, Position};
use crate::lifecycle::ForegroundKeeper;
use crate::sensors::{
    ActivityAdapter, LocationAdapter, MotionSensorAdapter, SensorClock, SensorEvent, SensorReading,
    SensorSink,
};
use desmo_common::MutexExt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Manually advanced sensor clock shared between a test and its adapters.
#[derive(Debug, Default)]
pub struct FakeSensorClock {
    nanos: AtomicU64,
}

impl FakeSensorClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn advance(&self, nanos: u64) -> u64 {
        self.nanos.fetch_add(nanos, Ordering::SeqCst) + nanos
    }

    pub fn set(&self, nanos: u64) {
        self.nanos.store(nanos, Ordering::SeqCst);
    }
}

impl SensorClock for FakeSensorClock {
    fn now_nanos(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst)
    }
}

/// Push-style adapter driven directly by the test body.
pub struct ScriptedMotionAdapter {
    available: bool,
    sink: Mutex<Option<SensorSink>>,
    starts: AtomicU32,
    stops: AtomicU32,
}

impl ScriptedMotionAdapter {
    pub fn available() -> Arc<Self> {
        Arc::new(Self {
            available: true,
            sink: Mutex::new(None),
            starts: AtomicU32::new(0),
            stops: AtomicU32::new(0),
        })
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            available: false,
            sink: Mutex::new(None),
            starts: AtomicU32::new(0),
            stops: AtomicU32::new(0),
        })
    }

    /// Deliver one reading as the platform sensor thread would.
    pub fn push(&self, elapsed_nanos: u64, reading: SensorReading) {
        if let Some(sink) = &*self.sink.lock_or_panic() {
            sink.push(SensorEvent {
                elapsed_nanos,
                reading,
            });
        }
    }

    pub fn start_count(&self) -> u32 {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> u32 {
        self.stops.load(Ordering::SeqCst)
    }
}

impl MotionSensorAdapter for ScriptedMotionAdapter {
    fn start(&self, sink: SensorSink) {
        self.starts.fetch_add(1, Ordering::SeqCst);
        *self.sink.lock_or_panic() = Some(sink);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        *self.sink.lock_or_panic() = None;
    }

    fn is_available(&self) -> bool {
        self.available
    }
}

#[derive(Default)]
pub struct FakeLocationAdapter {
    position: Mutex<Option<Position>>,
    started: AtomicBool,
}

impl FakeLocationAdapter {
    pub fn with_position(position: Position) -> Arc<Self> {
        let adapter = Arc::new(Self::default());
        adapter.set_position(position);
        adapter
    }

    pub fn set_position(&self, position: Position) {
        *self.position.lock_or_panic() = Some(position);
    }
}

impl LocationAdapter for FakeLocationAdapter {
    fn start(&self, _update_interval_ms: u64) {
        self.started.store(true, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.started.store(false, Ordering::SeqCst);
    }

    fn is_available(&self) -> bool {
        true
    }

    fn last_known(&self) -> Option<Position> {
        self.position.lock_or_panic().clone()
    }
}

#[derive(Default)]
pub struct FakeActivityAdapter {
    activity: Mutex<Option<String>>,
}

impl FakeActivityAdapter {
    pub fn reporting(activity: &str) -> Arc<Self> {
        let adapter = Arc::new(Self::default());
        *adapter.activity.lock_or_panic() = Some(activity.to_string());
        adapter
    }
}

impl ActivityAdapter for FakeActivityAdapter {
    fn start(&self) {}
    fn stop(&self) {}
    fn is_available(&self) -> bool {
        true
    }
    fn latest_activity(&self) -> Option<String> {
        self.activity.lock_or_panic().clone()
    }
}

/// Fixed-value platform context.
pub struct StaticPlatformContext {
    pub screen_on: Option<bool>,
    pub network: NetworkType,
    pub battery: Option<BatterySnapshot>,
}

impl Default for StaticPlatformContext {
    fn default() -> Self {
        Self {
            screen_on: Some(true),
            network: NetworkType::Wifi,
            battery: Some(BatterySnapshot {
                level: Some(0.9),
                charging: Some(false),
            }),
        }
    }
}

impl PlatformContext for StaticPlatformContext {
    fn screen_on(&self) -> Option<bool> {
        self.screen_on
    }
    fn network_type(&self) -> NetworkType {
        self.network
    }
    fn battery(&self) -> Option<BatterySnapshot> {
        self.battery
    }
}

/// Records acquire/release transitions without keeping anything alive.
#[derive(Debug, Default)]
pub struct RecordingForegroundKeeper {
    pub acquired: AtomicU32,
    pub released: AtomicU32,
}

impl ForegroundKeeper for RecordingForegroundKeeper {
    fn acquire(&self) {
        self.acquired.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}
