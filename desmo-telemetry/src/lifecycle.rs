// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::session::DesmoClient;
use desmo_common::MutexExt;
use std::sync::{Arc, Mutex};

/// The host mechanism that keeps the process alive while a recording runs
/// in the background (a foreground service on Android).
///
/// Acquired when a session enters `recording`, released when it returns to
/// `idle`. Implementations live in the platform layer.
pub trait ForegroundKeeper: Send + Sync {
    fn acquire(&self);
    fn release(&self);
}

/// Keeper for hosts that manage process lifetime themselves.
#[derive(Debug, Default)]
pub struct NoopForegroundKeeper;

impl ForegroundKeeper for NoopForegroundKeeper {
    fn acquire(&self) {}
    fn release(&self) {}
}

/// Translates host lifecycle callbacks into the client's two hooks.
///
/// Binding is idempotent: binding again replaces the previous client, and
/// notifications with nothing bound are dropped.
#[derive(Default)]
pub struct LifecycleAdapter {
    client: Mutex<Option<Arc<DesmoClient>>>,
}

impl LifecycleAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, client: Arc<DesmoClient>) {
        *self.client.lock_or_panic() = Some(client);
    }

    pub fn unbind(&self) {
        *self.client.lock_or_panic() = None;
    }

    pub async fn notify_foreground(&self) {
        let bound = self.client.lock_or_panic().clone();
        if let Some(client) = bound {
            client.on_foreground().await;
        }
    }

    pub async fn notify_background(&self) {
        let bound = self.client.lock_or_panic().clone();
        if let Some(client) = bound {
            client.on_background().await;
        }
    }
}
