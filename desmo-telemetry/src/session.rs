// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The session controller: a four-state machine whose transitions are tied
//! to remote acknowledgements.
//!
//! ```text
//!                 start_session OK
//!       [idle] ────────────────────────────> [recording]
//!         ▲  ▲                                    │
//!         │  └── start_session fail ─ [starting]──┘
//!         │              stop_session OK          │ stop_session
//!         │ ◀─────────────────────────── [stopping]
//!         └────── stop_session fail ──────────↺
//! ```

use crate::buffer::SampleBuffer;
use crate::config::Config;
use crate::context::{ContextSnapshotter, NullPlatformContext, PlatformContext};
use crate::coordinator::TelemetryCoordinator;
use crate::data::{
    Address, GeoPoint, Session, SessionType, SessionResponse, StartSessionRequest,
    StopSessionRequest,
};
use crate::error::DesmoError;
use crate::lifecycle::{ForegroundKeeper, NoopForegroundKeeper};
use crate::sensors::{SensorClock, SensorSuite, SystemSensorClock};
use crate::store::PendingBatchStore;
use crate::transport::ApiClient;
use crate::upload::UploadQueue;
use desmo_common::MutexExt;
use std::fmt::Display;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

const SESSIONS_START_PATH: &str = "/v1/sessions/start";
const SESSIONS_STOP_PATH: &str = "/v1/sessions/stop";

/// Where the controller currently is in the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Starting,
    Recording,
    Stopping,
}

impl Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Starting => "starting",
            SessionPhase::Recording => "recording",
            SessionPhase::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Optional inputs to [`DesmoClient::start_session`].
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    pub external_rider_id: Option<String>,
    pub address: Option<Address>,
    /// Taken from the location adapter's last fix when omitted.
    pub start_location: Option<GeoPoint>,
}

#[derive(Debug)]
struct ControllerState {
    phase: SessionPhase,
    session_id: Option<String>,
    delivery: Option<(String, SessionType)>,
}

/// Restores the phase if an operation is cancelled or fails before it
/// defuses the guard: the caller observes either the pre-call or the
/// post-call state, never a transient.
struct PhaseRollback<'a> {
    state: &'a Mutex<ControllerState>,
    rollback_to: SessionPhase,
    armed: bool,
}

impl<'a> PhaseRollback<'a> {
    fn new(state: &'a Mutex<ControllerState>, rollback_to: SessionPhase) -> Self {
        Self {
            state,
            rollback_to,
            armed: true,
        }
    }

    fn defuse(mut self) {
        self.armed = false;
    }
}

impl Drop for PhaseRollback<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.state.lock_or_panic();
            state.phase = self.rollback_to;
            if self.rollback_to == SessionPhase::Idle {
                state.session_id = None;
                state.delivery = None;
            }
        }
    }
}

/// The process-wide SDK handle.
///
/// One exclusive operation lock serialises `start_session`, `stop_session`,
/// `flush` and the lifecycle hooks; it is held across the remote call on
/// purpose so start and stop can never overlap. The state cell is separate
/// so the rollback guard can restore it even when an operation's future is
/// dropped mid-flight.
pub struct DesmoClient {
    config: Config,
    api: Arc<ApiClient>,
    queue: UploadQueue,
    buffer: Arc<SampleBuffer>,
    suite: SensorSuite,
    snapshotter: Arc<ContextSnapshotter>,
    clock: Arc<dyn SensorClock>,
    keeper: Arc<dyn ForegroundKeeper>,
    op_lock: tokio::sync::Mutex<()>,
    state: Mutex<ControllerState>,
    coordinator: Mutex<Option<TelemetryCoordinator>>,
}

impl DesmoClient {
    pub fn builder(config: Config) -> DesmoClientBuilder {
        DesmoClientBuilder::new(config)
    }

    /// Start a delivery recording session.
    ///
    /// Fails with [`DesmoError::InvalidState`] unless the controller is
    /// idle. On remote success the coordinator is launched and the state
    /// becomes `recording`; on remote failure the state rolls back to
    /// `idle` and the transport error is surfaced.
    pub async fn start_session(
        &self,
        delivery_id: &str,
        session_type: SessionType,
        options: StartOptions,
    ) -> Result<Session, DesmoError> {
        let _op = self.op_lock.lock().await;

        {
            let mut state = self.state.lock_or_panic();
            if state.phase != SessionPhase::Idle {
                return Err(DesmoError::InvalidState {
                    expected: SessionPhase::Idle,
                    actual: state.phase,
                });
            }
            state.phase = SessionPhase::Starting;
            state.delivery = Some((delivery_id.to_string(), session_type));
        }
        let rollback = PhaseRollback::new(&self.state, SessionPhase::Idle);

        let start_location = options.start_location.or_else(|| {
            self.suite
                .last_known_position()
                .map(|p| GeoPoint { lat: p.lat, lng: p.lng })
        });
        let request = StartSessionRequest {
            delivery_id: delivery_id.to_string(),
            session_type,
            external_rider_id: options.external_rider_id,
            address: options.address,
            device: Some(self.config.device_descriptor()),
            start_location,
            sensor_availability: Some(self.suite.availability()),
        };

        let response: SessionResponse = match self
            .api
            .post_json(SESSIONS_START_PATH, &request)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(delivery_id, error = %e, "Session start rejected");
                drop(rollback);
                return Err(DesmoError::Transport(e));
            }
        };

        let coordinator = TelemetryCoordinator::start(
            response.session_id.clone(),
            Arc::clone(&self.buffer),
            self.queue.clone(),
            self.suite.clone(),
            Arc::clone(&self.snapshotter),
            Arc::clone(&self.clock),
            self.config.telemetry,
        );
        *self.coordinator.lock_or_panic() = Some(coordinator);
        rollback.defuse();
        {
            let mut state = self.state.lock_or_panic();
            state.phase = SessionPhase::Recording;
            state.session_id = Some(response.session_id.clone());
        }
        self.keeper.acquire();

        info!(
            session_id = %response.session_id,
            delivery_id,
            "Session recording"
        );
        Ok(Session {
            session_id: response.session_id,
            status: response.status,
            delivery_id: delivery_id.to_string(),
            session_type,
        })
    }

    /// Stop the active session.
    ///
    /// Drains collection into the queue before the remote stop. On remote
    /// failure the state rolls back to `recording` so the caller may retry;
    /// recording itself is not resumed, only the acknowledgement is
    /// outstanding.
    pub async fn stop_session(&self) -> Result<Session, DesmoError> {
        let _op = self.op_lock.lock().await;

        let (session_id, delivery) = {
            let mut state = self.state.lock_or_panic();
            if state.phase != SessionPhase::Recording {
                return Err(DesmoError::InvalidState {
                    expected: SessionPhase::Recording,
                    actual: state.phase,
                });
            }
            let Some(session_id) = state.session_id.clone() else {
                return Err(DesmoError::NoActiveSession);
            };
            state.phase = SessionPhase::Stopping;
            (session_id, state.delivery.clone())
        };
        let rollback = PhaseRollback::new(&self.state, SessionPhase::Recording);

        // Final flush runs to completion; the batch is durable before any
        // network attempt either way.
        let taken = self.coordinator.lock_or_panic().take();
        if let Some(mut coordinator) = taken {
            coordinator.flush_and_stop().await;
            *self.coordinator.lock_or_panic() = Some(coordinator);
        }

        let request = StopSessionRequest {
            session_id: session_id.clone(),
        };
        let response: SessionResponse =
            match self.api.post_json(SESSIONS_STOP_PATH, &request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "Session stop rejected, still recording");
                    drop(rollback);
                    return Err(DesmoError::Transport(e));
                }
            };

        rollback.defuse();
        {
            let mut state = self.state.lock_or_panic();
            state.phase = SessionPhase::Idle;
            state.session_id = None;
            state.delivery = None;
        }
        *self.coordinator.lock_or_panic() = None;
        self.keeper.release();

        info!(session_id = %response.session_id, "Session completed");
        let (delivery_id, session_type) =
            delivery.unwrap_or_else(|| (String::new(), SessionType::Transit));
        Ok(Session {
            session_id: response.session_id,
            status: response.status,
            delivery_id,
            session_type,
        })
    }

    /// Hand everything currently buffered to the upload queue.
    pub async fn flush(&self) -> Result<(), DesmoError> {
        let _op = self.op_lock.lock().await;
        if self.state.lock_or_panic().phase != SessionPhase::Recording {
            return Err(DesmoError::NoActiveSession);
        }
        let taken = self.coordinator.lock_or_panic().take();
        if let Some(coordinator) = taken {
            coordinator.flush_now().await;
            *self.coordinator.lock_or_panic() = Some(coordinator);
        }
        Ok(())
    }

    /// No-op while idle.
    pub async fn on_foreground(&self) {
        let _op = self.op_lock.lock().await;
        if let Some(coordinator) = &*self.coordinator.lock_or_panic() {
            coordinator.on_foreground();
        }
    }

    /// No-op while idle.
    pub async fn on_background(&self) {
        let _op = self.op_lock.lock().await;
        if let Some(coordinator) = &*self.coordinator.lock_or_panic() {
            coordinator.on_background();
        }
    }

    pub fn current_phase(&self) -> SessionPhase {
        self.state.lock_or_panic().phase
    }

    pub fn active_session_id(&self) -> Option<String> {
        self.state.lock_or_panic().session_id.clone()
    }

    /// The durable batch store, shared across sessions for retry
    /// continuity.
    pub fn store(&self) -> &PendingBatchStore {
        self.queue.store()
    }
}

pub struct DesmoClientBuilder {
    config: Config,
    suite: SensorSuite,
    platform: Option<Arc<dyn PlatformContext>>,
    keeper: Option<Arc<dyn ForegroundKeeper>>,
    clock: Option<Arc<dyn SensorClock>>,
    store_path: Option<PathBuf>,
}

impl DesmoClientBuilder {
    fn new(config: Config) -> Self {
        Self {
            config,
            suite: SensorSuite::default(),
            platform: None,
            keeper: None,
            clock: None,
            store_path: None,
        }
    }

    pub fn with_sensors(mut self, suite: SensorSuite) -> Self {
        self.suite = suite;
        self
    }

    pub fn with_platform_context(mut self, platform: Arc<dyn PlatformContext>) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn with_foreground_keeper(mut self, keeper: Arc<dyn ForegroundKeeper>) -> Self {
        self.keeper = Some(keeper);
        self
    }

    pub fn with_sensor_clock(mut self, clock: Arc<dyn SensorClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Where the pending-batch database lives. Without it the store is
    /// in-memory and batches do not survive process death.
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<DesmoClient, DesmoError> {
        let endpoint = self.config.endpoint()?;
        let api = Arc::new(ApiClient::new(endpoint));

        // A broken store must not break the host: degrade to in-memory and
        // keep recording, at the cost of durability.
        let store = match &self.store_path {
            Some(path) => PendingBatchStore::open(path).or_else(|e| {
                error!(error = %e, path = %path.display(), "Failed to open batch store, falling back to in-memory");
                PendingBatchStore::open_in_memory()
            }),
            None => PendingBatchStore::open_in_memory(),
        }
        .map_err(|e| {
            error!(error = %e, "Failed to open in-memory batch store");
            DesmoError::Transport(crate::error::TransportError::network(e))
        })?;

        let queue = UploadQueue::new(Arc::new(store), Arc::clone(&api));
        let platform = self
            .platform
            .unwrap_or_else(|| Arc::new(NullPlatformContext));

        Ok(DesmoClient {
            config: self.config,
            api,
            queue,
            buffer: Arc::new(SampleBuffer::new()),
            suite: self.suite,
            snapshotter: Arc::new(ContextSnapshotter::new(platform)),
            clock: self
                .clock
                .unwrap_or_else(|| Arc::new(SystemSensorClock::new())),
            keeper: self
                .keeper
                .unwrap_or_else(|| Arc::new(NoopForegroundKeeper)),
            op_lock: tokio::sync::Mutex::new(()),
            state: Mutex::new(ControllerState {
                phase: SessionPhase::Idle,
                session_id: None,
                delivery: None,
            }),
            coordinator: Mutex::new(None),
        })
    }
}
