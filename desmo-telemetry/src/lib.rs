// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! Delivery-tracking telemetry SDK core.
//!
//! A [`DesmoClient`] records a bounded session during a delivery: platform
//! sensor adapters push readings into a per-session coordinator, which
//! throttles them to the configured sample rate, enriches them with
//! position and device context, and batches them through a bounded buffer
//! into a store-and-forward upload queue. Batches are persisted before the
//! first upload attempt, so delivery is at-least-once across process death,
//! network outages and lifecycle churn; batches recorded by a dead process
//! are re-submitted under their original session ids on the next start.
//!
//! The host supplies the platform pieces (sensor adapters, context source,
//! foreground keeper) and drives the session lifecycle:
//!
//! ```no_run
//! # async fn run() -> Result<(), desmo_telemetry::DesmoError> {
//! use desmo_telemetry::{Config, DesmoClient, Environment, SessionType, StartOptions};
//!
//! let config = Config::new("pk_sandbox_abc123", Environment::Sandbox)?;
//! let client = DesmoClient::builder(config)
//!     .with_store_path("/data/desmo/pending.db")
//!     .build()?;
//!
//! let session = client
//!     .start_session("delivery-42", SessionType::Drop, StartOptions::default())
//!     .await?;
//! // ... delivery happens ...
//! client.stop_session().await?;
//! # let _ = session;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod data;
pub mod error;
pub mod lifecycle;
pub mod sensors;
pub mod session;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod transport;
pub mod upload;

pub use config::{Config, DeviceInfo, Environment, TelemetrySettings};
pub use data::{Session, SessionStatus, SessionType};
pub use error::{DesmoError, TransportError};
pub use lifecycle::{ForegroundKeeper, LifecycleAdapter};
pub use session::{DesmoClient, DesmoClientBuilder, SessionPhase, StartOptions};
