// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-session owner of collection: sensor activation, the sample pump, the
//! periodic flush loop and the periodic retry sweep.

mod assembler;

use crate::buffer::SampleBuffer;
use crate::config::TelemetrySettings;
use crate::context::ContextSnapshotter;
use crate::sensors::{SensorClock, SensorEvent, SensorSink, SensorSuite};
use crate::upload::UploadQueue;
use assembler::SampleAssembler;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::select;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Owns the task group of one recording session.
///
/// Created at session start and disposed at stop, never reused: a fresh
/// cancellation token and fresh tasks per session rule out cross-session
/// writes from a stale loop.
pub struct TelemetryCoordinator {
    session_id: String,
    buffer: Arc<SampleBuffer>,
    queue: UploadQueue,
    suite: SensorSuite,
    settings: TelemetrySettings,
    sink: SensorSink,
    foreground: Arc<AtomicBool>,
    panicked_events: Arc<AtomicU64>,
    cancel: CancellationToken,
    pump: Option<JoinHandle<()>>,
    flush_loop: Option<JoinHandle<()>>,
    retry_loop: Option<JoinHandle<()>>,
    stopped: bool,
}

impl TelemetryCoordinator {
    /// Launch collection for `session_id`.
    ///
    /// The buffer is cleared unconditionally on entry: if a previous process
    /// died while recording, whatever it left behind must not leak into this
    /// session.
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        session_id: String,
        buffer: Arc<SampleBuffer>,
        queue: UploadQueue,
        suite: SensorSuite,
        snapshotter: Arc<ContextSnapshotter>,
        clock: Arc<dyn SensorClock>,
        settings: TelemetrySettings,
    ) -> Self {
        buffer.clear();

        let boot_offset_nanos = wall_nanos() - clock.now_nanos() as i64;
        let foreground = Arc::new(AtomicBool::new(true));
        let panicked_events = Arc::new(AtomicU64::new(0));
        let cancel = CancellationToken::new();

        let (tx, rx) = mpsc::unbounded_channel();
        let sink = SensorSink::new(tx);
        suite.start_all(&sink, settings.location_update_ms);

        let pump = tokio::spawn(run_pump(
            rx,
            SampleAssembler::new(settings.min_sample_gap_nanos(), boot_offset_nanos),
            Arc::clone(&buffer),
            suite.clone(),
            snapshotter,
            Arc::clone(&foreground),
            Arc::clone(&panicked_events),
            cancel.clone(),
        ));

        let flush_loop = tokio::spawn(run_flush_loop(
            session_id.clone(),
            Arc::clone(&buffer),
            queue.clone(),
            Duration::from_millis(settings.upload_interval_ms),
            cancel.clone(),
        ));

        let retry_loop = tokio::spawn(run_retry_loop(
            queue.clone(),
            Duration::from_millis(settings.retry_interval_ms),
            cancel.clone(),
        ));

        debug!(session_id = %session_id, "Telemetry coordinator started");

        Self {
            session_id,
            buffer,
            queue,
            suite,
            settings,
            sink,
            foreground,
            panicked_events,
            cancel,
            pump: Some(pump),
            flush_loop: Some(flush_loop),
            retry_loop: Some(retry_loop),
            stopped: false,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Drain whatever the buffer holds right now into the upload queue.
    pub async fn flush_now(&self) {
        let samples = self.buffer.drain();
        if !samples.is_empty() {
            self.queue.enqueue(&self.session_id, samples).await;
        }
    }

    /// Halt collection and hand every remaining sample to the queue.
    ///
    /// Idempotent; the final upload attempt runs to completion, and the
    /// batch is durable before the network is touched either way.
    pub async fn flush_and_stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        self.suite.stop_all();
        self.cancel.cancel();
        for task in [
            self.pump.take(),
            self.flush_loop.take(),
            self.retry_loop.take(),
        ]
        .into_iter()
        .flatten()
        {
            if let Err(e) = task.await {
                error!(error = %e, "Coordinator task failed to join");
            }
        }

        self.flush_now().await;

        let overflow = self.buffer.dropped();
        let panicked = self.panicked_events.load(Ordering::Relaxed);
        info!(
            session_id = %self.session_id,
            overflow_dropped = overflow,
            panicked_events = panicked,
            "Telemetry coordinator stopped"
        );
    }

    /// The platform may have throttled sensors while backgrounded; starting
    /// them again is safe and refreshes their delivery.
    pub fn on_foreground(&self) {
        self.foreground.store(true, Ordering::Relaxed);
        if !self.stopped {
            self.suite
                .start_all(&self.sink, self.settings.location_update_ms);
            debug!(session_id = %self.session_id, "Sensors restarted on foreground");
        }
    }

    /// Collection continues while backgrounded; only the context bit moves.
    pub fn on_background(&self) {
        self.foreground.store(false, Ordering::Relaxed);
        debug!(session_id = %self.session_id, "App moved to background");
    }
}

impl Drop for TelemetryCoordinator {
    fn drop(&mut self) {
        // A coordinator dropped without an explicit stop (cancelled
        // operation, client teardown) must not leave tasks or sensors
        // running.
        if !self.stopped {
            self.suite.stop_all();
            self.cancel.cancel();
        }
    }
}

fn wall_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// Single consumer of the sensor channel: assembles, enriches and buffers.
/// Samples therefore enter the buffer in emission order.
#[allow(clippy::too_many_arguments)]
async fn run_pump(
    mut rx: mpsc::UnboundedReceiver<SensorEvent>,
    mut assembler: SampleAssembler,
    buffer: Arc<SampleBuffer>,
    suite: SensorSuite,
    snapshotter: Arc<ContextSnapshotter>,
    foreground: Arc<AtomicBool>,
    panicked_events: Arc<AtomicU64>,
    cancel: CancellationToken,
) {
    let mut handle = |event: SensorEvent| {
        // A panic in one callback must neither crash the host nor tear the
        // coordinator down; the frame is dropped and counted.
        let result = catch_unwind(AssertUnwindSafe(|| {
            if let Some(mut sample) = assembler.observe(event) {
                sample.position = suite.last_known_position();
                sample.context = Some(snapshotter.snapshot(
                    foreground.load(Ordering::Relaxed),
                    suite.latest_activity(),
                ));
                buffer.add(sample);
            }
        }));
        if result.is_err() {
            panicked_events.fetch_add(1, Ordering::Relaxed);
            error!("Sensor event processing panicked, frame dropped");
        }
    };

    loop {
        select! {
            _ = cancel.cancelled() => {
                // Sensors are already stopped; work off the backlog so the
                // final flush sees everything that was pushed.
                while let Ok(event) = rx.try_recv() {
                    handle(event);
                }
                break;
            }
            event = rx.recv() => {
                match event {
                    Some(event) => handle(event),
                    None => break,
                }
            }
        }
    }
}

async fn run_flush_loop(
    session_id: String,
    buffer: Arc<SampleBuffer>,
    queue: UploadQueue,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {
                let samples = buffer.drain();
                if !samples.is_empty() {
                    queue.enqueue(&session_id, samples).await;
                }
            }
        }
    }
}

/// First sweep runs immediately: this is what re-delivers batches a dead
/// process left behind, under their original session ids.
async fn run_retry_loop(queue: UploadQueue, interval: Duration, cancel: CancellationToken) {
    queue.process_pending().await;
    loop {
        select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {
                queue.process_pending().await;
            }
        }
    }
}
