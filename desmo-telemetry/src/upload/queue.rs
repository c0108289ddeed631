// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::data::Sample;
use crate::store::{PendingBatch, PendingBatchStore};
use crate::transport::ApiClient;
use crate::upload::{classify, UploadClassification};
use serde::Serialize;
use serde_json::value::RawValue;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Rows that failed this many times are evicted instead of retried.
pub const MAX_ATTEMPTS: u32 = 10;

const TELEMETRY_PATH: &str = "/v1/telemetry";

/// On-wire telemetry request built from a stored row without re-decoding
/// the persisted sample array.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TelemetryWire<'a> {
    session_id: &'a str,
    events: &'a RawValue,
}

/// Store-and-forward queue between the sample buffer and the transport.
///
/// Batches are persisted before the first upload attempt, so process death
/// at any point leaves an on-disk copy the next retry sweep will deliver.
/// Retried rows always go out under the session id they were recorded with,
/// never the currently active one.
#[derive(Clone)]
pub struct UploadQueue {
    store: Arc<PendingBatchStore>,
    api: Arc<ApiClient>,
}

impl UploadQueue {
    pub fn new(store: Arc<PendingBatchStore>, api: Arc<ApiClient>) -> Self {
        Self { store, api }
    }

    pub fn store(&self) -> &PendingBatchStore {
        &self.store
    }

    /// Persist a batch and attempt its first upload.
    pub async fn enqueue(&self, session_id: &str, samples: Vec<Sample>) {
        if samples.is_empty() {
            return;
        }
        let sample_count = samples.len();
        let samples_json = match serde_json::to_string(&samples) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, sample_count, "Failed to serialize batch, dropping");
                return;
            }
        };

        let id = match self.store.insert(session_id, &samples_json, sample_count as u32) {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, sample_count, "Failed to persist batch, dropping");
                return;
            }
        };

        self.upload_row(id, session_id, &samples_json, sample_count)
            .await;
    }

    /// Sweep the whole store: evict stale rows, then re-upload what is left
    /// in creation order.
    pub async fn process_pending(&self) {
        self.evict_stale();
        match self.store.all_pending() {
            Ok(rows) => self.upload_rows(rows).await,
            Err(e) => error!(error = %e, "Failed to read pending batches"),
        }
    }

    /// Same as [`process_pending`](Self::process_pending), scoped to one
    /// session.
    pub async fn process_pending_for(&self, session_id: &str) {
        self.evict_stale();
        match self.store.pending_for(session_id) {
            Ok(rows) => self.upload_rows(rows).await,
            Err(e) => error!(error = %e, session_id, "Failed to read pending batches"),
        }
    }

    fn evict_stale(&self) {
        match self.store.evict_stale(MAX_ATTEMPTS) {
            Ok(0) => {}
            Ok(evicted) => warn!(evicted, max_attempts = MAX_ATTEMPTS, "Evicted stale batches"),
            Err(e) => error!(error = %e, "Failed to evict stale batches"),
        }
    }

    async fn upload_rows(&self, rows: Vec<PendingBatch>) {
        for row in rows {
            // The row's own session id, not the active one.
            self.upload_row(
                row.id,
                &row.session_id,
                &row.samples_json,
                row.sample_count as usize,
            )
            .await;
        }
    }

    async fn upload_row(
        &self,
        id: i64,
        session_id: &str,
        samples_json: &str,
        sample_count: usize,
    ) -> UploadClassification {
        let events = match RawValue::from_string(samples_json.to_string()) {
            Ok(raw) => raw,
            Err(e) => {
                // A corrupt row keeps failing until stale eviction removes it.
                error!(error = %e, batch_id = id, "Corrupt persisted batch");
                self.record_retry(id);
                return UploadClassification::Retryable;
            }
        };
        let body = TelemetryWire {
            session_id,
            events: &events,
        };
        let encoded = match serde_json::to_vec(&body) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!(error = %e, batch_id = id, "Failed to encode telemetry request");
                self.record_retry(id);
                return UploadClassification::Retryable;
            }
        };

        let outcome = self.api.post(TELEMETRY_PATH, &encoded).await;
        let classification = classify(&outcome);
        match classification {
            UploadClassification::Success => {
                debug!(batch_id = id, session_id, sample_count, "Batch uploaded");
                if let Err(e) = self.store.delete(id) {
                    error!(error = %e, batch_id = id, "Failed to delete uploaded batch");
                }
            }
            UploadClassification::Retryable => {
                debug!(
                    batch_id = id,
                    session_id,
                    error = %outcome.as_ref().err().map(ToString::to_string).unwrap_or_default(),
                    "Batch upload failed, will retry"
                );
                self.record_retry(id);
            }
            UploadClassification::Permanent => {
                warn!(
                    batch_id = id,
                    session_id,
                    sample_count,
                    error = %outcome.as_ref().err().map(ToString::to_string).unwrap_or_default(),
                    "Batch permanently rejected, discarding"
                );
                if let Err(e) = self.store.delete(id) {
                    error!(error = %e, batch_id = id, "Failed to delete rejected batch");
                }
            }
        }
        classification
    }

    fn record_retry(&self, id: i64) {
        if let Err(e) = self.store.increment_attempts(id) {
            error!(error = %e, batch_id = id, "Failed to record retry attempt");
        }
    }
}
