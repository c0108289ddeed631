// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Store-and-forward upload path: durable persistence first, transmission
//! second, with a single classification policy shared by the live flush and
//! the retry sweep.

mod classifier;
mod queue;

pub use classifier::{classify, classify_status, UploadClassification};
pub use queue::{UploadQueue, MAX_ATTEMPTS};
