// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Wire-format records exchanged with the ingestion backend.

mod sample;
mod session;

pub use sample::*;
pub use session::*;
