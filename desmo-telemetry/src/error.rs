// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::session::SessionPhase;
use std::error::Error;
use std::fmt::Display;

/// Maximum number of response-body bytes carried inside a
/// [`TransportError::Status`].
pub const BODY_PREVIEW_LIMIT: usize = 256;

/// Failure of a single HTTP exchange with the ingestion backend.
#[derive(Debug)]
pub enum TransportError {
    /// The backend answered with a non-2xx status code.
    Status {
        code: u16,
        url: String,
        body_preview: String,
    },
    /// The request never produced a status: DNS, connect, reset, TLS.
    Network { source: anyhow::Error },
    /// The transport timeout elapsed before a response arrived.
    Timeout,
    /// The response body could not be decoded.
    Decoding(serde_json::Error),
    /// The response decoded but did not carry the expected fields.
    InvalidResponse,
}

impl Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Status {
                code,
                url,
                body_preview,
            } => {
                write!(f, "server returned {code} for {url}: {body_preview}")
            }
            TransportError::Network { source } => write!(f, "network error: {source}"),
            TransportError::Timeout => write!(f, "request timed out"),
            TransportError::Decoding(e) => write!(f, "malformed response: {e}"),
            TransportError::InvalidResponse => write!(f, "unexpected response shape"),
        }
    }
}

impl Error for TransportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TransportError::Network { source } => source.chain().next(),
            TransportError::Decoding(e) => Some(e),
            _ => None,
        }
    }
}

impl TransportError {
    pub fn network(source: impl Into<anyhow::Error>) -> Self {
        TransportError::Network {
            source: source.into(),
        }
    }

    /// The HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(value: serde_json::Error) -> Self {
        TransportError::Decoding(value)
    }
}

/// Error surfaced by every public entry point of the SDK.
///
/// Entry points are total: they never panic and never leave the session
/// state machine in a transient state when they return one of these.
#[derive(Debug)]
pub enum DesmoError {
    /// The configured api key was rejected at construction.
    InvalidApiKey,
    /// A session operation was invoked from the wrong state.
    InvalidState {
        expected: SessionPhase,
        actual: SessionPhase,
    },
    /// A stop or flush was requested while no session id is held.
    NoActiveSession,
    /// A remote call failed.
    Transport(TransportError),
}

impl Display for DesmoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DesmoError::InvalidApiKey => {
                write!(f, "invalid api key: expected a key with the pk_ prefix")
            }
            DesmoError::InvalidState { expected, actual } => {
                write!(f, "invalid session state: expected {expected}, was {actual}")
            }
            DesmoError::NoActiveSession => write!(f, "no active session"),
            DesmoError::Transport(e) => std::fmt::Display::fmt(e, f),
        }
    }
}

impl Error for DesmoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DesmoError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for DesmoError {
    fn from(value: TransportError) -> Self {
        DesmoError::Transport(value)
    }
}
