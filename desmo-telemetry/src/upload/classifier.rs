// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::TransportError;
use bytes::Bytes;

/// What an upload attempt means for the persisted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadClassification {
    /// Delete the row; the backend has the batch.
    Success,
    /// Keep the row and bump its attempt count.
    Retryable,
    /// Delete the row; retrying can never succeed.
    Permanent,
}

/// Classify a bare HTTP status code.
///
/// `429` is deliberately Permanent: this SDK refuses to add load while the
/// backend is rate limiting.
pub fn classify_status(status: u16) -> UploadClassification {
    match status {
        200..=299 => UploadClassification::Success,
        400..=499 => UploadClassification::Permanent,
        _ => UploadClassification::Retryable,
    }
}

/// Classify the outcome of one transport exchange. Anything that never
/// produced a status code is worth retrying.
pub fn classify(outcome: &Result<Bytes, TransportError>) -> UploadClassification {
    match outcome {
        Ok(_) => UploadClassification::Success,
        Err(TransportError::Status { code, .. }) => classify_status(*code),
        Err(TransportError::Network { .. })
        | Err(TransportError::Timeout)
        | Err(TransportError::Decoding(_))
        | Err(TransportError::InvalidResponse) => UploadClassification::Retryable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier_is_total_over_the_status_range() {
        for status in 100u16..600 {
            let expected = if (200..300).contains(&status) {
                UploadClassification::Success
            } else if (400..500).contains(&status) {
                UploadClassification::Permanent
            } else {
                UploadClassification::Retryable
            };
            assert_eq!(classify_status(status), expected, "status {status}");
        }
    }

    #[test]
    fn test_429_is_permanent() {
        assert_eq!(classify_status(429), UploadClassification::Permanent);
    }

    #[test]
    fn test_informational_and_redirect_are_retryable() {
        assert_eq!(classify_status(100), UploadClassification::Retryable);
        assert_eq!(classify_status(301), UploadClassification::Retryable);
        assert_eq!(classify_status(500), UploadClassification::Retryable);
    }

    #[test]
    fn test_every_transport_error_is_retryable() {
        let errors = [
            TransportError::network(anyhow::anyhow!("connection reset")),
            TransportError::Timeout,
            TransportError::Decoding(serde_json::from_str::<u32>("x").unwrap_err()),
            TransportError::InvalidResponse,
        ];
        for err in errors {
            assert_eq!(classify(&Err(err)), UploadClassification::Retryable);
        }
    }

    #[test]
    fn test_success_body_is_success() {
        assert_eq!(
            classify(&Ok(Bytes::from_static(b"{}"))),
            UploadClassification::Success
        );
    }
}
