// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Core-facing HTTP façade: gzip-encoded JSON POSTs against the configured
//! endpoint, with every failure folded into [`TransportError`].

use crate::error::{TransportError, BODY_PREVIEW_LIMIT};
use bytes::Bytes;
use desmo_common::{header, Endpoint, HttpClient};
use http_body_util::{BodyExt, Full};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("desmo-telemetry/", env!("CARGO_PKG_VERSION"));

pub struct ApiClient {
    endpoint: Endpoint,
    client: HttpClient,
}

impl ApiClient {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            client: desmo_common::new_default_client(),
        }
    }

    /// POST `json_body` to `path`, gzip-compressed.
    ///
    /// Returns the response body on any 2xx status. Non-2xx statuses come
    /// back as [`TransportError::Status`] carrying a bounded body preview.
    pub async fn post(&self, path: &str, json_body: &[u8]) -> Result<Bytes, TransportError> {
        let compressed = gzip(json_body).map_err(TransportError::network)?;
        let url = self
            .endpoint
            .url_for(path)
            .map_err(TransportError::network)?
            .to_string();

        debug!(
            url = %url,
            raw_bytes = json_body.len(),
            compressed_bytes = compressed.len(),
            "Posting payload"
        );

        let request = self
            .endpoint
            .to_request_builder(path, USER_AGENT)
            .map_err(TransportError::network)?
            .header(hyper::header::CONTENT_TYPE, header::APPLICATION_JSON_UTF8)
            .header(hyper::header::CONTENT_ENCODING, header::GZIP)
            .body(Full::new(Bytes::from(compressed)))
            .map_err(TransportError::network)?;

        let response = tokio::time::timeout(
            Duration::from_millis(self.endpoint.timeout_ms),
            self.client.request(request),
        )
        .await
        .map_err(|_| TransportError::Timeout)?
        .map_err(TransportError::network)?;

        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(TransportError::network)?
            .to_bytes();

        if !status.is_success() {
            return Err(TransportError::Status {
                code: status.as_u16(),
                url,
                body_preview: body_preview(&body),
            });
        }
        Ok(body)
    }

    /// POST a serializable request and decode the JSON response, for the
    /// session start/stop RPCs.
    pub async fn post_json<T, R>(&self, path: &str, body: &T) -> Result<R, TransportError>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let encoded = serde_json::to_vec(body)?;
        let response = self.post(path, &encoded).await?;
        Ok(serde_json::from_slice(&response)?)
    }
}

fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder.write_all(data)?;
    encoder.finish()
}

fn body_preview(body: &[u8]) -> String {
    let preview = String::from_utf8_lossy(body);
    preview.chars().take(BODY_PREVIEW_LIMIT).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client_for(server: &MockServer, timeout_ms: u64) -> ApiClient {
        let endpoint = Endpoint::from_url(server.url("/").parse().unwrap())
            .with_api_key("pk_test_key".into())
            .with_timeout(timeout_ms);
        ApiClient::new(endpoint)
    }

    #[test]
    fn test_gzip_round_trips() {
        let compressed = gzip(b"{\"sessionId\":\"s1\"}").unwrap();
        let mut decoder = flate2::read::GzDecoder::new(compressed.as_slice());
        let mut decompressed = String::new();
        std::io::Read::read_to_string(&mut decoder, &mut decompressed).unwrap();
        assert_eq!(decompressed, "{\"sessionId\":\"s1\"}");
    }

    #[test]
    fn test_body_preview_is_bounded() {
        let long = vec![b'x'; 4 * BODY_PREVIEW_LIMIT];
        assert_eq!(body_preview(&long).len(), BODY_PREVIEW_LIMIT);
    }

    #[cfg_attr(miri, ignore)]
    #[tokio::test]
    async fn test_post_sets_headers_and_returns_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/telemetry")
                    .header("content-type", "application/json; charset=utf-8")
                    .header("content-encoding", "gzip")
                    .header("desmo-key", "pk_test_key");
                then.status(200).body(r#"{"accepted":true}"#);
            })
            .await;

        let client = client_for(&server, 5_000);
        let body = client.post("/v1/telemetry", b"{}").await.unwrap();
        assert_eq!(&body[..], br#"{"accepted":true}"#);
        mock.assert_async().await;
    }

    #[cfg_attr(miri, ignore)]
    #[tokio::test]
    async fn test_non_2xx_becomes_status_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/telemetry");
                then.status(503).body("overloaded");
            })
            .await;

        let client = client_for(&server, 5_000);
        let err = client.post("/v1/telemetry", b"{}").await.unwrap_err();
        match err {
            TransportError::Status {
                code,
                url,
                body_preview,
            } => {
                assert_eq!(code, 503);
                assert!(url.ends_with("/v1/telemetry"));
                assert_eq!(body_preview, "overloaded");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[cfg_attr(miri, ignore)]
    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Nothing listens on this port.
        let endpoint = Endpoint::from_url("http://127.0.0.1:9/".parse().unwrap());
        let client = ApiClient::new(endpoint);
        let err = client.post("/v1/telemetry", b"{}").await.unwrap_err();
        assert!(matches!(err, TransportError::Network { .. }));
    }

    #[cfg_attr(miri, ignore)]
    #[tokio::test]
    async fn test_unresponsive_server_times_out() {
        // Accepts connections at the OS level but never answers.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let endpoint =
            Endpoint::from_url(format!("http://{addr}/").parse().unwrap()).with_timeout(50);
        let client = ApiClient::new(endpoint);
        let err = client.post("/v1/telemetry", b"{}").await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout));
    }

    #[cfg_attr(miri, ignore)]
    #[tokio::test]
    async fn test_post_json_decodes_response() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/sessions/start");
                then.status(200)
                    .body(r#"{"sessionId":"s1","status":"recording"}"#);
            })
            .await;

        let client = client_for(&server, 5_000);
        let response: crate::data::SessionResponse = client
            .post_json("/v1/sessions/start", &serde_json::json!({"deliveryId": "d1"}))
            .await
            .unwrap();
        assert_eq!(response.session_id, "s1");
    }

    #[cfg_attr(miri, ignore)]
    #[tokio::test]
    async fn test_post_json_malformed_response_is_decoding_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/sessions/start");
                then.status(200).body("not json");
            })
            .await;

        let client = client_for(&server, 5_000);
        let err = client
            .post_json::<_, crate::data::SessionResponse>(
                "/v1/sessions/start",
                &serde_json::json!({}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Decoding(_)));
    }
}
