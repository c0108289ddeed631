// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Hyper client plumbing shared by every crate that talks to the Desmo
//! backend.
//!
//! Request bodies are always fully buffered ([`http_body_util::Full`]); the
//! SDK never streams uploads, so the extra body machinery a streaming client
//! would need is deliberately absent.

use bytes::Bytes;
use http_body_util::Full;

pub type Body = Full<Bytes>;
pub type HttpRequestBuilder = hyper::http::request::Builder;
pub type HttpResponse = hyper::Response<hyper::body::Incoming>;
pub type ClientError = hyper_util::client::legacy::Error;

#[cfg(feature = "https")]
mod connector {
    use hyper_util::client::legacy::connect::HttpConnector;

    pub type Connector = hyper_rustls::HttpsConnector<HttpConnector>;

    pub fn build() -> Connector {
        // Hosts without a native root store still get TLS via the bundled
        // webpki roots.
        let builder = match hyper_rustls::HttpsConnectorBuilder::new().with_native_roots() {
            Ok(builder) => builder,
            Err(_) => hyper_rustls::HttpsConnectorBuilder::new().with_webpki_roots(),
        };
        builder.https_or_http().enable_http1().build()
    }
}

#[cfg(not(feature = "https"))]
mod connector {
    use hyper_util::client::legacy::connect::HttpConnector;

    pub type Connector = HttpConnector;

    pub fn build() -> Connector {
        HttpConnector::new()
    }
}

pub type HttpClient = hyper_util::client::legacy::Client<connector::Connector, Body>;

/// Create a new default configuration hyper client.
///
/// Connections are kept open and reused; the SDK uploads on a fixed cadence
/// so the pool stays warm between flushes.
pub fn new_default_client() -> HttpClient {
    hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::default())
        .build(connector::build())
}
