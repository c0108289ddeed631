// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

pub mod http_client;

pub use http_client::{new_default_client, HttpClient, HttpRequestBuilder, HttpResponse};

/// Extension trait for `Mutex` to provide a method that acquires a lock,
/// panicking if the lock is poisoned.
///
/// Avoids sprinkling `#[allow(clippy::unwrap_used)]` over every lock site.
///
/// # Panics
///
/// Panics if the `Mutex` is poisoned.
pub trait MutexExt<T> {
    fn lock_or_panic(&self) -> MutexGuard<'_, T>;
}

impl<T> MutexExt<T> for Mutex<T> {
    #[inline(always)]
    #[track_caller]
    fn lock_or_panic(&self) -> MutexGuard<'_, T> {
        #[allow(clippy::unwrap_used)]
        self.lock().unwrap()
    }
}

pub mod header {
    #![allow(clippy::declare_interior_mutable_const)]
    use hyper::{header::HeaderName, http::HeaderValue};

    pub const DESMO_API_KEY: HeaderName = HeaderName::from_static("desmo-key");
    pub const APPLICATION_JSON_UTF8: HeaderValue =
        HeaderValue::from_static("application/json; charset=utf-8");
    pub const GZIP: HeaderValue = HeaderValue::from_static("gzip");
}

/// A remote ingestion endpoint plus the credentials and timeout used to
/// reach it.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(serialize_with = "serialize_uri", deserialize_with = "deserialize_uri")]
    pub url: hyper::Uri,
    pub api_key: Option<Cow<'static, str>>,
    pub timeout_ms: u64,
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint {
            url: hyper::Uri::default(),
            api_key: None,
            timeout_ms: Self::DEFAULT_TIMEOUT,
        }
    }
}

#[derive(serde::Deserialize, serde::Serialize)]
struct SerializedUri<'a> {
    scheme: Option<Cow<'a, str>>,
    authority: Option<Cow<'a, str>>,
    path_and_query: Option<Cow<'a, str>>,
}

fn serialize_uri<S>(uri: &hyper::Uri, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let parts = uri.clone().into_parts();
    let uri = SerializedUri {
        scheme: parts.scheme.as_ref().map(|s| Cow::Borrowed(s.as_str())),
        authority: parts.authority.as_ref().map(|s| Cow::Borrowed(s.as_str())),
        path_and_query: parts
            .path_and_query
            .as_ref()
            .map(|s| Cow::Borrowed(s.as_str())),
    };
    uri.serialize(serializer)
}

fn deserialize_uri<'de, D>(deserializer: D) -> Result<hyper::Uri, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let uri = SerializedUri::deserialize(deserializer)?;
    let mut builder = hyper::Uri::builder();
    if let Some(v) = uri.authority {
        builder = builder.authority(v.as_ref());
    }
    if let Some(v) = uri.scheme {
        builder = builder.scheme(v.as_ref());
    }
    if let Some(v) = uri.path_and_query {
        builder = builder.path_and_query(v.as_ref());
    }

    builder.build().map_err(Error::custom)
}

impl Endpoint {
    /// Default value for the timeout field in milliseconds.
    pub const DEFAULT_TIMEOUT: u64 = 30_000;

    /// Return a POST request builder targeting `path` under this endpoint,
    /// with the user agent and api-key header applied.
    pub fn to_request_builder(
        &self,
        path: &str,
        user_agent: &str,
    ) -> anyhow::Result<HttpRequestBuilder> {
        let mut builder = hyper::Request::builder()
            .method(hyper::Method::POST)
            .uri(self.url_for(path)?)
            .header(hyper::header::USER_AGENT, user_agent);

        if let Some(api_key) = &self.api_key {
            builder = builder.header(header::DESMO_API_KEY, api_key.as_ref());
        }

        Ok(builder)
    }

    /// Join `path` onto this endpoint's base url, replacing any existing
    /// path component.
    pub fn url_for(&self, path: &str) -> anyhow::Result<hyper::Uri> {
        let mut parts = self.url.clone().into_parts();
        parts.path_and_query = Some(hyper::http::uri::PathAndQuery::from_str(path)?);
        Ok(hyper::Uri::from_parts(parts)?)
    }

    #[inline]
    pub fn from_url(url: hyper::Uri) -> Endpoint {
        Endpoint {
            url,
            ..Default::default()
        }
    }

    /// Set a custom timeout for this endpoint. Pass 0 to keep the default.
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = if timeout_ms == 0 {
            Self::DEFAULT_TIMEOUT
        } else {
            timeout_ms
        };
        self
    }

    pub fn with_api_key(mut self, api_key: Cow<'static, str>) -> Self {
        self.api_key = Some(api_key);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_replaces_path() {
        let endpoint = Endpoint::from_url("https://api.sandbox.desmo.dev/old".parse().unwrap());
        let url = endpoint.url_for("/v1/sessions/start").unwrap();
        assert_eq!(
            url.to_string(),
            "https://api.sandbox.desmo.dev/v1/sessions/start"
        );
    }

    #[test]
    fn test_request_builder_sets_api_key() {
        let endpoint = Endpoint::from_url("http://localhost:8080/".parse().unwrap())
            .with_api_key("pk_test".into());
        let req = endpoint
            .to_request_builder("/v1/telemetry", "desmo-telemetry/1.0.0")
            .unwrap()
            .body(())
            .unwrap();
        assert_eq!(req.method(), hyper::Method::POST);
        assert_eq!(req.headers().get("desmo-key").unwrap(), "pk_test");
        assert_eq!(
            req.headers().get("user-agent").unwrap(),
            "desmo-telemetry/1.0.0"
        );
    }

    #[test]
    fn test_request_builder_without_api_key() {
        let endpoint = Endpoint::from_url("http://localhost:8080/".parse().unwrap());
        let req = endpoint
            .to_request_builder("/v1/telemetry", "desmo-telemetry/1.0.0")
            .unwrap()
            .body(())
            .unwrap();
        assert!(req.headers().get("desmo-key").is_none());
    }

    #[test]
    fn test_default_timeout() {
        assert_eq!(Endpoint::default().timeout_ms, 30_000);
        assert_eq!(Endpoint::default().with_timeout(0).timeout_ms, 30_000);
        assert_eq!(Endpoint::default().with_timeout(5_000).timeout_ms, 5_000);
    }
}
