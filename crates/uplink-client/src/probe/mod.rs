// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Probe layer for backend health checks.
//!
//! A probe is a single external call that reports backend reachability as a
//! boolean: `Ok(true)` for reachable and healthy, `Ok(false)` for any
//! identifiable failure. A probe should not normally error; if it does, the
//! monitor treats the error the same as `Ok(false)`.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while executing a probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe transport failed: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        ProbeError::Transport(err.to_string())
    }
}

/// A single health check against the automation backend.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Perform one health check.
    ///
    /// Returns `Ok(true)` when the backend is reachable and healthy and
    /// `Ok(false)` on any identifiable failure. Latency and server-side retry
    /// behavior are the backend's concern; callers only interpret the outcome.
    async fn check(&self) -> Result<bool, ProbeError>;
}

#[async_trait]
impl<P> Probe for Arc<P>
where
    P: Probe + ?Sized,
{
    async fn check(&self) -> Result<bool, ProbeError> {
        (**self).check().await
    }
}

/// Adapter that turns an async closure into a [`Probe`].
///
/// Useful for tests and for embedding a custom health check without defining
/// a new type:
///
/// ```
/// use uplink_client::{FnProbe, ProbeError};
///
/// let probe = FnProbe::new(|| async { Ok::<_, ProbeError>(true) });
/// # let _ = probe;
/// ```
pub struct FnProbe<F> {
    func: F,
}

impl<F> FnProbe<F> {
    /// Wrap an async closure as a probe.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> std::fmt::Debug for FnProbe<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnProbe").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> Probe for FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool, ProbeError>> + Send,
{
    async fn check(&self) -> Result<bool, ProbeError> {
        (self.func)().await
    }
}

/// HTTP health probe against the automation backend.
///
/// Issues a GET request to the configured health endpoint. A 2xx response
/// means the backend is reachable and healthy; any other status code is an
/// identifiable failure. Transport errors (DNS, refused connection, TLS)
/// surface as [`ProbeError`] and are folded into the failure path by the
/// monitor.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    /// Create a probe against the given health endpoint URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Create a probe that reuses an existing HTTP client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// The health endpoint URL this probe targets.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn check(&self) -> Result<bool, ProbeError> {
        let response = self.client.get(&self.url).send().await?;
        Ok(response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fn_probe_forwards_outcome() {
        let probe = FnProbe::new(|| async { Ok(true) });
        assert!(probe.check().await.unwrap());

        let probe = FnProbe::new(|| async { Ok(false) });
        assert!(!probe.check().await.unwrap());
    }

    #[tokio::test]
    async fn fn_probe_forwards_error() {
        let probe = FnProbe::new(|| async {
            Err(ProbeError::Transport("connection refused".to_string()))
        });
        assert!(probe.check().await.is_err());
    }

    #[tokio::test]
    async fn arc_probe_delegates() {
        let probe = Arc::new(FnProbe::new(|| async { Ok(true) }));
        assert!(probe.check().await.unwrap());
    }

    #[test]
    fn http_probe_keeps_url() {
        let probe = HttpProbe::new("http://localhost:5678/healthz");
        assert_eq!(probe.url(), "http://localhost:5678/healthz");
    }
}
