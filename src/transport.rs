use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, StatusCode};
use tracing::debug;

use crate::error::TransportError;
use crate::types::CredentialPair;

/// Result of the unauthenticated probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The endpoint answered 401 Unauthorized.
    Candidate,
    /// Any other status code.
    NotCandidate { status: u16 },
    TransportError(TransportError),
}

/// A response to an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResponse {
    pub status: u16,
    pub body: String,
}

/// The two HTTP interactions the engine needs. Mocked in tests.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome;

    async fn get_with_basic_auth(
        &self,
        url: &str,
        pair: &CredentialPair,
        timeout: Duration,
    ) -> Result<AuthResponse, TransportError>;
}

/// `reqwest`-backed transport. Each request carries its own timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .redirect(Policy::limited(5))
            .pool_idle_timeout(Duration::from_secs(30))
            .user_agent(concat!("basic-auth-scan-rs/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome {
        match self.client.get(url).timeout(timeout).send().await {
            Ok(resp) if resp.status() == StatusCode::UNAUTHORIZED => ProbeOutcome::Candidate,
            Ok(resp) => ProbeOutcome::NotCandidate {
                status: resp.status().as_u16(),
            },
            Err(e) => ProbeOutcome::TransportError(classify(e, timeout)),
        }
    }

    async fn get_with_basic_auth(
        &self,
        url: &str,
        pair: &CredentialPair,
        timeout: Duration,
    ) -> Result<AuthResponse, TransportError> {
        let resp = self
            .client
            .get(url)
            .basic_auth(&pair.username, Some(&pair.password))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(timeout)
            } else {
                TransportError::Body(e.to_string())
            }
        })?;
        debug!(url, status, bytes = body.len(), "authenticated response");
        Ok(AuthResponse { status, body })
    }
}

fn classify(e: reqwest::Error, timeout: Duration) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(timeout)
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else if e.is_body() || e.is_decode() {
        TransportError::Body(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}
