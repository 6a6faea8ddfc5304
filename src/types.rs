use std::fmt;

use serde::{Deserialize, Serialize};

/// A host under test, with an optional explicit port.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub address: String,
    pub port: Option<u16>,
}

impl Endpoint {
    pub fn new(address: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    /// Fully-qualified base URL, `http://address[:port]`.
    pub fn base_url(&self) -> String {
        match self.port {
            Some(port) => format!("http://{}:{}", self.address, port),
            None => format!("http://{}", self.address),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_url())
    }
}

/// One username/password combination tried against an endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CredentialPair {
    pub username: String,
    pub password: String,
}

impl CredentialPair {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Display for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.username, self.password)
    }
}

/// One confirmed login.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub endpoint: String,
    pub username: String,
    pub password: String,
    pub timestamp: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Cancelled,
}

/// Counter snapshot taken when the run ends.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub dequeued: u64,
    pub candidates: u64,
    pub trial_requests: u64,
    pub false_positives: u64,
    pub successes: u64,
}

/// Everything handed to the rendering side once the controller is done.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScanReport {
    pub status: RunStatus,
    pub endpoints_total: u64,
    pub workers_started: usize,
    pub stats: StatsSnapshot,
    pub entries: Vec<ReportEntry>,
    pub started_at: String,
    pub finished_at: String,
}
