use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::creds::CredentialSet;
use crate::scanner::ScanStats;
use crate::transport::Transport;
use crate::types::{CredentialPair, Endpoint};

/// Verdict for one endpoint after the credential loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrialOutcome {
    Success(CredentialPair),
    FalsePositive,
    Failure,
}

/// Flags 2xx pages that are really a credential rejection in disguise.
///
/// Some embedded firmware answers a bad login with status 200 and an HTML
/// error page quoting "HTTP 401". This is a heuristic: a device using other
/// wording will slip through as a success.
#[derive(Debug, Clone)]
pub struct FalsePositiveFilter {
    markers: Vec<String>,
}

impl FalsePositiveFilter {
    pub fn new(markers: Vec<String>) -> Self {
        Self { markers }
    }

    pub fn is_false_positive(&self, body: &str) -> bool {
        self.markers.iter().any(|m| body.contains(m.as_str()))
    }
}

impl Default for FalsePositiveFilter {
    fn default() -> Self {
        Self::new(vec![crate::config::DEFAULT_FALSE_POSITIVE_MARKER.to_string()])
    }
}

/// Try each pair in order against a confirmed-401 endpoint.
///
/// Stops at the first success or the first false positive. Transport errors
/// and rejected logins (status >= 400) count against that pair only. The
/// `interrupt` token is checked before every request, so a user interrupt
/// costs at most the request already in flight.
pub async fn try_credentials<T: Transport + ?Sized>(
    transport: &T,
    endpoint: &Endpoint,
    creds: &CredentialSet,
    filter: &FalsePositiveFilter,
    timeout: Duration,
    stats: &ScanStats,
    interrupt: &CancellationToken,
) -> TrialOutcome {
    let url = endpoint.base_url();

    for pair in creds.iter() {
        if interrupt.is_cancelled() {
            debug!(%url, "interrupted, abandoning credential loop");
            return TrialOutcome::Failure;
        }

        debug!(%url, %pair, "checking");
        stats.trial_requests.fetch_add(1, Ordering::Relaxed);

        let resp = match transport.get_with_basic_auth(&url, &pair, timeout).await {
            Ok(resp) => resp,
            Err(e) => {
                debug!(%url, %pair, error = %e, "trial request failed");
                continue;
            }
        };

        if resp.status >= 400 {
            debug!(%url, %pair, status = resp.status, "rejected");
            continue;
        }

        if filter.is_false_positive(&resp.body) {
            warn!(%url, "HTTP 401 found in html. Possibly false positive. Omitting from output");
            return TrialOutcome::FalsePositive;
        }

        return TrialOutcome::Success(pair);
    }

    TrialOutcome::Failure
}
