use std::time::Duration;

use tracing::debug;

use crate::transport::{ProbeOutcome, Transport};
use crate::types::Endpoint;

/// Unauthenticated GET against the endpoint. Returns `true` only when it
/// answered 401, i.e. it is worth running credentials against.
///
/// Anything else (other status, refused, timeout, DNS) just filters the
/// endpoint out; nothing is surfaced beyond a debug line.
pub async fn probe<T: Transport + ?Sized>(transport: &T, endpoint: &Endpoint, timeout: Duration) -> bool {
    let url = endpoint.base_url();
    match transport.probe(&url, timeout).await {
        ProbeOutcome::Candidate => {
            debug!(%url, "401 received, basic auth candidate");
            true
        }
        ProbeOutcome::NotCandidate { status } => {
            debug!(%url, status, "not a basic auth candidate");
            false
        }
        ProbeOutcome::TransportError(e) => {
            debug!(%url, error = %e, "probe failed");
            false
        }
    }
}
