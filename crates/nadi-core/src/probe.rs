//! One-shot connectivity diagnostics that bypass the tracker.

use nadi_transport::Transport;
use nadi_types::{Endpoint, Reporter};

const EMPTY_BODY: &[u8] = b"{}";

/// Outcome of a verify or test call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub endpoint: Endpoint,
    pub ok: bool,
    /// HTTP status, when the server answered
    pub status: Option<u16>,
    /// Server message on success, failure reason otherwise
    pub message: Option<String>,
}

/// Check the configured credentials against the `verify` endpoint.
pub fn verify(transport: &dyn Transport, reporter: &mut dyn Reporter) -> ProbeReport {
    check(transport, Endpoint::Verify, reporter)
}

/// Check that the ingestion service is reachable via the `test` endpoint.
pub fn probe(transport: &dyn Transport, reporter: &mut dyn Reporter) -> ProbeReport {
    check(transport, Endpoint::Test, reporter)
}

fn check(transport: &dyn Transport, endpoint: Endpoint, reporter: &mut dyn Reporter) -> ProbeReport {
    reporter.info(&format!("calling {endpoint} endpoint..."));

    match transport.send(endpoint, Some(EMPTY_BODY)) {
        Ok(reply) => ProbeReport {
            endpoint,
            ok: true,
            status: Some(reply.status),
            message: reply.message,
        },
        Err(e) => {
            reporter.error(&format!("{endpoint} failed: {e}"));
            ProbeReport {
                endpoint,
                ok: false,
                status: e.status(),
                message: Some(e.message()),
            }
        }
    }
}
