use thiserror::Error;

/// Configuration-level errors that abort a scan before or instead of probing.
///
/// Probe-level failures are never errors: a refused or unreachable connect is
/// classified as an outcome (`ProbeOutcome::ClosedOrFiltered`) and a single
/// target failing DNS resolution is reported and skipped without touching the
/// remaining targets.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("invalid port spec: {0}")]
    InvalidPortSpec(String),

    #[error("invalid target spec: {0}")]
    InvalidTargetSpec(String),

    #[error("no resolvable targets")]
    NoResolvableTargets,
}
