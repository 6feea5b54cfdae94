use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of a single TCP connect attempt against one (address, port).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Full handshake completed; the connection is closed immediately.
    Open,
    /// Refused (RST) or any other transport-level rejection. The connect
    /// layer cannot tell closed from filtered apart, so both collapse here.
    ClosedOrFiltered,
    /// No conclusive answer within the configured timeout.
    Timeout,
}

/// Timeout and concurrency settings for one scheduler pass.
///
/// Two instances exist per scan: the fast sweep and the slow retry pass.
#[derive(Debug, Clone, Copy)]
pub struct PassConfig {
    pub timeout: Duration,
    pub concurrency: usize,
}

impl PassConfig {
    /// Concurrency is clamped to [1, 1024] so a typo cannot exhaust local
    /// ephemeral ports or file descriptors.
    pub fn new(timeout: Duration, concurrency: usize) -> Self {
        Self {
            timeout,
            concurrency: concurrency.clamp(1, 1024),
        }
    }
}

/// Events produced by the result stream, in true discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A port was classified open; emitted at most once per (target, port).
    PortOpen { target: String, port: u16 },
    /// Both passes finished for a target; `open_ports` is ascending and
    /// duplicate-free (empty is a valid, reportable outcome).
    TargetDone { target: String, open_ports: Vec<u16> },
    /// DNS resolution failed; the target was skipped.
    TargetUnresolved { target: String },
}

/// Final per-target summary.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TargetReport {
    pub target: String,
    pub resolved: bool,
    pub open_ports: Vec<u16>,
}

/// Aggregate results and probe counters for a whole run.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ScanReport {
    pub started_at: String,
    pub probes_total: u64,
    pub probes_done: u64,
    pub open_count: u64,
    pub timeout_count: u64,
    pub targets: Vec<TargetReport>,
}
