use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use ::time::{format_description::well_known, OffsetDateTime};

use crate::probe::connect_probe;
use crate::targets;
use crate::types::{PassConfig, ProbeOutcome, ScanEvent, ScanReport, TargetReport};

/// Shared probe counters, updated concurrently by in-flight probes.
#[derive(Clone, Debug, Default)]
pub struct ScanCounters {
    pub probes_total: Arc<AtomicU64>,
    pub probes_done: Arc<AtomicU64>,
    pub open_count: Arc<AtomicU64>,
    pub timeout_count: Arc<AtomicU64>,
}

impl ScanCounters {
    pub fn snapshot(&self) -> (u64, u64, u64, u64) {
        (
            self.probes_total.load(Ordering::Relaxed),
            self.probes_done.load(Ordering::Relaxed),
            self.open_count.load(Ordering::Relaxed),
            self.timeout_count.load(Ordering::Relaxed),
        )
    }
}

/// One queued connect attempt. The leading index is the position in the
/// sequencer-ordered dispatch list, so the retry set can be restored to
/// sequencer order after concurrent completion scrambles it.
type ProbeJob = (usize, IpAddr, u16);

/// Scan every target in order, streaming events as they happen.
///
/// Targets run sequentially, so output lines never interleave across targets.
/// A target that fails DNS resolution produces a `TargetUnresolved` event and
/// is skipped; the rest of the list still runs. The returned report carries
/// the per-target summaries and aggregate probe counters.
pub async fn run_scan(
    target_names: Vec<String>,
    ports: Vec<u16>,
    fast: PassConfig,
    slow: PassConfig,
    retry: bool,
    events: UnboundedSender<ScanEvent>,
    cancel: CancellationToken,
) -> ScanReport {
    let counters = ScanCounters::default();
    let started_at = now_rfc3339();
    let mut reports = Vec::with_capacity(target_names.len());

    for target in target_names {
        if cancel.is_cancelled() {
            break;
        }
        let ips = targets::resolve(&target).await;
        if ips.is_empty() {
            let _ = events.send(ScanEvent::TargetUnresolved {
                target: target.clone(),
            });
            reports.push(TargetReport {
                target,
                resolved: false,
                open_ports: Vec::new(),
            });
            continue;
        }
        let open_ports = scan_target(
            &target, &ips, &ports, fast, slow, retry, &events, &counters, &cancel,
        )
        .await;
        reports.push(TargetReport {
            target,
            resolved: true,
            open_ports,
        });
    }

    let (probes_total, probes_done, open_count, timeout_count) = counters.snapshot();
    ScanReport {
        started_at,
        probes_total,
        probes_done,
        open_count,
        timeout_count,
        targets: reports,
    }
}

/// Run the two-pass schedule for one resolved target.
///
/// Pass 1 sweeps the full port sequence with the fast timeout; every probe
/// that came back `Timeout` is inconclusive and queued for pass 2, which
/// re-probes exactly that set with the slow timeout. `Open` is emitted to the
/// event stream the instant it is observed in either pass, and a port that
/// was open in pass 1 is never re-probed (only timeouts are). Returns the
/// final ascending open-port set and emits `TargetDone` carrying the same.
#[allow(clippy::too_many_arguments)]
pub async fn scan_target(
    target: &str,
    ips: &[IpAddr],
    ports: &[u16],
    fast: PassConfig,
    slow: PassConfig,
    retry: bool,
    events: &UnboundedSender<ScanEvent>,
    counters: &ScanCounters,
    cancel: &CancellationToken,
) -> Vec<u16> {
    // Port-major dispatch order: every address of a target is probed for a
    // port before the sequencer moves on, keeping popular ports earliest.
    let mut jobs: Vec<ProbeJob> = Vec::with_capacity(ports.len() * ips.len());
    for &port in ports {
        for &ip in ips {
            jobs.push((jobs.len(), ip, port));
        }
    }
    counters
        .probes_total
        .fetch_add(jobs.len() as u64, Ordering::Relaxed);

    let open = Arc::new(Mutex::new(HashSet::new()));
    let retry_set = run_pass(
        target,
        jobs,
        fast,
        retry,
        &open,
        events,
        counters,
        cancel,
    )
    .await;

    if !retry_set.is_empty() && !cancel.is_cancelled() {
        counters
            .probes_total
            .fetch_add(retry_set.len() as u64, Ordering::Relaxed);
        run_pass(target, retry_set, slow, false, &open, events, counters, cancel).await;
    }

    let mut open_ports: Vec<u16> = open.lock().await.iter().copied().collect();
    open_ports.sort_unstable();
    let _ = events.send(ScanEvent::TargetDone {
        target: target.to_string(),
        open_ports: open_ports.clone(),
    });
    open_ports
}

/// Dispatch one pass over `jobs` with a hard in-flight cap.
///
/// A semaphore permit is acquired before each task is spawned and held until
/// the probe finishes, so at most `cfg.concurrency` connects are ever
/// outstanding. When `collect_timeouts` is set, timed-out jobs are gathered
/// and returned in their original dispatch order for the retry pass.
#[allow(clippy::too_many_arguments)]
async fn run_pass(
    target: &str,
    jobs: Vec<ProbeJob>,
    cfg: PassConfig,
    collect_timeouts: bool,
    open: &Arc<Mutex<HashSet<u16>>>,
    events: &UnboundedSender<ScanEvent>,
    counters: &ScanCounters,
    cancel: &CancellationToken,
) -> Vec<ProbeJob> {
    let sem = Arc::new(Semaphore::new(cfg.concurrency));
    let timeouts = Arc::new(Mutex::new(Vec::<ProbeJob>::new()));
    let target: Arc<str> = Arc::from(target);
    let mut set = JoinSet::new();

    for job in jobs {
        if cancel.is_cancelled() {
            break;
        }
        let Ok(permit) = sem.clone().acquire_owned().await else {
            break;
        };
        let open = open.clone();
        let timeouts = timeouts.clone();
        let events = events.clone();
        let counters = counters.clone();
        let cancel = cancel.clone();
        let target = target.clone();

        set.spawn(async move {
            let _permit = permit; // held for the probe's lifetime

            if cancel.is_cancelled() {
                return;
            }
            let (_, ip, port) = job;
            let outcome = connect_probe(SocketAddr::new(ip, port), cfg.timeout).await;
            counters.probes_done.fetch_add(1, Ordering::Relaxed);

            match outcome {
                ProbeOutcome::Open => {
                    // First insertion wins: multiple addresses (or, in
                    // principle, both passes) racing on the same port emit
                    // exactly one event.
                    let mut guard = open.lock().await;
                    if guard.insert(port) {
                        counters.open_count.fetch_add(1, Ordering::Relaxed);
                        let _ = events.send(ScanEvent::PortOpen {
                            target: target.to_string(),
                            port,
                        });
                    }
                }
                ProbeOutcome::Timeout => {
                    counters.timeout_count.fetch_add(1, Ordering::Relaxed);
                    if collect_timeouts {
                        timeouts.lock().await.push(job);
                    }
                }
                ProbeOutcome::ClosedOrFiltered => {}
            }
        });
    }

    while set.join_next().await.is_some() {}

    let mut retry = timeouts.lock().await.clone();
    retry.sort_unstable_by_key(|&(seq, _, _)| seq);
    retry
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
