use std::fs::File;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use port_sweep_rs::errors::ScanError;
use port_sweep_rs::types::{PassConfig, ScanEvent, ScanReport};
use port_sweep_rs::{ports, scanner, services, targets};

/// port-sweep-rs — fast two-pass async TCP connect port scanner.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "port-sweep-rs",
    version,
    about = "Fast two-pass async TCP connect port scanner.",
    long_about = None
)]
struct Cli {
    /// Host, CIDR, comma list, IPv4 last-octet range (1.1.1.7-10), or path to
    /// a file with one target per line.
    target: String,

    /// Ports: e.g. 80,443 or 1-65535, or 'popular', 'all', 'top' (top 1000).
    #[arg(short, long, default_value = "top")]
    ports: String,

    /// Max concurrent connect attempts per pass.
    #[arg(short, long, default_value_t = 300)]
    concurrency: usize,

    /// Fast-pass connect timeout in milliseconds.
    #[arg(long = "tfast-ms", default_value_t = 300)]
    tfast_ms: u64,

    /// Slow retry-pass connect timeout in milliseconds.
    #[arg(long = "tslow-ms", default_value_t = 1000)]
    tslow_ms: u64,

    /// Concurrency for the retry pass (defaults to --concurrency).
    #[arg(long)]
    slow_concurrency: Option<usize>,

    /// Disable the slow retry pass.
    #[arg(long = "no-retry", default_value_t = false)]
    no_retry: bool,

    /// Only print open-port lines.
    #[arg(short, long, default_value_t = false)]
    quiet: bool,

    /// Write the final report as pretty JSON to this path (optional).
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let target_list = targets::load_targets(&cli.target)?;
    if target_list.is_empty() {
        return Err(ScanError::InvalidTargetSpec(cli.target.clone()).into());
    }
    let port_sequence = ports::sequence(&cli.ports)?;

    let fast = PassConfig::new(Duration::from_millis(cli.tfast_ms), cli.concurrency);
    let slow = PassConfig::new(
        Duration::from_millis(cli.tslow_ms),
        cli.slow_concurrency.unwrap_or(cli.concurrency),
    );

    if !cli.quiet {
        println!("port-sweep-rs configuration:");
        println!(
            "  targets      : {} host{}",
            target_list.len(),
            if target_list.len() == 1 { "" } else { "s" }
        );
        println!("  ports        : {} ({})", cli.ports, port_sequence.len());
        println!(
            "  concurrency  : {} / {}",
            fast.concurrency, slow.concurrency
        );
        println!("  timeouts     : {}ms / {}ms", cli.tfast_ms, cli.tslow_ms);
        println!(
            "  retry        : {}",
            if cli.no_retry { "off" } else { "on" }
        );
    }

    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        eprintln!("interrupted, finishing in-flight probes...");
        cancel_ctrlc.cancel();
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let scan = tokio::spawn(scanner::run_scan(
        target_list,
        port_sequence,
        fast,
        slow,
        !cli.no_retry,
        tx,
        cancel.clone(),
    ));

    // Two consumers over one subscription: live open lines as they are
    // discovered, deterministic summaries on finalize.
    let started = Instant::now();
    while let Some(event) = rx.recv().await {
        match event {
            ScanEvent::PortOpen { target, port } => {
                println!("{target}:{port} open");
            }
            ScanEvent::TargetDone { target, open_ports } => {
                if !cli.quiet {
                    print_target_summary(&target, &open_ports);
                }
            }
            ScanEvent::TargetUnresolved { target } => {
                eprintln!("! {target} — DNS resolution failed, skipping");
            }
        }
    }
    let report = scan.await?;
    let elapsed = started.elapsed();

    if !cli.quiet {
        print_run_stats(&report, elapsed);
    }

    if let Some(path) = cli.output.as_deref() {
        if let Err(e) = write_report_json(path, &report) {
            eprintln!("Failed to write JSON to {}: {}", path.display(), e);
        } else if !cli.quiet {
            println!("Wrote JSON report to {}", path.display());
        }
    }

    run_outcome(&report, cancel.is_cancelled())?;
    Ok(())
}

/// Map the finished run to the process outcome. Zero opens is still a
/// successful run, and so is an interrupted one; only a run where nothing
/// could be resolved at all is an error.
fn run_outcome(report: &ScanReport, cancelled: bool) -> Result<(), ScanError> {
    if cancelled {
        return Ok(());
    }
    if !report.targets.iter().any(|t| t.resolved) {
        return Err(ScanError::NoResolvableTargets);
    }
    Ok(())
}

fn print_target_summary(target: &str, open_ports: &[u16]) {
    if open_ports.is_empty() {
        println!("{target}  no open ports");
        return;
    }
    let labels: Vec<String> = open_ports
        .iter()
        .map(|&p| services::port_label(p))
        .collect();
    println!("{target}  open: {}", labels.join(", "));
}

fn print_run_stats(report: &ScanReport, elapsed: Duration) {
    let secs = elapsed.as_secs_f64();
    let pps = if secs > 0.0 {
        report.probes_done as f64 / secs
    } else {
        0.0
    };
    println!(
        "Done in {:.2}s ({} probes, ~{:.0}/s)",
        secs, report.probes_done, pps
    );
    println!(
        "Total: {} open port{}",
        report.open_count,
        if report.open_count == 1 { "" } else { "s" }
    );
    if report.probes_done > 0 && report.timeout_count * 4 > report.probes_done {
        eprintln!(
            "[!] High timeout ratio: {}/{} — target may be firewalled, or try reducing --concurrency",
            report.timeout_count, report.probes_done
        );
    }
    let unresolved = report.targets.iter().filter(|t| !t.resolved).count();
    if unresolved > 0 {
        eprintln!("[!] DNS failed for {unresolved} target(s)");
    }
}

fn write_report_json(path: &std::path::Path, report: &ScanReport) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, report)?;
    Ok(())
}
