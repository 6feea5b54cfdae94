use std::time::Duration;

use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;

use port_sweep_rs::scanner::run_scan;
use port_sweep_rs::types::{PassConfig, ScanEvent};

fn configs() -> (PassConfig, PassConfig) {
    (
        PassConfig::new(Duration::from_millis(800), 16),
        PassConfig::new(Duration::from_secs(2), 16),
    )
}

/// Bind then drop to find a loopback port with no listener.
async fn closed_port() -> u16 {
    let l = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    l.local_addr().expect("addr").port()
}

#[tokio::test]
async fn open_port_streams_live_and_lands_in_summary() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let open = listener.local_addr().expect("addr").port();
    let closed = closed_port().await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let (fast, slow) = configs();
    let report = run_scan(
        vec!["127.0.0.1".to_string()],
        vec![closed, open],
        fast,
        slow,
        true,
        tx,
        CancellationToken::new(),
    )
    .await;
    drop(listener);

    let mut events = Vec::new();
    while let Some(ev) = rx.recv().await {
        events.push(ev);
    }

    let opens: Vec<u16> = events
        .iter()
        .filter_map(|ev| match ev {
            ScanEvent::PortOpen { port, .. } => Some(*port),
            _ => None,
        })
        .collect();
    assert_eq!(opens, vec![open], "exactly one open emission");

    // The live emission precedes the finalize event on the stream.
    let open_idx = events
        .iter()
        .position(|ev| matches!(ev, ScanEvent::PortOpen { .. }))
        .expect("open event");
    let done_idx = events
        .iter()
        .position(|ev| matches!(ev, ScanEvent::TargetDone { .. }))
        .expect("done event");
    assert!(open_idx < done_idx);

    match &events[done_idx] {
        ScanEvent::TargetDone { target, open_ports } => {
            assert_eq!(target, "127.0.0.1");
            assert_eq!(open_ports, &vec![open]);
        }
        _ => unreachable!(),
    }

    assert_eq!(report.targets.len(), 1);
    assert!(report.targets[0].resolved);
    assert_eq!(report.targets[0].open_ports, vec![open]);
}

#[tokio::test]
async fn refused_ports_are_not_retried() {
    // Loopback connects to unbound ports refuse immediately, so the retry
    // set stays empty and no extra probes are dispatched.
    let ports = vec![closed_port().await, closed_port().await];

    let (tx, mut rx) = mpsc::unbounded_channel();
    let (fast, slow) = configs();
    let report = run_scan(
        vec!["127.0.0.1".to_string()],
        ports,
        fast,
        slow,
        true,
        tx,
        CancellationToken::new(),
    )
    .await;

    assert_eq!(report.probes_total, 2);
    assert_eq!(report.probes_done, 2);
    assert_eq!(report.open_count, 0);

    let mut events = Vec::new();
    while let Some(ev) = rx.recv().await {
        events.push(ev);
    }
    assert_eq!(
        events,
        vec![ScanEvent::TargetDone {
            target: "127.0.0.1".to_string(),
            open_ports: Vec::new(),
        }],
        "empty open set is still finalized"
    );
}

#[tokio::test]
async fn unresolvable_target_is_skipped_not_fatal() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let open = listener.local_addr().expect("addr").port();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let (fast, slow) = configs();
    let report = run_scan(
        vec![
            "definitely-missing.invalid".to_string(),
            "127.0.0.1".to_string(),
        ],
        vec![open],
        fast,
        slow,
        true,
        tx,
        CancellationToken::new(),
    )
    .await;
    drop(listener);

    assert_eq!(report.targets.len(), 2);
    assert!(!report.targets[0].resolved);
    assert!(report.targets[1].resolved);
    assert_eq!(report.targets[1].open_ports, vec![open]);

    let mut saw_unresolved = false;
    while let Some(ev) = rx.recv().await {
        if let ScanEvent::TargetUnresolved { target } = ev {
            assert_eq!(target, "definitely-missing.invalid");
            saw_unresolved = true;
        }
    }
    assert!(saw_unresolved);
}

#[tokio::test]
async fn timed_out_port_is_retried_and_recovered_in_pass_two() {
    // A backlog-1 listener whose accept queue is pre-saturated: the kernel
    // drops further SYNs, so a fresh connect hangs past the fast timeout.
    // Pass 1 must classify that port as a timeout and queue it; once the
    // queue is drained mid-scan, the slow-pass connect completes and the
    // port is reported open after all.
    let socket = TcpSocket::new_v4().expect("socket");
    socket
        .bind("127.0.0.1:0".parse().expect("addr"))
        .expect("bind");
    let listener = socket.listen(1).expect("listen");
    let addr = listener.local_addr().expect("addr");
    let stalled = addr.port();

    // Saturate the queue and keep it saturated until aborted.
    let mut fillers = Vec::new();
    for _ in 0..6 {
        fillers.push(tokio::spawn(async move {
            if let Ok(Ok(stream)) =
                time::timeout(Duration::from_secs(8), TcpStream::connect(addr)).await
            {
                time::sleep(Duration::from_secs(8)).await;
                drop(stream);
            }
        }));
    }
    time::sleep(Duration::from_millis(100)).await;

    // Well after the fast pass has given up, start accepting so the retry
    // connect (and its SYN retransmit) can get through.
    let drain = tokio::spawn(async move {
        time::sleep(Duration::from_millis(600)).await;
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    let open_listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let open = open_listener.local_addr().expect("addr").port();
    let closed = closed_port().await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let fast = PassConfig::new(Duration::from_millis(200), 16);
    let slow = PassConfig::new(Duration::from_secs(4), 16);
    let report = run_scan(
        vec!["127.0.0.1".to_string()],
        vec![closed, open, stalled],
        fast,
        slow,
        true,
        tx,
        CancellationToken::new(),
    )
    .await;
    drop(open_listener);
    drain.abort();
    for f in fillers {
        f.abort();
    }

    // Exactly the timed-out job is re-dispatched: three fast-pass connects
    // plus the one retry. The refused and open ports never enter the retry
    // set.
    assert_eq!(report.probes_total, 4);
    assert_eq!(report.probes_done, 4);
    assert_eq!(report.timeout_count, 1);

    let opens: Vec<u16> = {
        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        events
            .iter()
            .filter_map(|ev| match ev {
                ScanEvent::PortOpen { port, .. } => Some(*port),
                _ => None,
            })
            .collect()
    };
    // Pass-1 emission precedes the retried port's pass-2 emission.
    assert_eq!(opens, vec![open, stalled]);

    let mut expected = vec![open, stalled];
    expected.sort_unstable();
    assert_eq!(report.targets[0].open_ports, expected);
}

#[tokio::test]
async fn cancelled_scan_dispatches_nothing() {
    let cancel = CancellationToken::new();
    cancel.cancel();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let (fast, slow) = configs();
    let report = run_scan(
        vec!["127.0.0.1".to_string()],
        vec![80, 443],
        fast,
        slow,
        true,
        tx,
        cancel,
    )
    .await;

    assert!(report.targets.is_empty());
    assert_eq!(report.probes_done, 0);
    assert!(rx.recv().await.is_none());
}
