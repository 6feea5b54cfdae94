use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time;

use crate::types::ProbeOutcome;

/// Attempt one TCP connect to `addr`, bounded strictly by `timeout`.
///
/// A completed handshake is `Open`; the stream is dropped immediately so no
/// data is ever exchanged. Every connect error (refused, unreachable, no
/// route) maps to `ClosedOrFiltered` -- transport failures never propagate
/// out of a probe. Exceeding the deadline is `Timeout`, the inconclusive
/// outcome that feeds the retry pass.
pub async fn connect_probe(addr: SocketAddr, timeout: Duration) -> ProbeOutcome {
    match time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            drop(stream);
            ProbeOutcome::Open
        }
        Ok(Err(_)) => ProbeOutcome::ClosedOrFiltered,
        Err(_) => ProbeOutcome::Timeout,
    }
}
