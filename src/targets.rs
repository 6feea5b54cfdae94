use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

use anyhow::{bail, Context, Result};
use ipnet::IpNet;

/// Expand one target token list (comma separated) into individual targets.
///
/// Supported forms per token:
/// - CIDR: `192.168.1.0/24` (network/broadcast excluded, like `hosts()`)
/// - IPv4 last-octet range: `10.0.0.5-9` (inclusive, reversed is normalized)
/// - anything else passes through verbatim (IP literal or hostname)
///
/// Duplicates are removed, first appearance wins.
pub fn expand_target_arg(arg: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for raw in arg.split(',') {
        let tok = raw.trim();
        if tok.is_empty() {
            continue;
        }
        if tok.contains('/') {
            if let Ok(net) = tok.parse::<IpNet>() {
                for ip in net.hosts() {
                    let s = ip.to_string();
                    if seen.insert(s.clone()) {
                        out.push(s);
                    }
                }
                continue;
            }
        }
        for t in expand_last_octet_range(tok) {
            if seen.insert(t.clone()) {
                out.push(t);
            }
        }
    }
    out
}

/// Load the target list from a spec string, or from a file if the spec names
/// one (one spec per line, `#` comments and blank lines ignored).
pub fn load_targets(spec: &str) -> Result<Vec<String>> {
    let path = Path::new(spec);
    if !path.is_file() {
        return Ok(expand_target_arg(spec));
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read targets file: {}", path.display()))?;
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        for t in expand_target_arg(line) {
            if seen.insert(t.clone()) {
                out.push(t);
            }
        }
    }
    if out.is_empty() {
        bail!("targets file {} contains no targets", path.display());
    }
    Ok(out)
}

/// Resolve a target to its addresses: IP literals short-circuit, hostnames go
/// through the system resolver. IPv4 addresses are preferred ahead of IPv6.
/// An empty result means the target is unresolvable and should be skipped.
pub async fn resolve(target: &str) -> Vec<IpAddr> {
    if let Ok(ip) = target.parse::<IpAddr>() {
        return vec![ip];
    }
    let addrs = match tokio::net::lookup_host((target, 0u16)).await {
        Ok(iter) => iter,
        Err(_) => return Vec::new(),
    };
    let mut v4 = Vec::new();
    let mut v6 = Vec::new();
    let mut seen = HashSet::new();
    for addr in addrs {
        let ip = addr.ip();
        if !seen.insert(ip) {
            continue;
        }
        match ip {
            IpAddr::V4(_) => v4.push(ip),
            IpAddr::V6(_) => v6.push(ip),
        }
    }
    v4.extend(v6);
    v4
}

/// Expand `a.b.c.x-y` into the inclusive run of last-octet addresses.
/// Tokens that do not match the shape come back unchanged as a single entry.
fn expand_last_octet_range(token: &str) -> Vec<String> {
    let s = token.trim();
    if s.is_empty() {
        return Vec::new();
    }
    if s.matches('.').count() != 3 || !s.contains('-') {
        return vec![s.to_string()];
    }
    let Some((prefix, last)) = s.rsplit_once('.') else {
        return vec![s.to_string()];
    };
    let Some((a_str, b_str)) = last.split_once('-') else {
        return vec![s.to_string()];
    };
    let (Ok(mut a), Ok(mut b)) = (a_str.parse::<u16>(), b_str.parse::<u16>()) else {
        return vec![s.to_string()];
    };
    if a > 255 || b > 255 {
        return vec![s.to_string()];
    }
    if format!("{prefix}.0").parse::<Ipv4Addr>().is_err() {
        return vec![s.to_string()];
    }
    if a > b {
        std::mem::swap(&mut a, &mut b);
    }
    (a..=b).map(|i| format!("{prefix}.{i}")).collect()
}
