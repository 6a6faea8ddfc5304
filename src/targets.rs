use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::types::Endpoint;

/// Parse a target list into endpoints, one `host[:port]` per line.
///
/// Supported formats per line:
/// - bare host: `192.168.1.10`
/// - host with port: `192.168.1.10:8080`
/// - an optional `http://` prefix and trailing `/` are stripped
/// - comments: everything after `#` is ignored
/// - whitespace and blank lines are ignored
///
/// Duplicates (by base URL) are dropped, keeping the first occurrence.
pub fn parse_targets_str(s: &str) -> Result<Vec<Endpoint>> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();

    for (idx, raw_line) in s.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.split('#').next().map(str::trim).unwrap_or("");
        if line.is_empty() {
            continue;
        }

        let ep = parse_endpoint(line).with_context(|| format!("line {line_no}: invalid target: {line}"))?;
        if seen.insert(ep.base_url()) {
            out.push(ep);
        }
    }

    Ok(out)
}

/// Load a target list from a file path. Errors if the file cannot be read or parsed.
pub fn load_targets_from_path(path: impl AsRef<Path>) -> Result<Vec<Endpoint>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read target list: {}", path.as_ref().display()))?;
    parse_targets_str(&content)
}

/// Set union of several endpoint sources, deduplicated by base URL in first-seen order.
pub fn merge_sources<I>(sources: I) -> Vec<Endpoint>
where
    I: IntoIterator<Item = Vec<Endpoint>>,
{
    let mut seen = HashSet::new();
    sources
        .into_iter()
        .flatten()
        .filter(|ep| seen.insert(ep.base_url()))
        .collect()
}

/// Parse a single `host[:port]` string.
pub fn parse_endpoint(s: &str) -> Result<Endpoint> {
    let s = s.trim();
    let s = s.strip_prefix("http://").unwrap_or(s);
    let s = s.trim_end_matches('/');
    if s.is_empty() {
        bail!("empty host");
    }
    if s.contains('/') || s.contains(char::is_whitespace) {
        bail!("unexpected characters in host: {s}");
    }

    match s.split_once(':') {
        Some((host, port)) => {
            if host.is_empty() {
                bail!("missing host before port");
            }
            let port = parse_port_str(port)?;
            Ok(Endpoint::new(host, Some(port)))
        }
        None => Ok(Endpoint::new(s, None)),
    }
}

fn parse_port_str(s: &str) -> Result<u16> {
    let val: u32 = s.parse::<u32>().map_err(|e| anyhow::anyhow!("invalid port {s:?}: {e}"))?;
    if val == 0 || val > 65535 {
        bail!("port out of range: {val}");
    }
    Ok(val as u16)
}
