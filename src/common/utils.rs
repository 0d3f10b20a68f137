//! Utility functions for minifs

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Percent-encoding set for file names (includes /, %, and control chars)
const NAME_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b'/')
    .add(b'\\')
    .add(b'%')
    .add(b' ')
    .add(b'?')
    .add(b'#')
    .add(b'&')
    .add(b':');

/// Encode a file name for filesystem usage
pub fn encode_name(name: &str) -> String {
    let encoded = utf8_percent_encode(name, NAME_ENCODE_SET).to_string();
    // "." and ".." survive percent-encoding untouched
    match encoded.as_str() {
        "." => "%2E".to_string(),
        ".." => "%2E%2E".to_string(),
        _ => encoded,
    }
}

/// Decode a percent-encoded file name
pub fn decode_name(encoded: &str) -> crate::Result<String> {
    percent_decode_str(encoded)
        .decode_utf8()
        .map(|s| s.to_string())
        .map_err(|e| crate::Error::Other(format!("Failed to decode name: {}", e)))
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_idx])
}

/// Get current Unix timestamp (seconds)
pub fn timestamp_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Collapse the spellings of one host to a single IP.
///
/// Every loopback address becomes `127.0.0.1` and IPv4-mapped IPv6 addresses
/// become plain IPv4. Note that this also folds distinct loopback addresses
/// such as `127.0.0.2` onto `127.0.0.1`.
pub fn canonical_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(v4) if v4.is_loopback() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V4(v4) => IpAddr::V4(v4),
        IpAddr::V6(v6) if v6.is_loopback() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => canonical_ip(IpAddr::V4(v4)),
            None => IpAddr::V6(v6),
        },
    }
}

/// Build the registry key for a node reachable at `ip:port`
pub fn node_address(ip: IpAddr, port: u16) -> String {
    SocketAddr::new(canonical_ip(ip), port).to_string()
}

/// Normalize a `host:port` string to the registry's canonical form.
///
/// Strings that are neither a socket address nor `localhost:port` are
/// returned trimmed but otherwise untouched (DNS names are not resolved).
pub fn normalize_node_address(addr: &str) -> String {
    let addr = addr.trim();
    if let Ok(sock) = addr.parse::<SocketAddr>() {
        return node_address(sock.ip(), sock.port());
    }
    if let Some((host, port)) = addr.rsplit_once(':') {
        if host.eq_ignore_ascii_case("localhost") {
            if let Ok(port) = port.parse::<u16>() {
                return node_address(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
            }
        }
    }
    addr.to_string()
}

/// Validate a file name (must be non-empty, reasonable length)
pub fn validate_name(name: &str) -> crate::Result<()> {
    if name.is_empty() {
        return Err(crate::Error::BadRequest("file name cannot be empty".into()));
    }

    if name.len() > 1024 {
        return Err(crate::Error::BadRequest(
            "file name too long (max 1024 bytes)".into(),
        ));
    }

    if name.chars().any(|c| c.is_control()) {
        return Err(crate::Error::BadRequest(
            "file name contains invalid characters".into(),
        ));
    }

    Ok(())
}
