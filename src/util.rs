// Host/port helpers shared by the target parser and the probers.

use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use crate::error::ProbeError;

/// True when `s` is a non-empty run of ASCII digits.
pub fn is_port_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Convert a digit token into a usable port. `0` and values above 65535 yield `None`.
pub fn port_from_digits(s: &str) -> Option<u16> {
    s.parse::<u16>().ok().filter(|p| *p != 0)
}

/// `[2001:db8::1]` -> `2001:db8::1`; anything else is returned unchanged.
pub fn strip_brackets(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}

/// Split `host:port` on the last colon when the suffix is all digits.
///
/// Bare IPv6 literals are never split, so `::1` stays a host. Bracketed
/// literals (`[::1]:443`) are split and unbracketed.
pub fn split_host_port(s: &str) -> Option<(&str, &str)> {
    if s.parse::<Ipv6Addr>().is_ok() {
        return None;
    }
    let idx = s.rfind(':')?;
    let (host, port) = (&s[..idx], &s[idx + 1..]);
    if !is_port_token(port) {
        return None;
    }
    let host = strip_brackets(host);
    if host.is_empty() {
        return None;
    }
    Some((host, port))
}

pub async fn resolve_host_to_ip(host: &str) -> Result<IpAddr, ProbeError> {
    // First try to parse as IP address
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    // If parsing fails, resolve via DNS
    let addr = format!("{}:0", host);
    let mut addrs = tokio::net::lookup_host(&addr)
        .await
        .map_err(|_| ProbeError::Resolve(host.to_string()))?;
    addrs
        .next()
        .map(|a| a.ip())
        .ok_or_else(|| ProbeError::Resolve(host.to_string()))
}

pub async fn resolve_socket_addr(host: &str, port: u16) -> Result<SocketAddr, ProbeError> {
    let ip = resolve_host_to_ip(host).await?;
    Ok(SocketAddr::new(ip, port))
}
