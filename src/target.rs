//! Target list parsing.
//!
//! One target per line. Blank lines and `#` comments are skipped. A line is
//! read as, in order of preference:
//!
//! 1. `host port` (exactly two whitespace-separated tokens, digit port)
//! 2. `host:port` (digit suffix after the last colon, `[v6]:port` allowed)
//! 3. the whole line as a host with no port
//!
//! Nothing is rejected; unrecognised shapes fall through to rule 3.

use std::fmt;
use std::path::Path;

use tokio::fs;
use tracing::{debug, warn};

use crate::error::RunError;
use crate::util::{is_port_token, port_from_digits, split_host_port, strip_brackets};

/// A host to probe, optionally with an explicit TCP port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: Option<u16>,
}

impl Target {
    pub fn new(host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    fn with_port_token(host: &str, port: &str) -> Self {
        let parsed = port_from_digits(port);
        if parsed.is_none() {
            warn!(host, port, "port outside 1-65535, treating target as portless");
        }
        Self::new(host, parsed)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{} {}", self.host, port),
            None => f.write_str(&self.host),
        }
    }
}

/// Parse one raw line. `None` for blank and comment lines.
pub fn parse_line(raw: &str) -> Option<Target> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() == 2 && is_port_token(parts[1]) {
        if let Some(host) = unbracketed_host(parts[0]) {
            return Some(Target::with_port_token(host, parts[1]));
        }
    }

    if let Some((host, port)) = split_host_port(line) {
        return Some(Target::with_port_token(host, port));
    }

    Some(Target::new(unbracketed_host(line).unwrap_or(line), None))
}

/// Host with IPv6 brackets removed, or `None` if nothing would be left.
fn unbracketed_host(raw: &str) -> Option<&str> {
    let host = strip_brackets(raw);
    (!host.is_empty()).then_some(host)
}

/// Parse every line, keeping input order.
pub fn parse_targets<I, S>(lines: I) -> Vec<Target>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .filter_map(|l| parse_line(l.as_ref()))
        .collect()
}

/// Read and parse a UTF-8 target file.
pub async fn load_targets(path: &Path) -> Result<Vec<Target>, RunError> {
    let content = fs::read_to_string(path).await?;
    let targets = parse_targets(content.lines());
    debug!(path = %path.display(), count = targets.len(), "loaded targets");
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_space_separated_port() {
        assert_eq!(parse_line("a.com 80"), Some(Target::new("a.com", Some(80))));
    }

    #[test]
    fn test_colon_port() {
        assert_eq!(parse_line("a.com:80"), Some(Target::new("a.com", Some(80))));
    }

    #[test]
    fn test_host_only() {
        assert_eq!(parse_line("a.com"), Some(Target::new("a.com", None)));
        assert_eq!(parse_line("  10.0.0.1\t"), Some(Target::new("10.0.0.1", None)));
    }

    #[test]
    fn test_skips_blank_and_comments() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("   "), None);
        assert_eq!(parse_line("# a.com 80"), None);
        assert_eq!(parse_line("   # indented"), None);
    }

    #[test]
    fn test_bare_ipv6_is_host_only() {
        assert_eq!(parse_line("::1"), Some(Target::new("::1", None)));
        assert_eq!(
            parse_line("2001:db8::80"),
            Some(Target::new("2001:db8::80", None))
        );
    }

    #[test]
    fn test_bracketed_ipv6() {
        assert_eq!(parse_line("[::1]:22"), Some(Target::new("::1", Some(22))));
        assert_eq!(parse_line("[::1] 22"), Some(Target::new("::1", Some(22))));
        assert_eq!(parse_line("[::1]"), Some(Target::new("::1", None)));
        assert_eq!(parse_line("fe80::1 8080"), Some(Target::new("fe80::1", Some(8080))));
    }

    #[test]
    fn test_degenerate_lines_fall_back_to_host() {
        assert_eq!(parse_line("a.com http"), Some(Target::new("a.com http", None)));
        assert_eq!(parse_line("a.com:http"), Some(Target::new("a.com:http", None)));
        assert_eq!(parse_line("a b c"), Some(Target::new("a b c", None)));
        assert_eq!(parse_line(":80"), Some(Target::new(":80", None)));
    }

    #[test]
    fn test_empty_brackets_keep_raw_host() {
        assert_eq!(parse_line("[]"), Some(Target::new("[]", None)));
        assert_eq!(parse_line("[] 80"), Some(Target::new("[] 80", None)));
        assert_eq!(parse_line("[]:80"), Some(Target::new("[]:80", None)));
        for target in parse_targets(["[]", "[] 80", "[]:80"]) {
            assert!(!target.host.is_empty());
        }
    }

    #[test]
    fn test_out_of_range_port_drops_port() {
        assert_eq!(parse_line("a.com 0"), Some(Target::new("a.com", None)));
        assert_eq!(parse_line("a.com:70000"), Some(Target::new("a.com", None)));
    }

    #[test]
    fn test_order_and_count_preserved() {
        let lines = ["10.0.0.1 22", "# comment", "", "example.com", "b.net:443"];
        let targets = parse_targets(lines);
        assert_eq!(
            targets,
            vec![
                Target::new("10.0.0.1", Some(22)),
                Target::new("example.com", None),
                Target::new("b.net", Some(443)),
            ]
        );
    }

    #[tokio::test]
    async fn test_load_targets_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("iplist.txt");
        std::fs::write(&path, "# list\r\n1.1.1.1\r\n8.8.8.8 53\r\n").unwrap();
        let targets = load_targets(&path).await.unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[1], Target::new("8.8.8.8", Some(53)));
    }

    #[tokio::test]
    async fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_targets(&dir.path().join("missing.txt")).await.unwrap_err();
        assert!(matches!(err, RunError::Io(_)));
    }
}
