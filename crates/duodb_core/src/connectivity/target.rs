//! Host/port extraction from PostgreSQL connection strings.
//!
//! Only the default reachability probe reads this; the connection string
//! itself is passed to the remote client untouched.

use once_cell::sync::Lazy;
use regex::Regex;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5432;

static KEY_VALUE_HOST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\s)host\s*=\s*'?([^\s',]+)").expect("static host pattern")
});
static KEY_VALUE_PORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)port\s*=\s*'?(\d+)").expect("static port pattern"));
static URI_AUTHORITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^postgres(?:ql)?://(?:[^@/]*@)?(\[[^\]]+\]|[^:/?,]*)(?::(\d+))?")
        .expect("static uri pattern")
});

/// Network endpoint named by a connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    pub host: String,
    pub port: u16,
}

impl ConnectionTarget {
    /// Reads `host`/`port` from key=value or URI form, with libpq defaults.
    ///
    /// Unix-socket hosts (absolute paths) are kept as-is; the TCP probe
    /// treats them as unreachable.
    pub fn parse(connection_string: &str) -> Self {
        let trimmed = connection_string.trim();
        if let Some(captures) = URI_AUTHORITY.captures(trimmed) {
            let host = captures
                .get(1)
                .map(|m| m.as_str().trim_matches(|c| c == '[' || c == ']'))
                .filter(|host| !host.is_empty())
                .unwrap_or(DEFAULT_HOST);
            let port = captures
                .get(2)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(DEFAULT_PORT);
            return Self {
                host: host.to_string(),
                port,
            };
        }

        let host = KEY_VALUE_HOST
            .captures(trimmed)
            .and_then(|c| c.get(1))
            .map_or(DEFAULT_HOST, |m| m.as_str());
        let port = KEY_VALUE_PORT
            .captures(trimmed)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(DEFAULT_PORT);
        Self {
            host: host.to_string(),
            port,
        }
    }
}
