//! Target resolution into an ordered list of candidate addresses.

use crate::error::Error;
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use tracing::debug;

/// Address family preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    /// Whatever the resolver returns, in its order.
    #[default]
    Auto,
    V4,
    V6,
}

impl Family {
    fn admits(self, addr: &SocketAddr) -> bool {
        match self {
            Family::Auto => true,
            Family::V4 => addr.is_ipv4(),
            Family::V6 => addr.is_ipv6(),
        }
    }
}

/// What to probe. Immutable for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub family: Family,
}

impl Target {
    /// Brackets around an IPv6 literal are stripped.
    pub fn new(host: impl Into<String>, port: u16, family: Family) -> Self {
        let host: String = host.into();
        Self {
            host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
            port,
            family,
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Resolve `target` into stream-socket candidates.
///
/// The system resolver's order is kept; the family preference only filters.
/// An empty result is an error, so callers always get at least one
/// candidate.
pub fn resolve(target: &Target) -> Result<Vec<SocketAddr>, Error> {
    let host = target
        .host
        .trim_start_matches('[')
        .trim_end_matches(']');

    let resolved: Vec<SocketAddr> = match host.parse::<IpAddr>() {
        Ok(ip) => vec![SocketAddr::new(ip, target.port)],
        Err(_) => (host, target.port)
            .to_socket_addrs()
            .map_err(|e| Error::Resolution {
                target: target.to_string(),
                reason: e.to_string(),
            })?
            .collect(),
    };

    let candidates: Vec<SocketAddr> = resolved
        .into_iter()
        .filter(|addr| target.family.admits(addr))
        .collect();

    if candidates.is_empty() {
        let reason = match target.family {
            Family::Auto => "no addresses found".to_string(),
            Family::V4 => "no IPv4 addresses found".to_string(),
            Family::V6 => "no IPv6 addresses found".to_string(),
        };
        return Err(Error::Resolution {
            target: target.to_string(),
            reason,
        });
    }

    debug!(target = %target, candidates = candidates.len(), "Resolved target");
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_ipv4() {
        let target = Target::new("127.0.0.1", 50414, Family::Auto);
        let candidates = resolve(&target).unwrap();
        assert_eq!(candidates, vec!["127.0.0.1:50414".parse().unwrap()]);
    }

    #[test]
    fn test_literal_ipv6_bracketed() {
        let target = Target::new("[::1]", 80, Family::Auto);
        let candidates = resolve(&target).unwrap();
        assert_eq!(candidates, vec!["[::1]:80".parse().unwrap()]);
    }

    #[test]
    fn test_family_filter_rejects_mismatch() {
        let target = Target::new("127.0.0.1", 80, Family::V6);
        let err = resolve(&target).unwrap_err();
        assert!(matches!(err, Error::Resolution { .. }));
        assert!(err.to_string().contains("no IPv6 addresses"));
    }

    #[test]
    fn test_localhost_v4_only() {
        let target = Target::new("localhost", 80, Family::V4);
        let candidates = resolve(&target).unwrap();
        assert!(candidates.iter().all(|addr| addr.is_ipv4()));
    }

    #[test]
    fn test_unresolvable_host() {
        let target = Target::new("does-not-exist.invalid", 80, Family::Auto);
        let err = resolve(&target).unwrap_err();
        assert!(matches!(err, Error::Resolution { .. }));
    }

    #[test]
    fn test_target_display() {
        assert_eq!(
            Target::new("example.com", 1, Family::Auto).to_string(),
            "example.com:1"
        );
        assert_eq!(Target::new("::1", 2, Family::V6).to_string(), "[::1]:2");
    }
}
