//! Refuses outbound tool calls that would reach a private, loopback,
//! link-local, CGNAT, or otherwise internal address unless the operator has
//! explicitly allow-listed it.
//!
//! Grounded on the SSRF preflight used elsewhere in this workspace's
//! toolchain (hostname/CIDR allow-list plus a bounded-time DNS resolution),
//! extended here with the allow-list entry types and the 2-second resolve
//! timeout the gateway's egress policy calls for.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;

const DNS_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EgressError {
    #[error("internal network access is disabled for tool endpoints: {0}")]
    Denied(String),
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),
    #[error("dns resolution failed for host {0}")]
    ResolutionFailed(String),
}

/// A single allow-list entry as configured by the operator.
#[derive(Debug, Clone)]
pub enum AllowEntry {
    Hostname(String),
    Ip(IpAddr),
    Cidr(IpAddr, u8),
}

impl AllowEntry {
    pub fn parse(raw: &str) -> Option<AllowEntry> {
        let raw = raw.trim();
        if let Some((base, bits)) = raw.split_once('/') {
            let ip: IpAddr = base.parse().ok()?;
            let bits: u8 = bits.parse().ok()?;
            return Some(AllowEntry::Cidr(ip, bits));
        }
        if let Ok(ip) = raw.parse::<IpAddr>() {
            return Some(AllowEntry::Ip(ip));
        }
        Some(AllowEntry::Hostname(
            raw.trim_end_matches('.').to_ascii_lowercase(),
        ))
    }

    fn matches_host(&self, host: &str) -> bool {
        matches!(self, AllowEntry::Hostname(h) if h == &host.trim_end_matches('.').to_ascii_lowercase())
    }

    fn matches_ip(&self, ip: IpAddr) -> bool {
        match self {
            AllowEntry::Ip(allowed) => *allowed == ip,
            AllowEntry::Cidr(base, bits) => cidr_contains(*base, *bits, ip),
            AllowEntry::Hostname(_) => false,
        }
    }
}

fn cidr_contains(base: IpAddr, bits: u8, ip: IpAddr) -> bool {
    match (base, ip) {
        (IpAddr::V4(base), IpAddr::V4(ip)) => {
            let bits = bits.min(32);
            let mask = if bits == 0 { 0 } else { !0u32 << (32 - bits) };
            (u32::from(base) & mask) == (u32::from(ip) & mask)
        }
        (IpAddr::V6(base), IpAddr::V6(ip)) => {
            let bits = bits.min(128);
            let mask = if bits == 0 { 0 } else { !0u128 << (128 - bits) };
            (u128::from(base) & mask) == (u128::from(ip) & mask)
        }
        _ => false,
    }
}

/// The compiled allow-list a gateway instance is configured with.
#[derive(Debug, Clone, Default)]
pub struct EgressAllowList {
    entries: Vec<AllowEntry>,
}

impl EgressAllowList {
    pub fn new(raw_entries: &[String]) -> Self {
        Self {
            entries: raw_entries.iter().filter_map(|e| AllowEntry::parse(e)).collect(),
        }
    }

    fn allows_host(&self, host: &str) -> bool {
        self.entries.iter().any(|e| e.matches_host(host))
    }

    fn allows_ip(&self, ip: IpAddr) -> bool {
        self.entries.iter().any(|e| e.matches_ip(ip))
    }
}

/// True for loopback/private/link-local/multicast/unspecified addresses and
/// the CGNAT range (100.64.0.0/10), which routers treat as non-routable from
/// the public internet but which still resolve inside the operator's own
/// network.
pub fn is_internal_address(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_multicast()
                || v4.is_unspecified()
                || is_cgnat(v4)
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_multicast()
                || is_unique_local(v6)
                || is_link_local_v6(v6)
                || v6.to_ipv4_mapped().is_some_and(|mapped| is_internal_address(IpAddr::V4(mapped)))
        }
    }
}

fn is_cgnat(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    octets[0] == 100 && (octets[1] & 0b1100_0000) == 0b0100_0000
}

fn is_unique_local(ip: Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xfe00) == 0xfc00
}

fn is_link_local_v6(ip: Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xffc0) == 0xfe80
}

/// Parses the host and port out of an endpoint URL and runs the decision
/// procedure: allow-listed hostname, allow-listed literal IP/CIDR, or a
/// DNS-resolved public address.
pub async fn validate_endpoint(endpoint: &str, allow_list: &EgressAllowList) -> Result<(), EgressError> {
    let url = url::Url::parse(endpoint).map_err(|e| EgressError::InvalidUrl(e.to_string()))?;
    let host = url
        .host_str()
        .ok_or_else(|| EgressError::InvalidUrl("missing host".to_string()))?
        .to_string();

    if allow_list.allows_host(&host) {
        return Ok(());
    }

    if let Ok(literal_ip) = host.parse::<IpAddr>() {
        if !is_internal_address(literal_ip) {
            return Ok(());
        }
        return if allow_list.allows_ip(literal_ip) {
            Ok(())
        } else {
            Err(EgressError::Denied(format!(
                "{host} resolves to an internal address and is not allow-listed"
            )))
        };
    }

    let port = url.port_or_known_default().unwrap_or(443);
    let lookup = format!("{host}:{port}");
    let resolved = tokio::time::timeout(DNS_TIMEOUT, tokio::net::lookup_host(lookup))
        .await
        .map_err(|_| EgressError::ResolutionFailed(host.clone()))?
        .map_err(|_| EgressError::ResolutionFailed(host.clone()))?
        .collect::<Vec<SocketAddr>>();

    if resolved.is_empty() {
        return Err(EgressError::ResolutionFailed(host));
    }

    for addr in &resolved {
        if is_internal_address(addr.ip()) && !allow_list.allows_ip(addr.ip()) {
            return Err(EgressError::Denied(format!(
                "{host} resolves to internal address {} and is not allow-listed",
                addr.ip()
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_loopback_private_and_cgnat() {
        assert!(is_internal_address("127.0.0.1".parse().unwrap()));
        assert!(is_internal_address("10.1.2.3".parse().unwrap()));
        assert!(is_internal_address("169.254.169.254".parse().unwrap()));
        assert!(is_internal_address("100.64.0.5".parse().unwrap()));
        assert!(!is_internal_address("8.8.8.8".parse().unwrap()));
    }

    #[test]
    fn cidr_entry_matches_contained_address() {
        let list = EgressAllowList::new(&["127.0.0.0/8".to_string()]);
        assert!(list.allows_ip("127.0.0.1".parse().unwrap()));
        assert!(!list.allows_ip("10.0.0.1".parse().unwrap()));
    }

    #[tokio::test]
    async fn literal_loopback_denied_without_allow_list() {
        let list = EgressAllowList::default();
        let err = validate_endpoint("http://127.0.0.1:9/echo", &list).await.unwrap_err();
        assert!(matches!(err, EgressError::Denied(_)));
    }

    #[tokio::test]
    async fn literal_loopback_allowed_with_cidr_override() {
        let list = EgressAllowList::new(&["127.0.0.0/8".to_string()]);
        validate_endpoint("http://127.0.0.1:9/echo", &list).await.unwrap();
    }

    #[tokio::test]
    async fn allow_listed_hostname_bypasses_resolution() {
        let list = EgressAllowList::new(&["internal.example.".to_string()]);
        // Lookup would fail (fake TLD); the hostname match should short-circuit before DNS.
        validate_endpoint("http://internal.example/echo", &list).await.unwrap();
    }
}
