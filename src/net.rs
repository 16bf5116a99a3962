//! Local network interface enumeration.
//!
//! Discovery probes every usable interface, and finding "our" server means
//! matching the addresses players report against our own.

use std::net::{IpAddr, Ipv4Addr};

use local_ip_address::list_afinet_netifas;

/// Returns every local, non-loopback IPv4 address.
///
/// Enumeration failure is logged and yields an empty list; discovery then
/// reports that no usable interfaces exist.
#[must_use]
pub fn local_ipv4_addrs() -> Vec<Ipv4Addr> {
    list_afinet_netifas()
        .unwrap_or_else(|e| {
            log::warn!("failed to list network interfaces: {}", e);
            Vec::new()
        })
        .into_iter()
        .filter_map(|(name, addr)| match addr {
            IpAddr::V4(ipv4) if !ipv4.is_loopback() => {
                log::debug!("using interface {} ({})", name, ipv4);
                Some(ipv4)
            }
            _ => None,
        })
        .collect()
}

/// The same addresses as display strings.
///
/// Players report their address as text (`ip:port` fields), so matching
/// happens on strings.
#[must_use]
pub fn local_ip_strings() -> Vec<String> {
    local_ipv4_addrs().into_iter().map(|ip| ip.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_loopback_addresses_are_returned() {
        for addr in local_ipv4_addrs() {
            assert!(!addr.is_loopback());
        }
    }

    #[test]
    fn strings_match_addresses() {
        let addrs = local_ipv4_addrs();
        let strings = local_ip_strings();
        assert_eq!(addrs.len(), strings.len());
        for (addr, s) in addrs.iter().zip(&strings) {
            assert_eq!(&addr.to_string(), s);
        }
    }
}
