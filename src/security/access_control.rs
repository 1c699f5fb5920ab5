//! Address allow list.
//!
//! # Responsibilities
//! - Parse allow entries (single IP, network/netmask, network/CIDR)
//! - Always admit the IPv4 loopback subnet and IPv6 localhost
//! - Decide whether a peer address may be dispatched at all
//!
//! # Design Decisions
//! - Subnets are stored as (network, mask) integers; matching is one AND
//! - A netmask must be contiguous; anything else is rejected at startup
//! - IPv4-mapped IPv6 peers are matched as IPv4

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use thiserror::Error;

/// Error raised for an allow entry that is not a valid subnet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllowListError {
    #[error(
        "Invalid -rpcallowip subnet specification: {0}. Valid are a single IP (e.g. 1.2.3.4), \
         a network/netmask (e.g. 1.2.3.4/255.255.255.0) or a network/CIDR (e.g. 1.2.3.4/24)."
    )]
    InvalidSubnet(String),
}

/// An IPv4 or IPv6 network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subnet {
    V4 { network: u32, mask: u32 },
    V6 { network: u128, mask: u128 },
}

impl Subnet {
    /// The subnet containing exactly `addr`.
    pub fn single(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(a) => Self::v4(a, u32::MAX),
            IpAddr::V6(a) => Self::v6(a, u128::MAX),
        }
    }

    /// `addr/prefix_len`. Returns `None` if the length exceeds the address width.
    pub fn with_prefix(addr: IpAddr, prefix_len: u8) -> Option<Self> {
        match addr {
            IpAddr::V4(a) if prefix_len <= 32 => Some(Self::v4(a, prefix_mask_v4(prefix_len))),
            IpAddr::V6(a) if prefix_len <= 128 => Some(Self::v6(a, prefix_mask_v6(prefix_len))),
            _ => None,
        }
    }

    /// `addr/netmask`. The mask must share the address family and be contiguous.
    pub fn with_netmask(addr: IpAddr, netmask: IpAddr) -> Option<Self> {
        match (addr, netmask) {
            (IpAddr::V4(a), IpAddr::V4(m)) => {
                let mask = u32::from(m);
                (mask.leading_ones() + mask.trailing_zeros() == 32).then(|| Self::v4(a, mask))
            }
            (IpAddr::V6(a), IpAddr::V6(m)) => {
                let mask = u128::from(m);
                (mask.leading_ones() + mask.trailing_zeros() == 128).then(|| Self::v6(a, mask))
            }
            _ => None,
        }
    }

    fn v4(addr: Ipv4Addr, mask: u32) -> Self {
        Subnet::V4 {
            network: u32::from(addr) & mask,
            mask,
        }
    }

    fn v6(addr: Ipv6Addr, mask: u128) -> Self {
        Subnet::V6 {
            network: u128::from(addr) & mask,
            mask,
        }
    }

    /// Whether `addr` lies inside this subnet.
    pub fn contains(&self, addr: IpAddr) -> bool {
        match (self, addr.to_canonical()) {
            (Subnet::V4 { network, mask }, IpAddr::V4(a)) => u32::from(a) & mask == *network,
            (Subnet::V6 { network, mask }, IpAddr::V6(a)) => u128::from(a) & mask == *network,
            _ => false,
        }
    }
}

impl std::str::FromStr for Subnet {
    type Err = AllowListError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AllowListError::InvalidSubnet(s.to_string());
        let Some((network, suffix)) = s.split_once('/') else {
            return s.parse::<IpAddr>().map(Subnet::single).map_err(|_| invalid());
        };

        let network: IpAddr = network.parse().map_err(|_| invalid())?;
        if let Ok(prefix_len) = suffix.parse::<u8>() {
            return Subnet::with_prefix(network, prefix_len).ok_or_else(invalid);
        }
        let netmask: IpAddr = suffix.parse().map_err(|_| invalid())?;
        Subnet::with_netmask(network, netmask).ok_or_else(invalid)
    }
}

impl std::fmt::Display for Subnet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Subnet::V4 { network, mask } => {
                write!(f, "{}/{}", Ipv4Addr::from(*network), mask.leading_ones())
            }
            Subnet::V6 { network, mask } => {
                write!(f, "{}/{}", Ipv6Addr::from(*network), mask.leading_ones())
            }
        }
    }
}

fn prefix_mask_v4(len: u8) -> u32 {
    u32::MAX.checked_shl(32 - u32::from(len)).unwrap_or(0)
}

fn prefix_mask_v6(len: u8) -> u128 {
    u128::MAX.checked_shl(128 - u32::from(len)).unwrap_or(0)
}

/// Subnets whose peers may use the server.
#[derive(Debug, Clone)]
pub struct AllowList {
    subnets: Vec<Subnet>,
}

impl AllowList {
    /// Loopback defaults plus the parsed `entries`.
    pub fn from_entries<S: AsRef<str>>(entries: &[S]) -> Result<Self, AllowListError> {
        let mut subnets = vec![
            Subnet::v4(Ipv4Addr::LOCALHOST, prefix_mask_v4(8)),
            Subnet::single(IpAddr::V6(Ipv6Addr::LOCALHOST)),
        ];
        for entry in entries {
            subnets.push(entry.as_ref().trim().parse()?);
        }

        let allowed: Vec<String> = subnets.iter().map(ToString::to_string).collect();
        tracing::debug!("Allowing HTTP connections from: {}", allowed.join(" "));
        Ok(Self { subnets })
    }

    /// Whether `addr` is inside any allowed subnet.
    pub fn is_allowed(&self, addr: IpAddr) -> bool {
        if addr.is_unspecified() {
            return false;
        }
        self.subnets.iter().any(|subnet| subnet.contains(addr))
    }

    pub fn subnets(&self) -> &[Subnet] {
        &self.subnets
    }
}

impl Default for AllowList {
    fn default() -> Self {
        Self::from_entries::<&str>(&[]).unwrap_or(Self { subnets: Vec::new() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn defaults_admit_only_loopback() {
        let list = AllowList::default();
        assert!(list.is_allowed(ip("127.0.0.1")));
        assert!(list.is_allowed(ip("127.255.0.9")));
        assert!(list.is_allowed(ip("::1")));
        assert!(list.is_allowed(ip("::ffff:127.0.0.1")));
        assert!(!list.is_allowed(ip("10.0.0.5")));
        assert!(!list.is_allowed(ip("::2")));
        assert!(!list.is_allowed(ip("0.0.0.0")));
    }

    #[test]
    fn parses_all_entry_forms() {
        let list = AllowList::from_entries(&[
            "192.168.1.7",
            "10.0.0.0/8",
            "172.16.0.0/255.240.0.0",
            "fd00::/8",
        ])
        .unwrap();

        assert!(list.is_allowed(ip("192.168.1.7")));
        assert!(!list.is_allowed(ip("192.168.1.8")));
        assert!(list.is_allowed(ip("10.0.0.5")));
        assert!(list.is_allowed(ip("172.31.255.1")));
        assert!(!list.is_allowed(ip("172.32.0.1")));
        assert!(list.is_allowed(ip("fd12::1")));
    }

    #[test]
    fn rejects_invalid_entries() {
        for bad in ["not-an-ip", "10.0.0.0/33", "10.0.0.0/255.0.255.0", "10.0.0.0/ffff::", "::1/129"] {
            assert_eq!(
                AllowList::from_entries(&[bad]).unwrap_err(),
                AllowListError::InvalidSubnet(bad.to_string()),
                "{bad}"
            );
        }
    }

    #[test]
    fn display_is_normalised() {
        assert_eq!("10.1.2.3/8".parse::<Subnet>().unwrap().to_string(), "10.0.0.0/8");
        assert_eq!("::1".parse::<Subnet>().unwrap().to_string(), "::1/128");
        assert_eq!("0.0.0.0/0".parse::<Subnet>().unwrap().to_string(), "0.0.0.0/0");
    }

    #[test]
    fn zero_prefix_matches_family_only() {
        let any_v4: Subnet = "0.0.0.0/0".parse().unwrap();
        assert!(any_v4.contains(ip("8.8.8.8")));
        assert!(!any_v4.contains(ip("2001:db8::1")));
    }
}
