//! Network locality checks used to mark media sources as local or remote

use std::net::IpAddr;
use tracing::warn;

use crate::config::NetworkConfig;
use crate::errors::{AppError, AppResult};

/// Decides whether a host sits inside the local network
pub trait NetworkLocality: Send + Sync {
    fn is_in_local_network(&self, host: &str) -> bool;
}

/// An IPv4 or IPv6 subnet in CIDR notation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subnet {
    network: IpAddr,
    prefix_len: u8,
}

impl Subnet {
    pub fn parse(cidr: &str) -> AppResult<Self> {
        let (addr, prefix) = match cidr.trim().split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (cidr.trim(), None),
        };
        let network: IpAddr = addr
            .parse()
            .map_err(|_| AppError::configuration(format!("Invalid subnet address '{cidr}'")))?;
        let max_len = if network.is_ipv4() { 32 } else { 128 };
        let prefix_len = match prefix {
            Some(p) => p
                .parse::<u8>()
                .ok()
                .filter(|len| *len <= max_len)
                .ok_or_else(|| AppError::configuration(format!("Invalid subnet prefix '{cidr}'")))?,
            None => max_len,
        };
        Ok(Self {
            network,
            prefix_len,
        })
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = prefix_mask_u32(self.prefix_len);
                u32::from(net) & mask == u32::from(*ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = prefix_mask_u128(self.prefix_len);
                u128::from(net) & mask == u128::from(*ip) & mask
            }
            _ => false,
        }
    }
}

fn prefix_mask_u32(len: u8) -> u32 {
    if len == 0 { 0 } else { u32::MAX << (32 - u32::from(len)) }
}

fn prefix_mask_u128(len: u8) -> u128 {
    if len == 0 { 0 } else { u128::MAX << (128 - u32::from(len)) }
}

/// Locality based on loopback, private address ranges and configured subnets.
///
/// Hostnames are not resolved: anything other than `localhost` or a literal
/// address is considered remote.
#[derive(Debug, Clone)]
pub struct SubnetLocality {
    subnets: Vec<Subnet>,
    treat_private_as_local: bool,
}

impl SubnetLocality {
    pub fn new(subnets: Vec<Subnet>, treat_private_as_local: bool) -> Self {
        Self {
            subnets,
            treat_private_as_local,
        }
    }

    /// Build from configuration; invalid subnets are skipped with a warning
    pub fn from_config(config: &NetworkConfig) -> Self {
        let subnets = config
            .local_subnets
            .iter()
            .filter_map(|cidr| match Subnet::parse(cidr) {
                Ok(subnet) => Some(subnet),
                Err(e) => {
                    warn!("Ignoring local subnet: {}", e);
                    None
                }
            })
            .collect();
        Self::new(subnets, config.treat_private_as_local)
    }

    fn is_private(ip: &IpAddr) -> bool {
        match ip {
            IpAddr::V4(v4) => v4.is_private() || v4.is_link_local(),
            IpAddr::V6(v6) => {
                let first = v6.segments()[0];
                // fc00::/7 unique local, fe80::/10 link local
                (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
            }
        }
    }
}

impl Default for SubnetLocality {
    fn default() -> Self {
        Self::new(Vec::new(), true)
    }
}

impl NetworkLocality for SubnetLocality {
    fn is_in_local_network(&self, host: &str) -> bool {
        let host = host.trim().trim_start_matches('[').trim_end_matches(']');
        if host.eq_ignore_ascii_case("localhost") {
            return true;
        }

        let Ok(ip) = host.parse::<IpAddr>() else {
            return false;
        };

        if ip.is_loopback() {
            return true;
        }
        if self.treat_private_as_local && Self::is_private(&ip) {
            return true;
        }
        self.subnets.iter().any(|subnet| subnet.contains(&ip))
    }
}
