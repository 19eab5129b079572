//! CIDR range expansion.
//!
//! Turns a prefix and optional administrator bounds into the host addresses
//! that get materialised as pool entries. Network and broadcast addresses are
//! never part of the result.

use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

use crate::error::{Error, Result};

/// Allocatable host addresses of a subnet, in ascending order.
///
/// Lazy so that large prefixes can be sized before anything is materialised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostRange {
    network: Ipv4Net,
    // Inclusive bounds; `first > last` means empty.
    first: i64,
    last: i64,
}

impl HostRange {
    /// Canonical network of the expanded prefix.
    pub fn network(&self) -> Ipv4Net {
        self.network
    }

    pub fn len(&self) -> u64 {
        if self.first > self.last {
            0
        } else {
            (self.last - self.first + 1) as u64
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn first(&self) -> Option<Ipv4Addr> {
        (!self.is_empty()).then(|| Ipv4Addr::from(self.first as u32))
    }

    pub fn last(&self) -> Option<Ipv4Addr> {
        (!self.is_empty()).then(|| Ipv4Addr::from(self.last as u32))
    }

    pub fn iter(&self) -> impl Iterator<Item = Ipv4Addr> + use<> {
        (self.first..=self.last).map(|n| Ipv4Addr::from(n as u32))
    }
}

/// Parse an IPv4 prefix. Host bits are allowed and truncated.
pub fn parse_cidr(cidr: &str) -> Result<Ipv4Net> {
    cidr.trim()
        .parse::<Ipv4Net>()
        .map(|net| net.trunc())
        .map_err(|_| Error::InvalidCidr(cidr.to_string()))
}

fn parse_bound(bound: Option<&str>) -> Result<Option<Ipv4Addr>> {
    match bound.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s
            .parse::<Ipv4Addr>()
            .map(Some)
            .map_err(|_| Error::InvalidBoundAddress(s.to_string())),
    }
}

/// Expand a prefix into its allocatable host range.
///
/// Blank bounds count as absent. Bounds must lie inside the prefix and be
/// ordered; the network and broadcast addresses are excluded even when a
/// bound names them.
pub fn expand(cidr: &str, start: Option<&str>, end: Option<&str>) -> Result<HostRange> {
    let network = parse_cidr(cidr)?;
    let start = parse_bound(start)?;
    let end = parse_bound(end)?;

    if let (Some(s), Some(e)) = (start, end)
        && u32::from(s) > u32::from(e)
    {
        return Err(Error::BoundOrderViolation(s.to_string(), e.to_string()));
    }

    for bound in [start, end].into_iter().flatten() {
        if !network.contains(&bound) {
            return Err(Error::BoundOutOfRange(
                bound.to_string(),
                network.to_string(),
            ));
        }
    }

    let net_addr = i64::from(u32::from(network.network()));
    let broadcast = i64::from(u32::from(network.broadcast()));

    let first = start
        .map(|s| i64::from(u32::from(s)))
        .unwrap_or(net_addr + 1)
        .max(net_addr + 1);
    let last = end
        .map(|e| i64::from(u32::from(e)))
        .unwrap_or(broadcast - 1)
        .min(broadcast - 1);

    Ok(HostRange {
        network,
        first,
        last,
    })
}

/// Check if two IPv4 subnets overlap.
pub fn subnets_overlap(a: &Ipv4Net, b: &Ipv4Net) -> bool {
    a.contains(&b.network()) || b.contains(&a.network())
}
