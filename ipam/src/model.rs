//! Domain types shared by the store, engine and REST layer.

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::Error;

/// MAC recorded when an address is released without a known owner.
pub const UNKNOWN_MAC: &str = "N/A";

/// Device label used when none was supplied or recovered.
pub const UNKNOWN_DEVICE: &str = "unknown";

/// Current time as stored in the database.
///
/// Fixed precision keeps lexicographic order equal to chronological order.
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Address status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressStatus {
    Free,
    Reserved,
    Assigned,
}

impl AddressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressStatus::Free => "free",
            AddressStatus::Reserved => "reserved",
            AddressStatus::Assigned => "assigned",
        }
    }
}

impl fmt::Display for AddressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AddressStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(AddressStatus::Free),
            "reserved" => Ok(AddressStatus::Reserved),
            "assigned" => Ok(AddressStatus::Assigned),
            _ => Err(()),
        }
    }
}

/// Transition recorded in the history log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryAction {
    Reserved,
    Assigned,
    Released,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Reserved => "reserved",
            HistoryAction::Assigned => "assigned",
            HistoryAction::Released => "released",
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reserved" => Ok(HistoryAction::Reserved),
            "assigned" => Ok(HistoryAction::Assigned),
            "released" => Ok(HistoryAction::Released),
            _ => Err(()),
        }
    }
}

/// Hardware address, normalised to lowercase colon form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr([u8; 6]);

impl FromStr for MacAddr {
    type Err = Error;

    /// Accepts `aa:bb:cc:dd:ee:ff` and `aa-bb-cc-dd-ee-ff`, any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidMac(s.to_string());
        let trimmed = s.trim();
        let sep = if trimmed.contains('-') { '-' } else { ':' };
        let parts: Vec<&str> = trimmed.split(sep).collect();
        if parts.len() != 6 {
            return Err(invalid());
        }

        let mut mac = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            mac[i] = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        Ok(MacAddr(mac))
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Parse a dotted-quad address supplied by a caller.
pub fn parse_ip(s: &str) -> Result<Ipv4Addr, Error> {
    s.trim()
        .parse()
        .map_err(|_| Error::InvalidAddress(s.to_string()))
}

/// Subnet row
#[derive(Debug, Clone)]
pub struct SubnetEntry {
    pub id: String,
    pub cidr: String,
    pub description: String,
    pub start_ip: Option<String>,
    pub end_ip: Option<String>,
    pub created_at: String,
}

/// Address row
#[derive(Debug, Clone)]
pub struct AddressEntry {
    pub ip: Ipv4Addr,
    pub subnet_id: String,
    pub status: AddressStatus,
    pub device_label: Option<String>,
    pub last_assigned: Option<String>,
}

/// Reservation row
#[derive(Debug, Clone)]
pub struct ReservationEntry {
    pub mac: String,
    pub ip: Ipv4Addr,
    pub device_label: String,
    pub created_at: String,
}

/// History log row
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub id: i64,
    pub ip: Ipv4Addr,
    pub mac: String,
    pub device_label: String,
    pub action: HistoryAction,
    pub timestamp: String,
}

/// Address joined with its subnet, reservation and recovered owner.
#[derive(Debug, Clone)]
pub struct AddressView {
    pub ip: Ipv4Addr,
    pub subnet_id: String,
    pub cidr: String,
    pub description: String,
    pub status: AddressStatus,
    pub mac: String,
    pub device_label: String,
    pub last_assigned: Option<String>,
    pub reserved: bool,
}

/// Subnet with the extent and usage of its materialised addresses.
#[derive(Debug, Clone)]
pub struct SubnetSummary {
    pub id: String,
    pub cidr: String,
    pub description: String,
    pub start_ip: Option<Ipv4Addr>,
    pub end_ip: Option<Ipv4Addr>,
    pub stats: PoolStats,
}

/// Address counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub total: u64,
    pub free: u64,
    pub reserved: u64,
    pub assigned: u64,
}

impl PoolStats {
    pub fn add(&mut self, status: AddressStatus, count: u64) {
        self.total += count;
        match status {
            AddressStatus::Free => self.free += count,
            AddressStatus::Reserved => self.reserved += count,
            AddressStatus::Assigned => self.assigned += count,
        }
    }
}

/// Filter for address listings
#[derive(Debug, Clone, Default)]
pub struct AddressFilter {
    pub status: Option<AddressStatus>,
    pub cidr: Option<String>,
}

impl AddressFilter {
    pub fn matches(&self, view: &AddressView) -> bool {
        self.status.is_none_or(|s| s == view.status)
            && self.cidr.as_deref().is_none_or(|c| c == view.cidr)
    }
}
