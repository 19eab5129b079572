//! Allocation engine.
//!
//! Implements the address state machine (`free -> reserved -> assigned ->
//! free`, with `free -> assigned` and `reserved -> free` shortcuts) on top of
//! the store. Every mutating operation holds the writer lock and runs in a
//! single transaction, so either all of its writes land or none do.

use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{
    AddressFilter, AddressStatus, AddressView, HistoryAction, HistoryEntry, MacAddr, PoolStats,
    ReservationEntry, SubnetEntry, SubnetSummary, UNKNOWN_DEVICE, UNKNOWN_MAC, now_timestamp,
    parse_ip,
};
use crate::range;
use crate::store::{Store, addresses, history, reservations, subnets};

/// Input for subnet creation.
#[derive(Debug, Clone, Default)]
pub struct CreateSubnetRequest {
    pub cidr: String,
    pub description: String,
    pub start_ip: Option<String>,
    pub end_ip: Option<String>,
}

/// Result of an automatic assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub ip: Ipv4Addr,
    /// False when the MAC already held this address and nothing changed.
    pub changed: bool,
}

/// Result of subnet creation.
#[derive(Debug, Clone)]
pub struct CreatedSubnet {
    pub subnet: SubnetEntry,
    pub address_count: u64,
}

fn device_label(label: Option<&str>) -> String {
    match label.map(str::trim) {
        Some(l) if !l.is_empty() => l.to_string(),
        _ => UNKNOWN_DEVICE.to_string(),
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// The sole writer of addresses, reservations and history.
pub struct Engine {
    store: Arc<Store>,
    write_lock: Mutex<()>,
    max_subnet_hosts: u64,
}

impl Engine {
    pub fn new(store: Arc<Store>, max_subnet_hosts: u64) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
            max_subnet_hosts,
        }
    }

    // === Mutations ===

    /// Create a subnet and materialise its host range as free addresses.
    pub async fn create_subnet(&self, req: &CreateSubnetRequest) -> Result<CreatedSubnet> {
        let start_ip = non_blank(req.start_ip.as_deref());
        let end_ip = non_blank(req.end_ip.as_deref());
        let hosts = range::expand(&req.cidr, start_ip.as_deref(), end_ip.as_deref())?;
        let network = hosts.network();

        if hosts.len() > self.max_subnet_hosts {
            return Err(Error::SubnetTooLarge {
                cidr: network.to_string(),
                hosts: hosts.len(),
                limit: self.max_subnet_hosts,
            });
        }

        let _guard = self.write_lock.lock().await;
        let mut tx = self.store.begin().await?;

        for existing in subnets::list(&mut tx).await? {
            let existing_net = range::parse_cidr(&existing.cidr)?;
            if range::subnets_overlap(&network, &existing_net) {
                return Err(Error::SubnetOverlap(network.to_string(), existing.cidr));
            }
        }

        let subnet = subnets::new_entry(
            &network.to_string(),
            req.description.trim(),
            start_ip,
            end_ip,
        );
        subnets::insert(&mut tx, &subnet).await?;
        let address_count = addresses::insert_free(&mut tx, &subnet.id, hosts.iter()).await?;
        tx.commit().await?;

        info!(
            subnet_id = %subnet.id,
            cidr = %subnet.cidr,
            addresses = address_count,
            "Subnet created"
        );
        Ok(CreatedSubnet {
            subnet,
            address_count,
        })
    }

    /// Pin a free address to a MAC.
    pub async fn reserve(
        &self,
        mac: &str,
        ip: &str,
        label: Option<&str>,
    ) -> Result<ReservationEntry> {
        let mac = mac.parse::<MacAddr>()?.to_string();
        // Anything that is not a pool address, malformed or not, is unavailable.
        let ip: Ipv4Addr = ip
            .trim()
            .parse()
            .map_err(|_| Error::AddressUnavailable(ip.to_string()))?;
        let label = device_label(label);

        let _guard = self.write_lock.lock().await;
        let mut tx = self.store.begin().await?;

        match addresses::get(&mut tx, ip).await? {
            Some(addr) if addr.status == AddressStatus::Free => {}
            _ => return Err(Error::AddressUnavailable(ip.to_string())),
        }

        if let Some(existing) = reservations::get_by_mac(&mut tx, &mac).await? {
            return Err(Error::AlreadyReserved {
                mac,
                ip: existing.ip.to_string(),
            });
        }

        let now = now_timestamp();
        let entry = ReservationEntry {
            mac,
            ip,
            device_label: label,
            created_at: now.clone(),
        };
        reservations::insert(&mut tx, &entry).await?;
        if !addresses::mark_reserved(&mut tx, ip, &entry.device_label).await? {
            return Err(Error::AddressUnavailable(ip.to_string()));
        }
        history::append(
            &mut tx,
            ip,
            &entry.mac,
            &entry.device_label,
            HistoryAction::Reserved,
            &now,
        )
        .await?;
        tx.commit().await?;

        info!(ip = %ip, mac = %entry.mac, device = %entry.device_label, "Address reserved");
        Ok(entry)
    }

    /// Hand out an address to a MAC.
    ///
    /// A MAC with a reservation always gets its reserved address; if that
    /// address is already assigned it is returned unchanged. Otherwise the
    /// lowest free address is taken.
    pub async fn assign_ip(&self, mac: &str, label: Option<&str>) -> Result<Assignment> {
        let mac = mac.parse::<MacAddr>()?.to_string();
        let label = device_label(label);

        let _guard = self.write_lock.lock().await;
        let mut tx = self.store.begin().await?;

        let ip = match reservations::get_by_mac(&mut tx, &mac).await? {
            Some(reservation) => {
                let addr = addresses::get(&mut tx, reservation.ip)
                    .await?
                    .ok_or_else(|| {
                        Error::Corrupt(format!(
                            "reservation for {} references missing address {}",
                            mac, reservation.ip
                        ))
                    })?;
                if addr.status == AddressStatus::Assigned {
                    debug!(ip = %addr.ip, mac = %mac, "MAC already holds its reserved address");
                    return Ok(Assignment {
                        ip: addr.ip,
                        changed: false,
                    });
                }
                addr.ip
            }
            None => match addresses::lowest_free(&mut tx).await? {
                Some(addr) => addr.ip,
                None => {
                    warn!(mac = %mac, "Address pool exhausted");
                    return Err(Error::PoolExhausted);
                }
            },
        };

        let now = now_timestamp();
        if !addresses::mark_assigned(&mut tx, ip, &label, &now).await? {
            return Err(Error::AddressUnavailable(ip.to_string()));
        }
        history::append(&mut tx, ip, &mac, &label, HistoryAction::Assigned, &now).await?;
        tx.commit().await?;

        info!(ip = %ip, mac = %mac, device = %label, "Address assigned");
        Ok(Assignment { ip, changed: true })
    }

    /// Return an address to the pool, dropping its reservation.
    pub async fn free(&self, ip: &str) -> Result<HistoryEntry> {
        let ip: Ipv4Addr = ip
            .trim()
            .parse()
            .map_err(|_| Error::AddressNotFound(ip.to_string()))?;

        let _guard = self.write_lock.lock().await;
        let mut tx = self.store.begin().await?;

        let addr = addresses::get(&mut tx, ip)
            .await?
            .ok_or_else(|| Error::AddressNotFound(ip.to_string()))?;
        if addr.status == AddressStatus::Free {
            return Err(Error::AlreadyFree(ip.to_string()));
        }

        let reservation = reservations::get_by_ip(&mut tx, ip).await?;
        let (mac, label) = match &reservation {
            Some(r) => (r.mac.as_str(), r.device_label.as_str()),
            None => (UNKNOWN_MAC, UNKNOWN_DEVICE),
        };

        if !addresses::mark_free(&mut tx, ip).await? {
            return Err(Error::AlreadyFree(ip.to_string()));
        }
        reservations::delete_by_ip(&mut tx, ip).await?;
        let entry = history::append(
            &mut tx,
            ip,
            mac,
            label,
            HistoryAction::Released,
            &now_timestamp(),
        )
        .await?;
        tx.commit().await?;

        info!(ip = %ip, mac = %entry.mac, previous = %addr.status, "Address released");
        Ok(entry)
    }

    // === Reads ===

    /// Addresses joined with subnet and reservation.
    ///
    /// Assigned addresses without a reservation recover MAC and device from
    /// their most recent "assigned" history entry.
    pub async fn list_addresses(&self, filter: &AddressFilter) -> Result<Vec<AddressView>> {
        let filter = AddressFilter {
            status: filter.status,
            cidr: match filter.cidr.as_deref().map(str::trim) {
                Some(c) if !c.is_empty() => Some(range::parse_cidr(c)?.to_string()),
                _ => None,
            },
        };

        let mut tx = self.store.begin().await?;
        let joined = addresses::list_joined(&mut tx).await?;
        let last_assigned = history::last_assigned_by_ip(&mut tx).await?;
        tx.commit().await?;

        Ok(joined
            .into_iter()
            .map(|j| {
                let addr = j.address;
                let reserved = j.reserved_mac.is_some();
                let (mac, device_label) = match (j.reserved_mac, addr.status) {
                    (None, AddressStatus::Assigned) => match last_assigned.get(&addr.ip) {
                        Some(h) => (h.mac.clone(), h.device_label.clone()),
                        None => (UNKNOWN_MAC.to_string(), UNKNOWN_DEVICE.to_string()),
                    },
                    (reserved_mac, _) => (
                        reserved_mac.unwrap_or_else(|| UNKNOWN_MAC.to_string()),
                        j.reserved_device
                            .or_else(|| addr.device_label.clone())
                            .unwrap_or_else(|| UNKNOWN_DEVICE.to_string()),
                    ),
                };
                AddressView {
                    reserved,
                    ip: addr.ip,
                    subnet_id: addr.subnet_id,
                    cidr: j.cidr,
                    description: j.description,
                    status: addr.status,
                    mac,
                    device_label,
                    last_assigned: addr.last_assigned,
                }
            })
            .filter(|view| filter.matches(view))
            .collect())
    }

    pub async fn list_subnets(&self) -> Result<Vec<SubnetSummary>> {
        let mut tx = self.store.begin().await?;
        let all = subnets::list(&mut tx).await?;
        let mut usage = addresses::usage_by_subnet(&mut tx).await?;
        tx.commit().await?;

        Ok(all
            .into_iter()
            .map(|s| {
                let usage = usage.remove(&s.id).unwrap_or_default();
                SubnetSummary {
                    id: s.id,
                    cidr: s.cidr,
                    description: s.description,
                    start_ip: usage.lowest,
                    end_ip: usage.highest,
                    stats: usage.stats,
                }
            })
            .collect())
    }

    pub async fn list_reservations(&self) -> Result<Vec<ReservationEntry>> {
        let mut conn = self.store.acquire().await?;
        reservations::list(&mut conn).await
    }

    /// History newest first, optionally for a single address.
    pub async fn list_history(&self, ip: Option<&str>) -> Result<Vec<HistoryEntry>> {
        let ip = match ip.map(str::trim) {
            Some(s) if !s.is_empty() => Some(parse_ip(s)?),
            _ => None,
        };
        let mut conn = self.store.acquire().await?;
        history::list(&mut conn, ip).await
    }

    pub async fn stats(&self) -> Result<PoolStats> {
        let mut conn = self.store.acquire().await?;
        addresses::count_by_status(&mut conn).await
    }
}
