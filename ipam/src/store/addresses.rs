use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use std::collections::HashMap;
use std::net::Ipv4Addr;

use crate::error::{Error, Result};
use crate::model::{AddressEntry, AddressStatus, PoolStats};

/// Rows per INSERT statement when materialising a subnet.
const INSERT_CHUNK: usize = 500;

/// Address joined with its subnet and reservation.
#[derive(Debug, Clone)]
pub struct JoinedAddress {
    pub address: AddressEntry,
    pub cidr: String,
    pub description: String,
    pub reserved_mac: Option<String>,
    pub reserved_device: Option<String>,
}

/// Extent and usage of one subnet's addresses.
#[derive(Debug, Clone, Default)]
pub struct SubnetUsage {
    pub lowest: Option<Ipv4Addr>,
    pub highest: Option<Ipv4Addr>,
    pub stats: PoolStats,
}

/// Insert every address as free. Returns the number of rows written.
pub async fn insert_free(
    conn: &mut SqliteConnection,
    subnet_id: &str,
    addrs: impl IntoIterator<Item = Ipv4Addr>,
) -> Result<u64> {
    let addrs: Vec<Ipv4Addr> = addrs.into_iter().collect();
    let mut written = 0;

    for chunk in addrs.chunks(INSERT_CHUNK) {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("INSERT INTO addresses (ip, ip_num, subnet_id, status) ");
        builder.push_values(chunk, |mut row, addr| {
            row.push_bind(addr.to_string())
                .push_bind(i64::from(u32::from(*addr)))
                .push_bind(subnet_id)
                .push_bind(AddressStatus::Free.as_str());
        });
        written += builder.build().execute(&mut *conn).await?.rows_affected();
    }

    Ok(written)
}

pub async fn get(conn: &mut SqliteConnection, ip: Ipv4Addr) -> Result<Option<AddressEntry>> {
    let row = sqlx::query(
        r#"
        SELECT ip, subnet_id, status, device_label, last_assigned
        FROM addresses WHERE ip = ?
        "#,
    )
    .bind(ip.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|r| row_to_address(&r)).transpose()
}

/// Free address with the lowest numeric value.
pub async fn lowest_free(conn: &mut SqliteConnection) -> Result<Option<AddressEntry>> {
    let row = sqlx::query(
        r#"
        SELECT ip, subnet_id, status, device_label, last_assigned
        FROM addresses WHERE status = ? ORDER BY ip_num LIMIT 1
        "#,
    )
    .bind(AddressStatus::Free.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|r| row_to_address(&r)).transpose()
}

/// Move a free address to reserved. Returns false if it was not free.
pub async fn mark_reserved(
    conn: &mut SqliteConnection,
    ip: Ipv4Addr,
    device_label: &str,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE addresses SET status = ?, device_label = ? WHERE ip = ? AND status = ?",
    )
    .bind(AddressStatus::Reserved.as_str())
    .bind(device_label)
    .bind(ip.to_string())
    .bind(AddressStatus::Free.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Move a free or reserved address to assigned. Returns false otherwise.
pub async fn mark_assigned(
    conn: &mut SqliteConnection,
    ip: Ipv4Addr,
    device_label: &str,
    timestamp: &str,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE addresses SET status = ?, device_label = ?, last_assigned = ?
        WHERE ip = ? AND status IN (?, ?)
        "#,
    )
    .bind(AddressStatus::Assigned.as_str())
    .bind(device_label)
    .bind(timestamp)
    .bind(ip.to_string())
    .bind(AddressStatus::Free.as_str())
    .bind(AddressStatus::Reserved.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Return a non-free address to the pool. Returns false if it was already free.
pub async fn mark_free(conn: &mut SqliteConnection, ip: Ipv4Addr) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE addresses SET status = ?, device_label = NULL, last_assigned = NULL
        WHERE ip = ? AND status != ?
        "#,
    )
    .bind(AddressStatus::Free.as_str())
    .bind(ip.to_string())
    .bind(AddressStatus::Free.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// All addresses with subnet and reservation columns, by numeric value.
pub async fn list_joined(conn: &mut SqliteConnection) -> Result<Vec<JoinedAddress>> {
    let rows = sqlx::query(
        r#"
        SELECT a.ip, a.subnet_id, a.status, a.device_label, a.last_assigned,
               s.cidr, s.description,
               r.mac AS reserved_mac, r.device_label AS reserved_device
        FROM addresses a
        LEFT JOIN subnets s ON a.subnet_id = s.id
        LEFT JOIN reservations r ON a.ip = r.ip
        ORDER BY a.ip_num
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|r| {
            Ok(JoinedAddress {
                address: row_to_address(r)?,
                cidr: r.get::<Option<String>, _>("cidr").unwrap_or_default(),
                description: r.get::<Option<String>, _>("description").unwrap_or_default(),
                reserved_mac: r.get("reserved_mac"),
                reserved_device: r.get("reserved_device"),
            })
        })
        .collect()
}

/// Address counts per status across the whole pool.
pub async fn count_by_status(conn: &mut SqliteConnection) -> Result<PoolStats> {
    let rows = sqlx::query("SELECT status, COUNT(*) AS count FROM addresses GROUP BY status")
        .fetch_all(&mut *conn)
        .await?;

    let mut stats = PoolStats::default();
    for row in &rows {
        stats.add(parse_status(row)?, row.get::<i64, _>("count") as u64);
    }
    Ok(stats)
}

/// Lowest/highest address and status counts, keyed by subnet id.
pub async fn usage_by_subnet(conn: &mut SqliteConnection) -> Result<HashMap<String, SubnetUsage>> {
    let rows = sqlx::query(
        r#"
        SELECT subnet_id, status, COUNT(*) AS count,
               MIN(ip_num) AS lowest, MAX(ip_num) AS highest
        FROM addresses GROUP BY subnet_id, status
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut usage: HashMap<String, SubnetUsage> = HashMap::new();
    for row in &rows {
        let entry = usage.entry(row.get("subnet_id")).or_default();
        entry
            .stats
            .add(parse_status(row)?, row.get::<i64, _>("count") as u64);

        let lowest = Ipv4Addr::from(row.get::<i64, _>("lowest") as u32);
        let highest = Ipv4Addr::from(row.get::<i64, _>("highest") as u32);
        entry.lowest = Some(entry.lowest.map_or(lowest, |l| l.min(lowest)));
        entry.highest = Some(entry.highest.map_or(highest, |h| h.max(highest)));
    }
    Ok(usage)
}

fn parse_status(row: &SqliteRow) -> Result<AddressStatus> {
    let status: String = row.get("status");
    status
        .parse()
        .map_err(|_| Error::Corrupt(format!("unknown address status '{status}'")))
}

fn row_to_address(row: &SqliteRow) -> Result<AddressEntry> {
    let ip: String = row.get("ip");
    Ok(AddressEntry {
        ip: ip
            .parse()
            .map_err(|_| Error::Corrupt(format!("invalid address '{ip}'")))?,
        subnet_id: row.get("subnet_id"),
        status: parse_status(row)?,
        device_label: row.get("device_label"),
        last_assigned: row.get("last_assigned"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::subnets;
    use crate::store::test_support::setup_store;

    fn ip(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_transitions() {
        let (store, _dir) = setup_store().await;
        let mut conn = store.acquire().await.unwrap();

        let subnet = subnets::new_entry("10.0.0.0/29", "", None, None);
        subnets::insert(&mut conn, &subnet).await.unwrap();
        let written = insert_free(
            &mut conn,
            &subnet.id,
            (1..=6).map(|n| Ipv4Addr::new(10, 0, 0, n)),
        )
        .await
        .unwrap();
        assert_eq!(written, 6);

        let first = lowest_free(&mut conn).await.unwrap().unwrap();
        assert_eq!(first.ip, ip("10.0.0.1"));
        assert_eq!(first.status, AddressStatus::Free);

        assert!(mark_reserved(&mut conn, ip("10.0.0.1"), "printer").await.unwrap());
        assert!(!mark_reserved(&mut conn, ip("10.0.0.1"), "again").await.unwrap());
        assert_eq!(
            lowest_free(&mut conn).await.unwrap().unwrap().ip,
            ip("10.0.0.2")
        );

        assert!(
            mark_assigned(&mut conn, ip("10.0.0.1"), "printer", "2026-01-01T00:00:00.000000Z")
                .await
                .unwrap()
        );
        assert!(
            !mark_assigned(&mut conn, ip("10.0.0.1"), "other", "2026-01-01T00:00:00.000000Z")
                .await
                .unwrap()
        );
        let entry = get(&mut conn, ip("10.0.0.1")).await.unwrap().unwrap();
        assert_eq!(entry.status, AddressStatus::Assigned);
        assert_eq!(entry.device_label.as_deref(), Some("printer"));
        assert!(entry.last_assigned.is_some());

        assert!(mark_free(&mut conn, ip("10.0.0.1")).await.unwrap());
        assert!(!mark_free(&mut conn, ip("10.0.0.1")).await.unwrap());
        let entry = get(&mut conn, ip("10.0.0.1")).await.unwrap().unwrap();
        assert_eq!(entry.status, AddressStatus::Free);
        assert!(entry.device_label.is_none());
        assert!(entry.last_assigned.is_none());

        assert!(get(&mut conn, ip("10.0.0.7")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_numeric_ordering() {
        let (store, _dir) = setup_store().await;
        let mut conn = store.acquire().await.unwrap();

        let subnet = subnets::new_entry("10.0.0.0/24", "", None, None);
        subnets::insert(&mut conn, &subnet).await.unwrap();
        // Lexicographically "10.0.0.100" < "10.0.0.9"
        insert_free(&mut conn, &subnet.id, [ip("10.0.0.100"), ip("10.0.0.9")])
            .await
            .unwrap();

        assert_eq!(
            lowest_free(&mut conn).await.unwrap().unwrap().ip,
            ip("10.0.0.9")
        );
        let joined = list_joined(&mut conn).await.unwrap();
        assert_eq!(joined[0].address.ip, ip("10.0.0.9"));
        assert_eq!(joined[0].cidr, "10.0.0.0/24");
    }

    #[tokio::test]
    async fn test_large_insert_is_chunked() {
        let (store, _dir) = setup_store().await;
        let mut tx = store.begin().await.unwrap();

        let subnet = subnets::new_entry("10.1.0.0/22", "", None, None);
        subnets::insert(&mut tx, &subnet).await.unwrap();
        let net: ipnet::Ipv4Net = "10.1.0.0/22".parse().unwrap();
        let written = insert_free(&mut tx, &subnet.id, net.hosts()).await.unwrap();
        assert_eq!(written, 1022);
        tx.commit().await.unwrap();

        let mut conn = store.acquire().await.unwrap();
        let stats = count_by_status(&mut conn).await.unwrap();
        assert_eq!(stats.total, 1022);
        assert_eq!(stats.free, 1022);
    }

    #[tokio::test]
    async fn test_usage_by_subnet() {
        let (store, _dir) = setup_store().await;
        let mut conn = store.acquire().await.unwrap();

        let subnet = subnets::new_entry("10.0.0.0/29", "", None, None);
        subnets::insert(&mut conn, &subnet).await.unwrap();
        insert_free(
            &mut conn,
            &subnet.id,
            (2..=5).map(|n| Ipv4Addr::new(10, 0, 0, n)),
        )
        .await
        .unwrap();
        mark_reserved(&mut conn, ip("10.0.0.5"), "nas").await.unwrap();

        let usage = usage_by_subnet(&mut conn).await.unwrap();
        let entry = &usage[&subnet.id];
        assert_eq!(entry.lowest, Some(ip("10.0.0.2")));
        assert_eq!(entry.highest, Some(ip("10.0.0.5")));
        assert_eq!(entry.stats.total, 4);
        assert_eq!(entry.stats.free, 3);
        assert_eq!(entry.stats.reserved, 1);
    }
}
