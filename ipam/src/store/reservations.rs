use sqlx::Row;
use sqlx::SqliteConnection;
use sqlx::sqlite::SqliteRow;
use std::net::Ipv4Addr;

use crate::error::{Error, Result};
use crate::model::ReservationEntry;

pub async fn insert(conn: &mut SqliteConnection, entry: &ReservationEntry) -> Result<()> {
    sqlx::query(
        "INSERT INTO reservations (mac, ip, device_label, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&entry.mac)
    .bind(entry.ip.to_string())
    .bind(&entry.device_label)
    .bind(&entry.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn get_by_mac(conn: &mut SqliteConnection, mac: &str) -> Result<Option<ReservationEntry>> {
    let row = sqlx::query(
        "SELECT mac, ip, device_label, created_at FROM reservations WHERE mac = ?",
    )
    .bind(mac)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|r| row_to_reservation(&r)).transpose()
}

pub async fn get_by_ip(
    conn: &mut SqliteConnection,
    ip: Ipv4Addr,
) -> Result<Option<ReservationEntry>> {
    let row = sqlx::query(
        "SELECT mac, ip, device_label, created_at FROM reservations WHERE ip = ?",
    )
    .bind(ip.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|r| row_to_reservation(&r)).transpose()
}

pub async fn delete_by_ip(conn: &mut SqliteConnection, ip: Ipv4Addr) -> Result<bool> {
    let result = sqlx::query("DELETE FROM reservations WHERE ip = ?")
        .bind(ip.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// All reservations, by numeric address.
pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<ReservationEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT r.mac, r.ip, r.device_label, r.created_at
        FROM reservations r
        LEFT JOIN addresses a ON a.ip = r.ip
        ORDER BY a.ip_num
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(row_to_reservation).collect()
}

fn row_to_reservation(row: &SqliteRow) -> Result<ReservationEntry> {
    let ip: String = row.get("ip");
    Ok(ReservationEntry {
        mac: row.get("mac"),
        ip: ip
            .parse()
            .map_err(|_| Error::Corrupt(format!("invalid reserved address '{ip}'")))?,
        device_label: row.get("device_label"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::now_timestamp;
    use crate::store::test_support::setup_store;
    use crate::store::{addresses, subnets};

    #[tokio::test]
    async fn test_reservation_crud() {
        let (store, _dir) = setup_store().await;
        let mut conn = store.acquire().await.unwrap();

        let subnet = subnets::new_entry("10.0.0.0/29", "", None, None);
        subnets::insert(&mut conn, &subnet).await.unwrap();
        addresses::insert_free(
            &mut conn,
            &subnet.id,
            (1..=6).map(|n| Ipv4Addr::new(10, 0, 0, n)),
        )
        .await
        .unwrap();

        let entry = ReservationEntry {
            mac: "52:54:00:12:34:56".to_string(),
            ip: Ipv4Addr::new(10, 0, 0, 3),
            device_label: "printer".to_string(),
            created_at: now_timestamp(),
        };
        insert(&mut conn, &entry).await.unwrap();

        let by_mac = get_by_mac(&mut conn, "52:54:00:12:34:56")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_mac.ip, Ipv4Addr::new(10, 0, 0, 3));

        let by_ip = get_by_ip(&mut conn, Ipv4Addr::new(10, 0, 0, 3))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_ip.device_label, "printer");

        assert_eq!(list(&mut conn).await.unwrap().len(), 1);

        // Same MAC cannot hold a second row
        let dup = ReservationEntry {
            ip: Ipv4Addr::new(10, 0, 0, 4),
            ..entry.clone()
        };
        assert!(insert(&mut conn, &dup).await.is_err());

        assert!(delete_by_ip(&mut conn, Ipv4Addr::new(10, 0, 0, 3)).await.unwrap());
        assert!(!delete_by_ip(&mut conn, Ipv4Addr::new(10, 0, 0, 3)).await.unwrap());
        assert!(get_by_mac(&mut conn, &entry.mac).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reservation_requires_existing_address() {
        let (store, _dir) = setup_store().await;
        let mut conn = store.acquire().await.unwrap();

        let entry = ReservationEntry {
            mac: "52:54:00:00:00:01".to_string(),
            ip: Ipv4Addr::new(192, 0, 2, 1),
            device_label: "ghost".to_string(),
            created_at: now_timestamp(),
        };
        assert!(insert(&mut conn, &entry).await.is_err());
    }
}
