//! Append-only history log.

use sqlx::Row;
use sqlx::SqliteConnection;
use sqlx::sqlite::SqliteRow;
use std::collections::HashMap;
use std::net::Ipv4Addr;

use crate::error::{Error, Result};
use crate::model::{HistoryAction, HistoryEntry};

/// Append one transition and return the stored row.
pub async fn append(
    conn: &mut SqliteConnection,
    ip: Ipv4Addr,
    mac: &str,
    device_label: &str,
    action: HistoryAction,
    timestamp: &str,
) -> Result<HistoryEntry> {
    let result = sqlx::query(
        r#"
        INSERT INTO history (ip, mac, device_label, action, timestamp)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(ip.to_string())
    .bind(mac)
    .bind(device_label)
    .bind(action.as_str())
    .bind(timestamp)
    .execute(&mut *conn)
    .await?;

    Ok(HistoryEntry {
        id: result.last_insert_rowid(),
        ip,
        mac: mac.to_string(),
        device_label: device_label.to_string(),
        action,
        timestamp: timestamp.to_string(),
    })
}

/// History newest first, optionally restricted to one address.
pub async fn list(conn: &mut SqliteConnection, ip: Option<Ipv4Addr>) -> Result<Vec<HistoryEntry>> {
    let rows = match ip {
        Some(ip) => {
            sqlx::query(
                r#"
                SELECT id, ip, mac, device_label, action, timestamp
                FROM history WHERE ip = ? ORDER BY timestamp DESC, id DESC
                "#,
            )
            .bind(ip.to_string())
            .fetch_all(&mut *conn)
            .await?
        }
        None => {
            sqlx::query(
                r#"
                SELECT id, ip, mac, device_label, action, timestamp
                FROM history ORDER BY timestamp DESC, id DESC
                "#,
            )
            .fetch_all(&mut *conn)
            .await?
        }
    };

    rows.iter().map(row_to_history).collect()
}

/// Most recent "assigned" entry per address.
pub async fn last_assigned_by_ip(
    conn: &mut SqliteConnection,
) -> Result<HashMap<Ipv4Addr, HistoryEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT id, ip, mac, device_label, action, timestamp
        FROM history WHERE action = ? ORDER BY timestamp DESC, id DESC
        "#,
    )
    .bind(HistoryAction::Assigned.as_str())
    .fetch_all(&mut *conn)
    .await?;

    let mut latest = HashMap::new();
    for row in &rows {
        let entry = row_to_history(row)?;
        latest.entry(entry.ip).or_insert(entry);
    }
    Ok(latest)
}

fn row_to_history(row: &SqliteRow) -> Result<HistoryEntry> {
    let ip: String = row.get("ip");
    let action: String = row.get("action");
    Ok(HistoryEntry {
        id: row.get("id"),
        ip: ip
            .parse()
            .map_err(|_| Error::Corrupt(format!("invalid history address '{ip}'")))?,
        mac: row.get("mac"),
        device_label: row.get("device_label"),
        action: action
            .parse()
            .map_err(|_| Error::Corrupt(format!("unknown history action '{action}'")))?,
        timestamp: row.get("timestamp"),
    })
}
