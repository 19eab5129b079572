use sqlx::Row;
use sqlx::SqliteConnection;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{SubnetEntry, now_timestamp};

/// Build a new subnet row with a fresh id.
pub fn new_entry(
    cidr: &str,
    description: &str,
    start_ip: Option<String>,
    end_ip: Option<String>,
) -> SubnetEntry {
    SubnetEntry {
        id: Uuid::new_v4().to_string(),
        cidr: cidr.to_string(),
        description: description.to_string(),
        start_ip,
        end_ip,
        created_at: now_timestamp(),
    }
}

pub async fn insert(conn: &mut SqliteConnection, entry: &SubnetEntry) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO subnets (id, cidr, description, start_ip, end_ip, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.cidr)
    .bind(&entry.description)
    .bind(&entry.start_ip)
    .bind(&entry.end_ip)
    .bind(&entry.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<SubnetEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT id, cidr, description, start_ip, end_ip, created_at
        FROM subnets ORDER BY created_at, id
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.iter().map(row_to_subnet).collect())
}

fn row_to_subnet(row: &SqliteRow) -> SubnetEntry {
    SubnetEntry {
        id: row.get("id"),
        cidr: row.get("cidr"),
        description: row.get("description"),
        start_ip: row.get("start_ip"),
        end_ip: row.get("end_ip"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::setup_store;

    #[tokio::test]
    async fn test_subnet_insert_and_list() {
        let (store, _dir) = setup_store().await;
        let mut conn = store.acquire().await.unwrap();

        let a = new_entry("10.0.0.0/24", "lab", None, None);
        let b = new_entry(
            "10.0.1.0/24",
            "office",
            Some("10.0.1.10".to_string()),
            Some("10.0.1.20".to_string()),
        );
        insert(&mut conn, &a).await.unwrap();
        insert(&mut conn, &b).await.unwrap();

        let all = list(&mut conn).await.unwrap();
        assert_eq!(all.len(), 2);
        let fetched = all.iter().find(|s| s.id == b.id).unwrap();
        assert_eq!(fetched.cidr, "10.0.1.0/24");
        assert_eq!(fetched.start_ip.as_deref(), Some("10.0.1.10"));
        assert_eq!(fetched.end_ip.as_deref(), Some("10.0.1.20"));
    }

    #[tokio::test]
    async fn test_duplicate_cidr_rejected() {
        let (store, _dir) = setup_store().await;
        let mut conn = store.acquire().await.unwrap();

        insert(&mut conn, &new_entry("10.0.0.0/24", "", None, None))
            .await
            .unwrap();
        assert!(
            insert(&mut conn, &new_entry("10.0.0.0/24", "", None, None))
                .await
                .is_err()
        );
    }
}
