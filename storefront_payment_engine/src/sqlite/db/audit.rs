use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    db_types::{AuditEntry, NewAuditEntry, OrderId},
    traits::PaymentGatewayError,
};

pub async fn insert_audit_entry(
    order_id: &OrderId,
    entry: NewAuditEntry,
    conn: &mut SqliteConnection,
) -> Result<(), PaymentGatewayError> {
    sqlx::query(
        r#"
            INSERT INTO audit_log (order_id, actor, old_status, new_status, reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(order_id.as_str())
    .bind(entry.actor)
    .bind(entry.old_status)
    .bind(entry.new_status)
    .bind(entry.reason)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_audit_log_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<AuditEntry>, PaymentGatewayError> {
    let entries = sqlx::query_as("SELECT * FROM audit_log WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(entries)
}
