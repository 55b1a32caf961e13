use chrono::Utc;
use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewNotification, NotificationRecord, OrderId},
    traits::PaymentGatewayError,
};

/// Appends the notification to the log. Returns `false` if the same (transaction id, transaction status, fraud status)
/// triple has been recorded before.
pub async fn insert_notification(
    notification: NewNotification,
    conn: &mut SqliteConnection,
) -> Result<bool, PaymentGatewayError> {
    let fraud_status = notification.fraud_status.map(|f| f.to_string()).unwrap_or_default();
    let result = sqlx::query(
        r#"
            INSERT INTO payment_notifications (
                order_id,
                transaction_id,
                transaction_status,
                fraud_status,
                transaction_time,
                outcome,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (transaction_id, transaction_status, fraud_status) DO NOTHING
        "#,
    )
    .bind(notification.order_id.as_str())
    .bind(&notification.transaction_id)
    .bind(notification.transaction_status.to_string())
    .bind(fraud_status)
    .bind(notification.transaction_time)
    .bind(&notification.outcome)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    let inserted = result.rows_affected() == 1;
    trace!(
        "🗃️ Notification {}/{} for order {} recorded: {inserted}",
        notification.transaction_id,
        notification.transaction_status,
        notification.order_id
    );
    Ok(inserted)
}

pub async fn fetch_notifications_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<NotificationRecord>, PaymentGatewayError> {
    let records = sqlx::query_as("SELECT * FROM payment_notifications WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(records)
}
