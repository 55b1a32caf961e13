use chrono::Utc;
use log::{debug, trace};
use sqlx::{types::Json, QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderUpdate},
    order_objects::OrderQueryFilter,
    traits::PaymentGatewayError,
};

/// Inserts a new order into the database using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
///
/// Fails with [`PaymentGatewayError::OrderAlreadyExists`] if the order id is already taken.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, PaymentGatewayError> {
    if fetch_order_by_order_id(&order.order_id, conn).await?.is_some() {
        return Err(PaymentGatewayError::OrderAlreadyExists(order.order_id));
    }
    let status = order.initial_status();
    let order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                user_id,
                items,
                shipping_fee,
                total_price,
                currency,
                status,
                payment_status,
                payment_method,
                customer,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, 'unpaid', $8, $9, $10, $10)
            RETURNING *;
        "#,
    )
    .bind(order.order_id.as_str())
    .bind(order.user_id)
    .bind(Json(order.items))
    .bind(order.shipping_fee)
    .bind(order.total_price)
    .bind(order.currency)
    .bind(status)
    .bind(order.payment_method.to_string())
    .bind(Json(order.customer))
    .bind(order.created_at)
    .fetch_one(conn)
    .await?;
    Ok(order)
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE order_id = $1")
        .bind(order_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

/// Applies `update` to the order only if its version is still `expected_version`, bumping the version in the same
/// statement. Returns `None` if the version check failed (or the order does not exist).
pub(crate) async fn update_order(
    order_id: &OrderId,
    expected_version: i64,
    update: OrderUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE orders SET ");
    let mut set_clause = builder.separated(", ");
    set_clause.push("version = version + 1");
    set_clause.push("updated_at = ");
    set_clause.push_bind_unseparated(Utc::now());
    if let Some(status) = update.status {
        set_clause.push("status = ");
        set_clause.push_bind_unseparated(status);
    }
    if let Some(payment_status) = update.payment_status {
        set_clause.push("payment_status = ");
        set_clause.push_bind_unseparated(payment_status);
    }
    if let Some(payment_id) = update.payment_id {
        set_clause.push("payment_id = ");
        set_clause.push_bind_unseparated(payment_id);
    }
    if let Some(token) = update.payment_token {
        set_clause.push("payment_token = ");
        set_clause.push_bind_unseparated(token);
    }
    if let Some(url) = update.redirect_url {
        set_clause.push("redirect_url = ");
        set_clause.push_bind_unseparated(url);
    }
    if let Some(created_at) = update.session_created_at {
        set_clause.push("session_created_at = ");
        set_clause.push_bind_unseparated(created_at);
    }
    if let Some(event) = update.gateway_event {
        set_clause.push("gateway_event = ");
        set_clause.push_bind_unseparated(event);
        // The event and its time always travel together
        set_clause.push("gateway_transaction_time = ");
        set_clause.push_bind_unseparated(update.gateway_transaction_time);
    }
    if let Some(sessions) = update.replaced_sessions {
        set_clause.push("replaced_sessions = ");
        set_clause.push_bind_unseparated(Json(sessions));
    }
    builder.push(" WHERE order_id = ");
    builder.push_bind(order_id.as_str().to_string());
    builder.push(" AND version = ");
    builder.push_bind(expected_version);
    builder.push(" RETURNING *");
    trace!("🗃️ Executing query: {}", builder.sql());
    let order = builder.build_query_as::<Order>().fetch_optional(conn).await?;
    match &order {
        Some(o) => debug!("🗃️ Order {order_id} updated to version {}", o.version),
        None => debug!("🗃️ Order {order_id} was not at version {expected_version}. Update skipped."),
    }
    Ok(order)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `created_at` in descending order
pub async fn search_orders(
    query: OrderQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, PaymentGatewayError> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(user_id) = query.user_id {
        where_clause.push("user_id = ");
        where_clause.push_bind_unseparated(user_id);
    }
    if let Some(status) = query.status {
        where_clause.push("status = ");
        where_clause.push_bind_unseparated(status);
    }
    if let Some(payment_status) = query.payment_status {
        where_clause.push("payment_status = ");
        where_clause.push_bind_unseparated(payment_status);
    }
    if let Some(method) = query.payment_method {
        where_clause.push("payment_method = ");
        where_clause.push_bind_unseparated(method);
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at DESC, id DESC");

    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("🗃️ Result of search_orders: {:?}", orders.len());
    Ok(orders)
}
