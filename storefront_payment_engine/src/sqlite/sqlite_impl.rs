//! `SqliteDatabase` is a concrete implementation of a storefront payment engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`traits`] module.
use std::fmt::Debug;

use log::*;
use sqlx::SqlitePool;

use super::db::{audit, db_url, new_pool, notifications, orders, products};
use crate::{
    db_types::{
        AuditEntry,
        NewAuditEntry,
        NewNotification,
        NewOrder,
        NotificationRecord,
        Order,
        OrderId,
        OrderUpdate,
        Product,
    },
    order_objects::OrderQueryFilter,
    traits::{OrderManagement, PaymentGatewayDatabase, PaymentGatewayError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl PaymentGatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(order, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order #{} has been saved in the DB with id {}", order.order_id, order.id);
        Ok(order)
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_order_id(order_id, &mut conn).await
    }

    async fn update_order(
        &self,
        order_id: &OrderId,
        expected_version: i64,
        update: OrderUpdate,
        audit: Option<NewAuditEntry>,
    ) -> Result<Option<Order>, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let updated = orders::update_order(order_id, expected_version, update, &mut tx).await?;
        if updated.is_none() {
            // Nothing was written, so there is nothing to audit either
            tx.rollback().await?;
            return Ok(None);
        }
        if let Some(entry) = audit {
            trace!("🗃️ Writing audit entry for order {order_id}: {} -> {}", entry.old_status, entry.new_status);
            audit::insert_audit_entry(order_id, entry, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(updated)
    }

    async fn reconcile_order(
        &self,
        order_id: &OrderId,
        expected_version: i64,
        update: OrderUpdate,
        notification: NewNotification,
    ) -> Result<Option<Order>, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let Some(updated) = orders::update_order(order_id, expected_version, update, &mut tx).await? else {
            tx.rollback().await?;
            return Ok(None);
        };
        if !notifications::insert_notification(notification, &mut tx).await? {
            trace!("🗃️ Order {order_id} updated by a notification that was already in the log");
        }
        tx.commit().await?;
        Ok(Some(updated))
    }

    async fn record_notification(&self, notification: NewNotification) -> Result<bool, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        notifications::insert_notification(notification, &mut conn).await
    }

    async fn fetch_product(&self, product_id: &str) -> Result<Option<Product>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        products::fetch_product(product_id, &mut conn).await
    }

    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        self.pool.close().await;
        Ok(())
    }
}

impl OrderManagement for SqliteDatabase {
    async fn order_by_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_order_id(order_id, &mut conn).await
    }

    async fn orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, PaymentGatewayError> {
        let query = OrderQueryFilter::default().with_user_id(user_id.to_string());
        self.search_orders(query).await
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::search_orders(query, &mut conn).await
    }

    async fn notifications_for_order(&self, order_id: &OrderId) -> Result<Vec<NotificationRecord>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        notifications::fetch_notifications_for_order(order_id, &mut conn).await
    }

    async fn audit_log_for_order(&self, order_id: &OrderId) -> Result<Vec<AuditEntry>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        audit::fetch_audit_log_for_order(order_id, &mut conn).await
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date. Safe to call on every startup.
    pub async fn run_migrations(&self) -> Result<(), PaymentGatewayError> {
        sqlx::migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| PaymentGatewayError::DatabaseError(format!("Migration failed: {e}")))?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Adds or replaces a catalog entry. The catalog is maintained outside the payment flow; this exists for seeding
    /// and admin tooling.
    pub async fn upsert_product(&self, product: &Product) -> Result<(), PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        products::upsert_product(product, &mut conn).await
    }
}
