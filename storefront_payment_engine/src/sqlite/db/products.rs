use sqlx::SqliteConnection;

use crate::{db_types::Product, traits::PaymentGatewayError};

pub async fn fetch_product(
    product_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, PaymentGatewayError> {
    let product = sqlx::query_as("SELECT product_id, name, category, price, available FROM products WHERE product_id = $1")
        .bind(product_id)
        .fetch_optional(conn)
        .await?;
    Ok(product)
}

/// Inserts the product, or replaces the catalog entry if it already exists.
pub async fn upsert_product(product: &Product, conn: &mut SqliteConnection) -> Result<(), PaymentGatewayError> {
    sqlx::query(
        r#"
            INSERT INTO products (product_id, name, category, price, available) VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (product_id) DO UPDATE SET
                name = excluded.name,
                category = excluded.category,
                price = excluded.price,
                available = excluded.available
        "#,
    )
    .bind(&product.product_id)
    .bind(&product.name)
    .bind(&product.category)
    .bind(product.price)
    .bind(product.available)
    .execute(conn)
    .await?;
    Ok(())
}
