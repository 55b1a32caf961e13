#![allow(dead_code)]
pub mod mocks;
pub mod prepare_env;

use chrono::{DateTime, Utc};
use storefront_payment_engine::{
    db_types::{
        CustomerDetails,
        FraudStatus,
        MinorUnits,
        NewOrder,
        Order,
        OrderItem,
        OrderUpdate,
        PaymentMethod,
        Role,
        Requester,
        ShippingAddress,
        TransactionStatus,
    },
    helpers::new_order_id,
    traits::{GatewaySession, GatewayTransactionStatus},
    PaymentGatewayDatabase,
    SqliteDatabase,
};

pub fn customer() -> CustomerDetails {
    CustomerDetails {
        first_name: "Alice".into(),
        last_name: Some("Liddell".into()),
        email: "alice@example.com".into(),
        phone: Some("+628123456789".into()),
        shipping_address: Some(ShippingAddress {
            first_name: "Alice".into(),
            last_name: Some("Liddell".into()),
            phone: Some("+628123456789".into()),
            address: "Jl. Sudirman 1".into(),
            city: "Jakarta".into(),
            postal_code: "10220".into(),
            country_code: "IDN".into(),
        }),
    }
}

/// Three t-shirts at 33,333 plus 1 shipping: exactly 100,000.
pub fn new_order(user_id: &str, payment_method: PaymentMethod) -> NewOrder {
    let now = Utc::now();
    NewOrder {
        order_id: new_order_id(now),
        user_id: user_id.into(),
        items: vec![OrderItem {
            product_id: "tshirt".into(),
            name: "Logo T-Shirt".into(),
            category: Some("apparel".into()),
            quantity: 3,
            unit_price: MinorUnits::from(33_333),
            selected_color: Some("black".into()),
            selected_size: Some("L".into()),
        }],
        shipping_fee: MinorUnits::from(1),
        total_price: MinorUnits::from(100_000),
        currency: "IDR".into(),
        payment_method,
        customer: customer(),
        created_at: now,
    }
}

pub fn gateway_method() -> PaymentMethod {
    PaymentMethod::Gateway("bank_transfer".into())
}

/// An `awaiting_payment` order for `user_id` that already has a payment session.
pub async fn order_with_session(
    db: &SqliteDatabase,
    user_id: &str,
    token: &str,
    transaction_id: &str,
    session_created_at: DateTime<Utc>,
) -> Order {
    let order = db.insert_order(new_order(user_id, gateway_method())).await.expect("Error inserting order");
    let update = OrderUpdate::default()
        .with_session(token.into(), format!("https://pay.example.com/{token}"), session_created_at)
        .with_payment_id(transaction_id);
    db.update_order(&order.order_id, order.version, update, None)
        .await
        .expect("Error updating order")
        .expect("Version conflict on a fresh order")
}

pub fn session(token: &str, transaction_id: Option<&str>) -> GatewaySession {
    GatewaySession {
        token: token.into(),
        redirect_url: format!("https://pay.example.com/{token}"),
        transaction_id: transaction_id.map(String::from),
        gross_amount: MinorUnits::from(100_000),
    }
}

pub fn tx_status(
    transaction_id: &str,
    status: TransactionStatus,
    fraud_status: Option<FraudStatus>,
    transaction_time: Option<DateTime<Utc>>,
) -> GatewayTransactionStatus {
    GatewayTransactionStatus {
        transaction_id: transaction_id.into(),
        status,
        fraud_status,
        transaction_time,
        gross_amount: Some(MinorUnits::from(100_000)),
    }
}

pub fn user(user_id: &str) -> Requester {
    Requester::new(user_id, vec![Role::User])
}

pub fn admin() -> Requester {
    Requester::new("admin", vec![Role::Write])
}

pub fn super_admin() -> Requester {
    Requester::new("root", vec![Role::SuperAdmin])
}
