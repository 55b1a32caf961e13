use actix_web::{body::to_bytes, http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use chrono::Utc;
use log::debug;
use spg_common::Secret;
use storefront_payment_engine::{
    db_types::{
        CustomerDetails,
        MinorUnits,
        NewOrder,
        Order,
        OrderId,
        OrderItem,
        OrderStatusType,
        PaymentMethod,
        PaymentStatus,
        Product,
        Role,
    },
    helpers::new_order_id,
    traits::GatewaySession,
    PaymentGatewayDatabase,
    SqliteDatabase,
};

use crate::{
    auth::{JwtAuthority, ACCESS_TOKEN_HEADER},
    config::AuthConfig,
    helpers::calculate_hmac,
    middleware::{JwtMiddlewareFactory, SignatureCheckFactory},
};

pub const WEBHOOK_SECRET: &str = "webhook-secret-for-tests";
pub const SIGNATURE_HEADER: &str = "X-Gateway-Signature";

// Creates a test `AuthConfig` for issuing tokens. DO NOT re-use this secret anywhere.
pub fn get_auth_config() -> AuthConfig {
    AuthConfig::new("0b6c3f9ad0e7e2f4b8a1c5d9e3f7a2b6c0d4e8f2a6b0c4d8")
}

pub fn issue_token(user_id: &str, roles: Vec<Role>) -> String {
    JwtAuthority::new(&get_auth_config()).issue_token(user_id, roles, None).expect("Failed to sign token")
}

/// Sends the request through an app with the JWT middleware in front of the routes that `configure` sets up, and
/// returns the status and body, whether the request was turned away by a middleware or answered by a handler.
pub async fn send_request<F>(req: TestRequest, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let authority = JwtAuthority::new(&get_auth_config());
    let app = App::new().service(web::scope("").wrap(JwtMiddlewareFactory::new(authority)).configure(configure));
    let service = test::init_service(app).await;
    debug!("Making request");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let body = to_bytes(res.into_body()).await.unwrap_or_default();
            (status, String::from_utf8_lossy(&body).into_owned())
        },
    }
}

/// Like [`send_request`], but through the signature check that guards the gateway webhook.
pub async fn send_webhook<F>(req: TestRequest, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let hmac = SignatureCheckFactory::new(SIGNATURE_HEADER, Secret::new(WEBHOOK_SECRET.to_string()));
    let app = App::new().service(web::scope("/gateway").wrap(hmac).configure(configure));
    let service = test::init_service(app).await;
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let body = to_bytes(res.into_body()).await.unwrap_or_default();
            (status, String::from_utf8_lossy(&body).into_owned())
        },
    }
}

pub fn with_token(req: TestRequest, user_id: &str, roles: Vec<Role>) -> TestRequest {
    req.insert_header((ACCESS_TOKEN_HEADER, issue_token(user_id, roles)))
}

pub fn signed_notification(body: &str) -> TestRequest {
    TestRequest::post()
        .uri("/gateway/notification")
        .insert_header(("content-type", "application/json"))
        .insert_header((SIGNATURE_HEADER, calculate_hmac(WEBHOOK_SECRET, body.as_bytes())))
        .set_payload(body.to_string())
}

pub fn sample_order(order_id: &str, user_id: &str) -> Order {
    let now = Utc::now();
    Order {
        id: 1,
        order_id: OrderId::from(order_id),
        user_id: user_id.into(),
        items: vec![tshirts()],
        shipping_fee: MinorUnits::from(1),
        total_price: MinorUnits::from(100_000),
        currency: "IDR".into(),
        status: OrderStatusType::AwaitingPayment,
        payment_status: PaymentStatus::Unpaid,
        payment_method: PaymentMethod::Gateway("bank_transfer".into()),
        payment_id: None,
        payment_token: None,
        redirect_url: None,
        session_created_at: None,
        gateway_event: None,
        gateway_transaction_time: None,
        replaced_sessions: vec![],
        customer: customer(),
        version: 0,
        created_at: now,
        updated_at: now,
    }
}

pub fn customer() -> CustomerDetails {
    CustomerDetails {
        first_name: "Alice".into(),
        last_name: Some("Liddell".into()),
        email: "alice@example.com".into(),
        ..Default::default()
    }
}

fn tshirts() -> OrderItem {
    OrderItem {
        product_id: "tshirt".into(),
        name: "Logo T-Shirt".into(),
        category: Some("apparel".into()),
        quantity: 3,
        unit_price: MinorUnits::from(33_333),
        selected_color: None,
        selected_size: None,
    }
}

pub fn session(token: &str, transaction_id: &str) -> GatewaySession {
    GatewaySession {
        token: token.into(),
        redirect_url: format!("https://pay.example.com/{token}"),
        transaction_id: Some(transaction_id.into()),
        gross_amount: MinorUnits::from(100_000),
    }
}

//--------------------------------------   Test database   ---------------------------------------------------------
pub async fn test_database() -> SqliteDatabase {
    let _ = env_logger::try_init();
    let path = std::env::temp_dir().join(format!("spg_server_test_{:016x}.db", rand::random::<u64>()));
    let url = format!("sqlite://{}", path.display());
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating test database");
    db.run_migrations().await.expect("Error running DB migrations");
    let product = Product {
        product_id: "tshirt".into(),
        name: "Logo T-Shirt".into(),
        category: Some("apparel".into()),
        price: MinorUnits::from(33_333),
        available: true,
    };
    db.upsert_product(&product).await.expect("Error seeding catalog");
    db
}

pub async fn tear_down(mut db: SqliteDatabase) {
    let path = db.url().trim_start_matches("sqlite://").to_string();
    db.close().await.expect("Error closing database");
    let _ = std::fs::remove_file(path);
}

/// Inserts an order for three t-shirts (plus 1 shipping) straight into the database, bypassing checkout.
pub async fn insert_order(db: &SqliteDatabase, user_id: &str) -> Order {
    let now = Utc::now();
    let order = NewOrder {
        order_id: new_order_id(now),
        user_id: user_id.into(),
        items: vec![tshirts()],
        shipping_fee: MinorUnits::from(1),
        total_price: MinorUnits::from(100_000),
        currency: "IDR".into(),
        payment_method: PaymentMethod::Gateway("bank_transfer".into()),
        customer: customer(),
        created_at: now,
    };
    db.insert_order(order).await.expect("Error inserting order")
}
