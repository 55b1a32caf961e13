use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
pub use spg_common::MinorUnits;
use sqlx::{sqlite::SqliteRow, types::Json, FromRow, Row, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderId        ---------------------------------------------------------
/// The storefront's order identifier. It doubles as the external order id at the payment gateway, so it must never be
/// re-minted for an existing order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ConversionError("Order id cannot be empty".into()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// Cash-on-delivery orders start here. Gateway orders land here when a payment is held for fraud review.
    Pending,
    /// The order has been created and is waiting for the customer to complete payment at the gateway.
    AwaitingPayment,
    /// Payment has been received and the order is being prepared.
    Processing,
    Completed,
    Shipped,
    Delivered,
    /// The order was cancelled by an admin, or the payment was denied, cancelled or expired.
    Cancelled,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Delivered | Self::Cancelled)
    }

    /// Statuses that imply the order has been paid for.
    pub fn implies_paid(&self) -> bool {
        matches!(self, Self::Processing | Self::Completed | Self::Shipped | Self::Delivered)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::AwaitingPayment => write!(f, "awaiting_payment"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Shipped => write!(f, "shipped"),
            Self::Delivered => write!(f, "delivered"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "awaiting_payment" => Ok(Self::AwaitingPayment),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------    PaymentStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Refunded,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unpaid => write!(f, "unpaid"),
            Self::Paid => write!(f, "paid"),
            Self::Refunded => write!(f, "refunded"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(Self::Unpaid),
            "paid" => Ok(Self::Paid),
            "refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------    PaymentMethod      ---------------------------------------------------------
pub const CASH_ON_DELIVERY: &str = "cod";

/// How the customer pays. Cash on delivery bypasses the payment gateway entirely. Any other value names the gateway
/// payment channel the customer picked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum PaymentMethod {
    CashOnDelivery,
    Gateway(String),
}

impl PaymentMethod {
    pub fn uses_gateway(&self) -> bool {
        matches!(self, Self::Gateway(_))
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CashOnDelivery => write!(f, "{CASH_ON_DELIVERY}"),
            Self::Gateway(channel) => write!(f, "{channel}"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err(ConversionError("Payment method cannot be empty".into())),
            CASH_ON_DELIVERY => Ok(Self::CashOnDelivery),
            s => Ok(Self::Gateway(s.to_string())),
        }
    }
}

impl TryFrom<String> for PaymentMethod {
    type Error = ConversionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PaymentMethod> for String {
    fn from(value: PaymentMethod) -> Self {
        value.to_string()
    }
}

//--------------------------------------  TransactionStatus    ---------------------------------------------------------
/// The transaction status values reported by the payment gateway that the storefront acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Capture,
    Settlement,
    Pending,
    Deny,
    Cancel,
    Expire,
    Failure,
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Capture => write!(f, "capture"),
            Self::Settlement => write!(f, "settlement"),
            Self::Pending => write!(f, "pending"),
            Self::Deny => write!(f, "deny"),
            Self::Cancel => write!(f, "cancel"),
            Self::Expire => write!(f, "expire"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "capture" => Ok(Self::Capture),
            "settlement" => Ok(Self::Settlement),
            "pending" => Ok(Self::Pending),
            "deny" => Ok(Self::Deny),
            "cancel" => Ok(Self::Cancel),
            "expire" => Ok(Self::Expire),
            "failure" => Ok(Self::Failure),
            s => Err(ConversionError(format!("Invalid transaction status: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FraudStatus {
    Accept,
    Challenge,
}

impl Display for FraudStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accept => write!(f, "accept"),
            Self::Challenge => write!(f, "challenge"),
        }
    }
}

impl FromStr for FraudStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accept" => Ok(Self::Accept),
            "challenge" => Ok(Self::Challenge),
            s => Err(ConversionError(format!("Invalid fraud status: {s}"))),
        }
    }
}

//--------------------------------------     GatewayEvent      ---------------------------------------------------------
/// The meaning of a gateway notification once the transaction and fraud statuses have been combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GatewayEvent {
    /// The customer has not completed payment yet.
    Pending,
    /// Funds were captured but the gateway's fraud screening wants a human to look at it.
    Challenged,
    /// Funds were captured and accepted, or settled.
    Accepted,
    /// The payment was denied, cancelled, expired or failed.
    Failed,
}

impl GatewayEvent {
    pub fn from_statuses(status: TransactionStatus, fraud: Option<FraudStatus>) -> Self {
        use TransactionStatus::*;
        match (status, fraud) {
            (Capture, Some(FraudStatus::Challenge)) => Self::Challenged,
            (Capture, _) | (Settlement, _) => Self::Accepted,
            (Pending, _) => Self::Pending,
            (Deny, _) | (Cancel, _) | (Expire, _) | (Failure, _) => Self::Failed,
        }
    }

    /// Position of the event in a transaction's lifecycle. A notification can only move a transaction forward.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Challenged => 1,
            Self::Accepted | Self::Failed => 2,
        }
    }
}

impl Display for GatewayEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Challenged => write!(f, "challenged"),
            Self::Accepted => write!(f, "accepted"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

//--------------------------------------       OrderItem       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub quantity: i64,
    pub unit_price: MinorUnits,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_size: Option<String>,
}

impl OrderItem {
    /// `unit_price * quantity`, or `None` on overflow.
    pub fn line_total(&self) -> Option<MinorUnits> {
        self.unit_price.checked_mul(self.quantity)
    }
}

//--------------------------------------    CustomerDetails    ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country_code: String,
}

/// A snapshot of who is paying and where the goods go. Stored on the order so that a retried payment session can be
/// built without going back to the address book.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub shipping_address: Option<ShippingAddress>,
}

//--------------------------------------         Order         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub user_id: String,
    pub items: Vec<OrderItem>,
    pub shipping_fee: MinorUnits,
    pub total_price: MinorUnits,
    pub currency: String,
    pub status: OrderStatusType,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub payment_id: Option<String>,
    pub payment_token: Option<String>,
    pub redirect_url: Option<String>,
    pub session_created_at: Option<DateTime<Utc>>,
    pub gateway_event: Option<GatewayEvent>,
    pub gateway_transaction_time: Option<DateTime<Utc>>,
    /// Sessions that were abandoned in favour of a newer one, oldest first.
    #[serde(default)]
    pub replaced_sessions: Vec<ReplacedSession>,
    pub customer: CustomerDetails,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }

    pub fn has_live_session(&self) -> bool {
        self.status == OrderStatusType::AwaitingPayment && self.payment_token.is_some()
    }

    /// True if `transaction_id` belongs to a session this order has since replaced.
    pub fn replaced_transaction(&self, transaction_id: &str) -> bool {
        self.replaced_sessions.iter().any(|s| s.payment_id.as_deref() == Some(transaction_id))
    }

    /// When the current session took over from a replaced one, if it ever did.
    pub fn last_replacement(&self) -> Option<DateTime<Utc>> {
        self.replaced_sessions.last().map(|s| s.replaced_at)
    }
}

/// A payment session that was abandoned when the customer was handed a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacedSession {
    pub payment_id: Option<String>,
    pub token: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub replaced_at: DateTime<Utc>,
}

impl ReplacedSession {
    pub fn of(order: &Order, replaced_at: DateTime<Utc>) -> Self {
        Self {
            payment_id: order.payment_id.clone(),
            token: order.payment_token.clone(),
            created_at: order.session_created_at,
            replaced_at,
        }
    }
}

impl<'r> FromRow<'r, SqliteRow> for Order {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let items: Json<Vec<OrderItem>> = row.try_get("items")?;
        let customer: Json<CustomerDetails> = row.try_get("customer")?;
        let replaced_sessions: Json<Vec<ReplacedSession>> = row.try_get("replaced_sessions")?;
        let method: String = row.try_get("payment_method")?;
        let payment_method =
            method.parse::<PaymentMethod>().map_err(|e| sqlx::Error::ColumnDecode {
                index: "payment_method".into(),
                source: Box::new(e),
            })?;
        Ok(Self {
            id: row.try_get("id")?,
            order_id: row.try_get("order_id")?,
            user_id: row.try_get("user_id")?,
            items: items.0,
            shipping_fee: row.try_get("shipping_fee")?,
            total_price: row.try_get("total_price")?,
            currency: row.try_get("currency")?,
            status: row.try_get("status")?,
            payment_status: row.try_get("payment_status")?,
            payment_method,
            payment_id: row.try_get("payment_id")?,
            payment_token: row.try_get("payment_token")?,
            redirect_url: row.try_get("redirect_url")?,
            session_created_at: row.try_get("session_created_at")?,
            gateway_event: row.try_get("gateway_event")?,
            gateway_transaction_time: row.try_get("gateway_transaction_time")?,
            replaced_sessions: replaced_sessions.0,
            customer: customer.0,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub user_id: String,
    pub items: Vec<OrderItem>,
    pub shipping_fee: MinorUnits,
    /// Must equal the sum of the line totals plus the shipping fee.
    pub total_price: MinorUnits,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub customer: CustomerDetails,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    /// Cash on delivery orders skip the gateway and go straight to `Pending`.
    pub fn initial_status(&self) -> OrderStatusType {
        match self.payment_method {
            PaymentMethod::CashOnDelivery => OrderStatusType::Pending,
            PaymentMethod::Gateway(_) => OrderStatusType::AwaitingPayment,
        }
    }
}

//--------------------------------------      OrderUpdate      ---------------------------------------------------------
/// A partial update to an order. Fields that are `None` are left untouched. The nested options on the session fields
/// distinguish "leave alone" (`None`) from "clear" (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderUpdate {
    pub status: Option<OrderStatusType>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_id: Option<Option<String>>,
    pub payment_token: Option<Option<String>>,
    pub redirect_url: Option<Option<String>>,
    pub session_created_at: Option<DateTime<Utc>>,
    /// `Some(None)` forgets the last gateway event, along with its transaction time.
    pub gateway_event: Option<Option<GatewayEvent>>,
    pub gateway_transaction_time: Option<DateTime<Utc>>,
    pub replaced_sessions: Option<Vec<ReplacedSession>>,
}

impl OrderUpdate {
    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_payment_status(mut self, status: PaymentStatus) -> Self {
        self.payment_status = Some(status);
        self
    }

    pub fn with_payment_id<S: Into<String>>(mut self, payment_id: S) -> Self {
        self.payment_id = Some(Some(payment_id.into()));
        self
    }

    pub fn clear_payment_id(mut self) -> Self {
        self.payment_id = Some(None);
        self
    }

    pub fn with_session(mut self, token: String, redirect_url: String, created_at: DateTime<Utc>) -> Self {
        self.payment_token = Some(Some(token));
        self.redirect_url = Some(Some(redirect_url));
        self.session_created_at = Some(created_at);
        self
    }

    pub fn clear_session(mut self) -> Self {
        self.payment_token = Some(None);
        self.redirect_url = Some(None);
        self
    }

    pub fn with_gateway_event(mut self, event: GatewayEvent, transaction_time: Option<DateTime<Utc>>) -> Self {
        self.gateway_event = Some(Some(event));
        self.gateway_transaction_time = transaction_time;
        self
    }

    pub fn clear_gateway_event(mut self) -> Self {
        self.gateway_event = Some(None);
        self.gateway_transaction_time = None;
        self
    }

    pub fn with_replaced_sessions(mut self, sessions: Vec<ReplacedSession>) -> Self {
        self.replaced_sessions = Some(sessions);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() &&
            self.payment_status.is_none() &&
            self.payment_id.is_none() &&
            self.payment_token.is_none() &&
            self.redirect_url.is_none() &&
            self.session_created_at.is_none() &&
            self.gateway_event.is_none() &&
            self.gateway_transaction_time.is_none() &&
            self.replaced_sessions.is_none()
    }
}

//--------------------------------------        Product        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub product_id: String,
    pub name: String,
    pub category: Option<String>,
    pub price: MinorUnits,
    pub available: bool,
}

//--------------------------------------  NotificationRecord   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub order_id: OrderId,
    pub transaction_id: String,
    pub transaction_status: TransactionStatus,
    pub fraud_status: Option<FraudStatus>,
    pub transaction_time: Option<DateTime<Utc>>,
    pub outcome: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct NotificationRecord {
    pub id: i64,
    pub order_id: OrderId,
    pub transaction_id: String,
    pub transaction_status: String,
    /// Empty when the gateway sent no fraud status
    pub fraud_status: String,
    pub transaction_time: Option<DateTime<Utc>>,
    pub outcome: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------      AuditEntry       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEntry {
    pub actor: String,
    pub old_status: OrderStatusType,
    pub new_status: OrderStatusType,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AuditEntry {
    pub id: i64,
    pub order_id: OrderId,
    pub actor: String,
    pub old_status: OrderStatusType,
    pub new_status: OrderStatusType,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------         Role          ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A regular customer. Can only see and pay for their own orders.
    User,
    /// Can read any order.
    ReadAll,
    /// Can move orders through the manual transitions.
    Write,
    /// Can do everything, including overriding an order's status.
    SuperAdmin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::ReadAll => write!(f, "read_all"),
            Self::Write => write!(f, "write"),
            Self::SuperAdmin => write!(f, "super_admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "read_all" => Ok(Self::ReadAll),
            "write" => Ok(Self::Write),
            "super_admin" => Ok(Self::SuperAdmin),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub user_id: String,
    pub roles: Vec<Role>,
}

impl Requester {
    pub fn new<S: Into<String>>(user_id: S, roles: Vec<Role>) -> Self {
        Self { user_id: user_id.into(), roles }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_super_admin(&self) -> bool {
        self.has_role(Role::SuperAdmin)
    }

    /// Admins may act on orders they do not own.
    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Write) || self.is_super_admin()
    }

    pub fn can_read_all(&self) -> bool {
        self.has_role(Role::ReadAll) || self.is_admin()
    }
}
