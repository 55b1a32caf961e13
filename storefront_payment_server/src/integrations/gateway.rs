//! Adapter between the payment engine's [`PaymentGateway`] trait and the gateway REST client.
//!
//! The engine speaks in domain types ([`SessionRequest`], [`GatewayTransactionStatus`]); `gateway_tools` speaks the
//! wire format. Everything that is lost or reinterpreted in translation happens here:
//! * `authorize` (card pre-authorisation) is reported to the engine as `pending`, since no money has moved yet.
//! * Refunds are not part of the order payment lifecycle and are reported as a protocol error.
//! * A fraud `deny` always comes with a `deny` transaction status, so the fraud status is dropped.
use gateway_tools::{
    data_objects::{
        AddressDetails,
        Callbacks,
        CustomerDetails as WireCustomer,
        ItemDetails,
        SnapTransactionRequest,
        TransactionDetails,
        TransactionStatusResponse,
        WireFraudStatus,
        WireTransactionStatus,
    },
    helpers::{parse_gross_amount, truncate_item_name},
    GatewayApi,
    GatewayApiError,
    GatewayConfig,
};
use log::*;
use storefront_payment_engine::{
    db_types::{CustomerDetails, FraudStatus, TransactionStatus},
    helpers::parse_gateway_time,
    session_objects::SessionRequest,
    traits::{GatewayError, GatewaySession, GatewayTransactionStatus, PaymentGateway},
};

/// The one gateway client of the server. It is built once at startup from static configuration and shared by all
/// workers.
#[derive(Clone)]
pub struct GatewayClient {
    api: GatewayApi,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayApiError> {
        let api = GatewayApi::new(config)?;
        Ok(Self { api })
    }
}

impl PaymentGateway for GatewayClient {
    async fn create_session(&self, request: &SessionRequest) -> Result<GatewaySession, GatewayError> {
        let wire = snap_request(request);
        let response = self.api.create_transaction(&wire).await.map_err(gateway_error)?;
        Ok(GatewaySession {
            token: response.token,
            redirect_url: response.redirect_url,
            transaction_id: response.transaction_id,
            gross_amount: request.gross_amount,
        })
    }

    async fn query_status(&self, transaction_id: &str) -> Result<Option<GatewayTransactionStatus>, GatewayError> {
        match self.api.transaction_status(transaction_id).await.map_err(gateway_error)? {
            Some(response) => transaction_status(transaction_id, response).map(Some),
            None => Ok(None),
        }
    }
}

pub fn snap_request(request: &SessionRequest) -> SnapTransactionRequest {
    let item_details = request
        .items
        .iter()
        .map(|item| ItemDetails {
            id: item.id.clone(),
            price: item.price.value(),
            quantity: item.quantity,
            name: truncate_item_name(&item.name),
            category: item.category.clone(),
        })
        .collect();
    let callbacks = request.callbacks.as_ref().map(|c| Callbacks {
        finish: c.finish.clone(),
        error: c.error.clone(),
        pending: c.pending.clone(),
    });
    SnapTransactionRequest {
        transaction_details: TransactionDetails {
            order_id: request.order_id.to_string(),
            gross_amount: request.gross_amount.value(),
        },
        item_details,
        customer_details: Some(customer_details(&request.customer)),
        callbacks,
    }
}

fn customer_details(customer: &CustomerDetails) -> WireCustomer {
    let shipping_address = customer.shipping_address.as_ref().map(|a| AddressDetails {
        first_name: a.first_name.clone(),
        last_name: a.last_name.clone(),
        phone: a.phone.clone(),
        address: a.address.clone(),
        city: a.city.clone(),
        postal_code: a.postal_code.clone(),
        country_code: a.country_code.clone(),
    });
    WireCustomer {
        first_name: customer.first_name.clone(),
        last_name: customer.last_name.clone(),
        email: customer.email.clone(),
        phone: customer.phone.clone(),
        shipping_address,
    }
}

pub fn transaction_status(
    transaction_id: &str,
    response: TransactionStatusResponse,
) -> Result<GatewayTransactionStatus, GatewayError> {
    let wire_status = response.transaction_status.ok_or_else(|| {
        GatewayError::Protocol(format!("No transaction status for {transaction_id} (code {})", response.status_code))
    })?;
    let status = match wire_status {
        WireTransactionStatus::Authorize | WireTransactionStatus::Pending => TransactionStatus::Pending,
        WireTransactionStatus::Capture => TransactionStatus::Capture,
        WireTransactionStatus::Settlement => TransactionStatus::Settlement,
        WireTransactionStatus::Deny => TransactionStatus::Deny,
        WireTransactionStatus::Cancel => TransactionStatus::Cancel,
        WireTransactionStatus::Expire => TransactionStatus::Expire,
        WireTransactionStatus::Failure => TransactionStatus::Failure,
        WireTransactionStatus::Refund | WireTransactionStatus::PartialRefund => {
            warn!("💳️ Transaction {transaction_id} has been refunded at the gateway. This needs manual handling.");
            return Err(GatewayError::Protocol(format!("Transaction {transaction_id} has been refunded")));
        },
    };
    let fraud_status = match response.fraud_status {
        Some(WireFraudStatus::Accept) => Some(FraudStatus::Accept),
        Some(WireFraudStatus::Challenge) => Some(FraudStatus::Challenge),
        Some(WireFraudStatus::Deny) | None => None,
    };
    let transaction_time = response.transaction_time.as_deref().and_then(|t| {
        let parsed = parse_gateway_time(t);
        if parsed.is_none() {
            warn!("💳️ Could not parse transaction time '{t}' for {transaction_id}");
        }
        parsed
    });
    let gross_amount = response
        .gross_amount
        .as_deref()
        .map(parse_gross_amount)
        .transpose()
        .map_err(|e| GatewayError::Protocol(e.to_string()))?;
    Ok(GatewayTransactionStatus {
        transaction_id: response.transaction_id.unwrap_or_else(|| transaction_id.to_string()),
        status,
        fraud_status,
        transaction_time,
        gross_amount,
    })
}

fn gateway_error(e: GatewayApiError) -> GatewayError {
    match e {
        GatewayApiError::Timeout => GatewayError::Timeout,
        GatewayApiError::Initialization(s) | GatewayApiError::RestRequestError(s) => GatewayError::Transport(s),
        GatewayApiError::QueryError { status, message } => GatewayError::Rejected { status, message },
        e @ (GatewayApiError::RestResponseError(_) |
        GatewayApiError::JsonError(_) |
        GatewayApiError::InvalidCurrencyAmount(_)) => GatewayError::Protocol(e.to_string()),
    }
}

#[cfg(test)]
mod test {
    use storefront_payment_engine::{
        db_types::{MinorUnits, OrderId, ShippingAddress},
        session_objects::{SessionCallbacks, SessionItem},
    };

    use super::*;

    fn wire_status(status: &str, fraud: Option<&str>, gross: Option<&str>) -> TransactionStatusResponse {
        let body = serde_json::json!({
            "status_code": "200",
            "transaction_id": "tx-1",
            "order_id": "ORD-20240301-00000000000000aa",
            "transaction_status": status,
            "fraud_status": fraud,
            "gross_amount": gross,
            "transaction_time": "2024-03-01 10:00:00",
        });
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn wire_statuses_map_to_domain() {
        let status = transaction_status("tx-1", wire_status("settlement", None, Some("100000.00"))).unwrap();
        assert_eq!(status.status, TransactionStatus::Settlement);
        assert_eq!(status.gross_amount, Some(MinorUnits::from(100_000)));
        assert!(status.transaction_time.is_some());

        let status = transaction_status("tx-1", wire_status("authorize", Some("accept"), None)).unwrap();
        assert_eq!(status.status, TransactionStatus::Pending);
        assert_eq!(status.fraud_status, Some(FraudStatus::Accept));

        let status = transaction_status("tx-1", wire_status("deny", Some("deny"), None)).unwrap();
        assert_eq!(status.status, TransactionStatus::Deny);
        assert!(status.fraud_status.is_none());

        let err = transaction_status("tx-1", wire_status("refund", None, None)).unwrap_err();
        assert!(matches!(err, GatewayError::Protocol(_)));
        let err = transaction_status("tx-1", wire_status("capture", None, Some("10.50"))).unwrap_err();
        assert!(matches!(err, GatewayError::Protocol(_)));
    }

    #[test]
    fn session_requests() {
        let request = SessionRequest {
            order_id: OrderId::from("ORD-20240301-00000000000000aa"),
            gross_amount: MinorUnits::from(100_000),
            items: vec![
                SessionItem {
                    id: "batik".into(),
                    name: "Kemeja Batik Tulis Lengan Panjang Motif Parang Rusak Premium".into(),
                    category: Some("apparel".into()),
                    price: MinorUnits::from(33_333),
                    quantity: 3,
                },
                SessionItem {
                    id: "shipping".into(),
                    name: "Shipping".into(),
                    category: None,
                    price: MinorUnits::from(1),
                    quantity: 1,
                },
            ],
            customer: CustomerDetails {
                first_name: "Siti".into(),
                email: "siti@example.com".into(),
                shipping_address: Some(ShippingAddress {
                    first_name: "Siti".into(),
                    address: "Jl. Merdeka 1".into(),
                    city: "Bandung".into(),
                    postal_code: "40111".into(),
                    country_code: "IDN".into(),
                    ..Default::default()
                }),
                ..Default::default()
            },
            callbacks: Some(SessionCallbacks {
                finish: "https://shop.example.com/finish".into(),
                error: "https://shop.example.com/error".into(),
                pending: "https://shop.example.com/pending".into(),
            }),
        };
        let wire = snap_request(&request);
        assert_eq!(wire.transaction_details.order_id, "ORD-20240301-00000000000000aa");
        assert_eq!(wire.transaction_details.gross_amount, 100_000);
        assert_eq!(wire.item_details[0].name.chars().count(), 50);
        let sum = wire.item_details.iter().map(|i| i.price * i.quantity).sum::<i64>();
        assert_eq!(sum, wire.transaction_details.gross_amount);
        let customer = wire.customer_details.unwrap();
        assert_eq!(customer.shipping_address.map(|a| a.city), Some("Bandung".to_string()));
        assert_eq!(wire.callbacks.map(|c| c.pending), Some("https://shop.example.com/pending".to_string()));
    }

    #[test]
    fn client_errors() {
        assert!(matches!(gateway_error(GatewayApiError::Timeout), GatewayError::Timeout));
        let rejected = gateway_error(GatewayApiError::QueryError { status: 503, message: "busy".into() });
        assert!(rejected.is_retryable());
        let rejected = gateway_error(GatewayApiError::QueryError { status: 401, message: "bad key".into() });
        assert!(!rejected.is_retryable());
        assert!(matches!(gateway_error(GatewayApiError::JsonError("eof".into())), GatewayError::Protocol(_)));
    }
}
