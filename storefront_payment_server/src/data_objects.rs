use std::str::FromStr;

use serde::{Deserialize, Serialize};
use storefront_payment_engine::{
    db_types::{FraudStatus, OrderId, OrderStatusType, TransactionStatus},
    helpers::parse_gateway_time,
    payment_objects::GatewayNotification,
};

use crate::errors::ServerError;

/// The notification body as the gateway posts it. Everything is a string on the wire, and the gateway adds fields
/// over time, so unknown fields are ignored here and the values are only checked when converted into a
/// [`GatewayNotification`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub order_id: String,
    pub transaction_status: String,
    #[serde(default)]
    pub fraud_status: Option<String>,
    pub transaction_id: String,
    #[serde(default)]
    pub transaction_time: Option<String>,
}

impl TryFrom<WebhookPayload> for GatewayNotification {
    type Error = ServerError;

    fn try_from(value: WebhookPayload) -> Result<Self, Self::Error> {
        let order_id = OrderId::from_str(value.order_id.trim())
            .map_err(|e| ServerError::InvalidRequestBody(format!("Invalid order id. {e}")))?;
        let transaction_id = value.transaction_id.trim().to_string();
        if transaction_id.is_empty() {
            return Err(ServerError::InvalidRequestBody("Missing transaction id".into()));
        }
        let transaction_status = TransactionStatus::from_str(value.transaction_status.trim())
            .map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
        // A fraud `deny` only ever accompanies a `deny` transaction status, which already says everything
        let fraud_status = match value.fraud_status.as_deref().map(str::trim) {
            None | Some("") | Some("deny") => None,
            Some(s) => Some(FraudStatus::from_str(s).map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?),
        };
        let transaction_time = match value.transaction_time.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(t) => Some(
                parse_gateway_time(t)
                    .ok_or_else(|| ServerError::InvalidRequestBody(format!("Invalid transaction time: {t}")))?,
            ),
        };
        Ok(GatewayNotification { order_id, transaction_id, transaction_status, fraud_status, transaction_time })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryPaymentParams {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatusType,
    #[serde(default)]
    pub reason: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;

    fn payload(json: &str) -> WebhookPayload {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn webhook_payloads() {
        let p = payload(
            r#"{
            "order_id": "ORD-20240301-00000000000000aa",
            "transaction_status": "capture",
            "fraud_status": "challenge",
            "transaction_id": "tx-1",
            "transaction_time": "2024-03-01 10:00:00",
            "status_code": "200",
            "payment_type": "credit_card"
        }"#,
        );
        let n = GatewayNotification::try_from(p).unwrap();
        assert_eq!(n.order_id.as_str(), "ORD-20240301-00000000000000aa");
        assert_eq!(n.transaction_status, TransactionStatus::Capture);
        assert_eq!(n.fraud_status, Some(FraudStatus::Challenge));
        assert!(n.transaction_time.is_some());

        let p = payload(r#"{"order_id": "ORD-1", "transaction_status": "deny", "fraud_status": "deny", "transaction_id": "tx-2"}"#);
        let n = GatewayNotification::try_from(p).unwrap();
        assert_eq!(n.transaction_status, TransactionStatus::Deny);
        assert!(n.fraud_status.is_none());
        assert!(n.transaction_time.is_none());
    }

    #[test]
    fn invalid_webhook_payloads() {
        let cases = [
            r#"{"order_id": "ORD-1", "transaction_status": "refund", "transaction_id": "tx-1"}"#,
            r#"{"order_id": "ORD-1", "transaction_status": "settlement", "fraud_status": "maybe", "transaction_id": "tx-1"}"#,
            r#"{"order_id": "ORD-1", "transaction_status": "settlement", "transaction_id": "  "}"#,
            r#"{"order_id": "ORD-1", "transaction_status": "settlement", "transaction_id": "tx-1", "transaction_time": "soon"}"#,
        ];
        for case in cases {
            let err = GatewayNotification::try_from(payload(case)).unwrap_err();
            assert!(matches!(err, ServerError::InvalidRequestBody(_)), "{case}");
        }
    }

    #[test]
    fn status_update_request() {
        let req: StatusUpdateRequest = serde_json::from_str(r#"{"status": "shipped"}"#).unwrap();
        assert_eq!(req.status, OrderStatusType::Shipped);
        assert!(req.reason.is_none());
        assert!(serde_json::from_str::<StatusUpdateRequest>(r#"{"status": "lost"}"#).is_err());
    }
}
