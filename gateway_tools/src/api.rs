use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Client,
    Method,
    StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::GatewayConfig,
    data_objects::{SnapTransactionRequest, SnapTransactionResponse, TransactionStatusResponse},
    GatewayApiError,
};

/// A thin client over the gateway REST API.
///
/// The client is cheap to clone and is intended to be created once and shared. It holds no per-request state.
#[derive(Clone)]
pub struct GatewayApi {
    config: GatewayConfig,
    client: Arc<Client>,
}

impl GatewayApi {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayApiError> {
        let mut headers = HeaderMap::with_capacity(3);
        // The server key is the basic auth user name, with an empty password.
        let credentials = base64::encode(format!("{}:", config.server_key.reveal()));
        let mut auth = HeaderValue::from_str(&format!("Basic {credentials}"))
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        url: String,
        body: Option<&B>,
    ) -> Result<(StatusCode, T), GatewayApiError> {
        trace!("💳️ Sending {method} {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(body);
        }
        let response = req.send().await.map_err(GatewayApiError::from_reqwest)?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            trace!("💳️ Gateway replied with {status}");
            let result = response.json::<T>().await.map_err(GatewayApiError::from_reqwest)?;
            Ok((status, result))
        } else {
            let message = response.text().await.map_err(GatewayApiError::from_reqwest)?;
            Err(GatewayApiError::QueryError { status: status.as_u16(), message })
        }
    }

    /// Opens a hosted payment session. The `order_id` in the request doubles as the gateway's idempotency key, so
    /// re-submitting an order id that already has a live transaction is rejected by the gateway.
    pub async fn create_transaction(
        &self,
        request: &SnapTransactionRequest,
    ) -> Result<SnapTransactionResponse, GatewayApiError> {
        let url = format!("{}/snap/v1/transactions", self.config.snap_url);
        let order_id = &request.transaction_details.order_id;
        debug!("💳️ Creating payment session for order {order_id}");
        let (status, response) = self.rest_query::<SnapTransactionResponse, _>(Method::POST, url, Some(request)).await?;
        if status == StatusCode::NOT_FOUND {
            return Err(GatewayApiError::QueryError { status: 404, message: "Session endpoint not found".into() });
        }
        info!("💳️ Payment session created for order {order_id}");
        Ok(response)
    }

    /// Fetches the current status of a transaction. Returns `None` if the gateway has no record of it, which is the
    /// case for a session whose payment page was opened but never submitted.
    pub async fn transaction_status(&self, id: &str) -> Result<Option<TransactionStatusResponse>, GatewayApiError> {
        let url = format!("{}/v2/{id}/status", self.config.api_url);
        debug!("💳️ Fetching transaction status for {id}");
        let (status, response) = self.rest_query::<TransactionStatusResponse, ()>(Method::GET, url, None).await?;
        if status == StatusCode::NOT_FOUND || response.is_not_found() {
            debug!("💳️ The gateway has no transaction for {id}");
            return Ok(None);
        }
        Ok(Some(response))
    }
}
