use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;

use crate::{
    amount_adjuster::AmountAdjuster,
    db_types::{
        GatewayEvent,
        MinorUnits,
        NewOrder,
        Order,
        OrderId,
        OrderItem,
        OrderStatusType,
        OrderUpdate,
        ReplacedSession,
        Requester,
    },
    helpers::new_order_id,
    order_objects::{CheckoutRequest, CheckoutResult},
    payment_objects::{PaymentSessionResult, SessionSource},
    session_objects::{PaymentSessionOptions, SessionRequest},
    traits::{GatewaySession, PaymentGateway, PaymentGatewayDatabase},
    OrderFlowError,
};

/// `PaymentSessionApi` owns everything that opens a payment session with the gateway: checkout, and payment retries.
///
/// The order id minted at checkout is the gateway's order id for the lifetime of the order. Retries reuse it, so the
/// gateway can recognise a repeated session request for the same order.
pub struct PaymentSessionApi<B, G> {
    db: B,
    gateway: G,
    adjuster: AmountAdjuster,
    options: PaymentSessionOptions,
}

impl<B, G> Debug for PaymentSessionApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentSessionApi ({:?})", self.options)
    }
}

impl<B, G> PaymentSessionApi<B, G> {
    pub fn new(db: B, gateway: G, options: PaymentSessionOptions) -> Self {
        let adjuster = AmountAdjuster::new(options.amount_tolerance);
        Self { db, gateway, adjuster, options }
    }

    pub fn options(&self) -> &PaymentSessionOptions {
        &self.options
    }
}

/// What to do with an order's existing session when the customer asks to pay again.
enum RetryDecision {
    Reuse,
    Replace,
}

impl<B, G> PaymentSessionApi<B, G>
where
    B: PaymentGatewayDatabase,
    G: PaymentGateway,
{
    /// Creates an order from the customer's basket and, for gateway orders, opens the first payment session.
    ///
    /// Prices are always taken from the catalog. If the gateway cannot open a session, the order is kept in
    /// `awaiting_payment` without a token and the gateway error is returned. The customer can then retry the payment.
    pub async fn checkout(&self, request: CheckoutRequest, requester: &Requester) -> Result<CheckoutResult, OrderFlowError> {
        let now = Utc::now();
        let new_order = self.build_order(request, requester, now).await?;
        let order = self.db.insert_order(new_order).await?;
        info!(
            "💳️ Order {} created for {} ({} {}, {})",
            order.order_id, order.user_id, order.total_price, order.currency, order.payment_method
        );
        if !order.payment_method.uses_gateway() {
            return Ok(CheckoutResult { order, session: None });
        }
        let (_, session, order) = self.open_session(&order, now).await.map_err(|e| {
            warn!("💳️ Could not open a payment session for new order {}. {e}", order.order_id);
            e
        })?;
        Ok(CheckoutResult { order, session: Some(session) })
    }

    /// Hands the customer a payment session for an unpaid order, reusing the existing one if it is still live.
    ///
    /// `force` (admins only) skips the liveness check and always opens a new session, but an order the gateway says is
    /// already paid is never given a new session.
    pub async fn retry_payment(
        &self,
        order_id: &OrderId,
        requester: &Requester,
        force: bool,
    ) -> Result<PaymentSessionResult, OrderFlowError> {
        self.retry_payment_at(order_id, requester, force, Utc::now()).await
    }

    /// [`Self::retry_payment`], with the current time supplied by the caller.
    pub async fn retry_payment_at(
        &self,
        order_id: &OrderId,
        requester: &Requester,
        force: bool,
        now: DateTime<Utc>,
    ) -> Result<PaymentSessionResult, OrderFlowError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| OrderFlowError::NotFound(order_id.clone()))?;
        if !order.is_owned_by(&requester.user_id) && !requester.is_admin() {
            return Err(OrderFlowError::AuthorizationError(format!(
                "{} may not pay for order {order_id}",
                requester.user_id
            )));
        }
        if force && !requester.is_admin() {
            return Err(OrderFlowError::AuthorizationError("Only admins can force a new payment session".into()));
        }
        if !order.payment_method.uses_gateway() {
            return Err(OrderFlowError::ValidationError(format!(
                "Order {order_id} is paid cash on delivery and has no payment session"
            )));
        }
        if order.status != OrderStatusType::AwaitingPayment {
            return Err(OrderFlowError::state_conflict(
                order_id,
                order.status,
                "Only orders awaiting payment can be paid.",
            ));
        }
        let decision = match &order.payment_token {
            None => {
                debug!("🔁️ Order {order_id} has no payment session yet");
                RetryDecision::Replace
            },
            Some(_) => self.assess_existing_session(&order, force, now).await?,
        };
        match decision {
            RetryDecision::Reuse => {
                info!("🔁️ Reusing the existing payment session for order {order_id}");
                let session = session_of(&order).ok_or_else(|| {
                    OrderFlowError::state_conflict(order_id, order.status, "The order's payment session has gone.")
                })?;
                Ok(PaymentSessionResult { source: SessionSource::Reused, session, order })
            },
            RetryDecision::Replace => {
                info!("🔁️ Opening a new payment session for order {order_id}");
                let (source, session, order) = self.open_session(&order, now).await?;
                Ok(PaymentSessionResult { source, session, order })
            },
        }
    }

    async fn assess_existing_session(
        &self,
        order: &Order,
        force: bool,
        now: DateTime<Utc>,
    ) -> Result<RetryDecision, OrderFlowError> {
        let order_id = &order.order_id;
        // Until a notification tells us the transaction id, the gateway knows the transaction by our order id
        let transaction_id = order.payment_id.as_deref().unwrap_or(order_id.as_str());
        let status = self.gateway.query_status(transaction_id).await?;
        let started_at = match &status {
            Some(s) => {
                match GatewayEvent::from_statuses(s.status, s.fraud_status) {
                    GatewayEvent::Accepted => {
                        warn!(
                            "🔁️ The gateway says order {order_id} is paid ({}), but we have not heard about it yet",
                            s.status
                        );
                        return Err(OrderFlowError::AlreadyPaid(order_id.clone()));
                    },
                    GatewayEvent::Challenged => {
                        return Err(OrderFlowError::state_conflict(
                            order_id,
                            order.status,
                            "The payment is being held for fraud review.",
                        ));
                    },
                    GatewayEvent::Failed => {
                        debug!("🔁️ The previous transaction for order {order_id} ended with {}", s.status);
                        return Ok(RetryDecision::Replace);
                    },
                    GatewayEvent::Pending => {},
                }
                s.transaction_time.or(order.session_created_at)
            },
            None => order.session_created_at,
        };
        if force {
            info!("🔁️ A new payment session for order {order_id} is being forced");
            return Ok(RetryDecision::Replace);
        }
        let decision = match started_at {
            Some(t) if is_live(now - t, self.options.stale_after) => RetryDecision::Reuse,
            Some(t) => {
                debug!("🔁️ The session for order {order_id} started at {t} and is stale");
                RetryDecision::Replace
            },
            None => RetryDecision::Replace,
        };
        Ok(decision)
    }

    /// Opens a session with the gateway and stores it on the order.
    ///
    /// If another writer got to the order first, the order is re-read. When it is still awaiting payment with a
    /// session, that session is handed back instead.
    async fn open_session(
        &self,
        order: &Order,
        now: DateTime<Utc>,
    ) -> Result<(SessionSource, GatewaySession, Order), OrderFlowError> {
        let request = SessionRequest::for_order(order, &self.adjuster, self.options.callbacks.clone())?;
        let session = self.gateway.create_session(&request).await?;
        debug!("💳️ Gateway opened session for order {} with token {}", order.order_id, session.token);
        let mut update = OrderUpdate::default().with_session(session.token.clone(), session.redirect_url.clone(), now);
        if order.payment_token.is_some() || order.payment_id.is_some() {
            // Whatever the gateway said about the old transaction no longer describes this order
            debug!("💳️ Session {:?} for order {} is replaced", order.payment_token, order.order_id);
            let mut replaced = order.replaced_sessions.clone();
            replaced.push(ReplacedSession::of(order, now));
            update = update.with_replaced_sessions(replaced).clear_gateway_event().clear_payment_id();
        }
        if let Some(transaction_id) = &session.transaction_id {
            update = update.with_payment_id(transaction_id.clone());
        }
        if let Some(updated) = self.db.update_order(&order.order_id, order.version, update, None).await? {
            return Ok((SessionSource::Created, session, updated));
        }
        warn!("💳️ Order {} changed while its payment session was being opened", order.order_id);
        let current = self
            .db
            .fetch_order_by_order_id(&order.order_id)
            .await?
            .ok_or_else(|| OrderFlowError::NotFound(order.order_id.clone()))?;
        match session_of(&current) {
            Some(theirs) if current.status == OrderStatusType::AwaitingPayment => {
                Ok((SessionSource::Reused, theirs, current))
            },
            _ => Err(OrderFlowError::state_conflict(
                &current.order_id,
                current.status,
                "The order changed while its payment session was being opened.",
            )),
        }
    }

    async fn build_order(
        &self,
        request: CheckoutRequest,
        requester: &Requester,
        now: DateTime<Utc>,
    ) -> Result<NewOrder, OrderFlowError> {
        if request.items.is_empty() {
            return Err(OrderFlowError::ValidationError("An order needs at least one item".into()));
        }
        if request.shipping_fee.value() < 0 {
            return Err(OrderFlowError::ValidationError("The shipping fee cannot be negative".into()));
        }
        let mut items = Vec::with_capacity(request.items.len());
        let mut total = request.shipping_fee;
        for item in request.items {
            if item.quantity <= 0 {
                return Err(OrderFlowError::ValidationError(format!(
                    "Quantity for {} must be positive",
                    item.product_id
                )));
            }
            let product = self
                .db
                .fetch_product(&item.product_id)
                .await?
                .ok_or_else(|| OrderFlowError::ValidationError(format!("Product {} does not exist", item.product_id)))?;
            if !product.available {
                return Err(OrderFlowError::ValidationError(format!("{} is not available", product.name)));
            }
            let line = OrderItem {
                product_id: product.product_id,
                name: product.name,
                category: product.category,
                quantity: item.quantity,
                unit_price: product.price,
                selected_color: item.selected_color,
                selected_size: item.selected_size,
            };
            total = line
                .line_total()
                .and_then(|t| total.checked_add(t))
                .ok_or_else(|| OrderFlowError::ValidationError("The order total is too large".into()))?;
            items.push(line);
        }
        if total <= MinorUnits::from(0) {
            return Err(OrderFlowError::ValidationError("The order total must be positive".into()));
        }
        Ok(NewOrder {
            order_id: new_order_id(now),
            user_id: requester.user_id.clone(),
            items,
            shipping_fee: request.shipping_fee,
            total_price: total,
            currency: self.options.currency.clone(),
            payment_method: request.payment_method,
            customer: request.customer,
            created_at: now,
        })
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

fn is_live(age: Duration, stale_after: Duration) -> bool {
    age < stale_after
}

/// The session stored on the order, if it has one.
fn session_of(order: &Order) -> Option<GatewaySession> {
    let token = order.payment_token.clone()?;
    Some(GatewaySession {
        token,
        redirect_url: order.redirect_url.clone().unwrap_or_default(),
        transaction_id: order.payment_id.clone(),
        gross_amount: order.total_price,
    })
}
