use chrono::{DateTime, Utc};
use rand::RngCore;

use crate::db_types::OrderId;

/// Mints a fresh order id of the form `ORD-<yyyymmdd>-<16 hex digits>`.
///
/// The id is also the order id the gateway sees, so it is minted exactly once per order, at checkout.
pub fn new_order_id(now: DateTime<Utc>) -> OrderId {
    let mut rng = rand::thread_rng();
    let suffix = rng.next_u64();
    OrderId(format!("ORD-{}-{suffix:016x}", now.format("%Y%m%d")))
}
