mod order_ids;
mod timestamps;

pub use order_ids::new_order_id;
pub use timestamps::parse_gateway_time;
