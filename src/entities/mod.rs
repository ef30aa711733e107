//! sea-orm entities for the catalog, the order ledger and the two quantity
//! ledgers (receipts and shipping plans).

pub mod item;
pub mod order;
pub mod order_line;
pub mod receipt;
pub mod shipping_plan;

pub use order::{OrderKind, OrderStatus};
pub use shipping_plan::ShippingPlanStatus;
