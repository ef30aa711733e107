//! Order and shipping-plan state machines.
//!
//! ```text
//! pending -> approved -> in_production -> received_complete -> shipped_complete
//!    \
//!     -> rejected
//! ```
//!
//! Every status write in the services goes through [`ensure_transition`], so
//! no call site can skip a state or move one backwards.

use crate::entities::{OrderStatus, ShippingPlanStatus};
use crate::errors::ServiceError;

impl OrderStatus {
    /// Whether `self -> next` is one of the legal forward transitions.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Approved, InProduction)
                | (InProduction, ReceivedComplete)
                | (ReceivedComplete, ShippedComplete)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Rejected | OrderStatus::ShippedComplete)
    }

    /// Receipts may only be registered while production is open.
    pub fn accepts_receipts(self) -> bool {
        matches!(self, OrderStatus::Approved | OrderStatus::InProduction)
    }
}

impl ShippingPlanStatus {
    pub fn can_advance_to(self, next: ShippingPlanStatus) -> bool {
        use ShippingPlanStatus::*;
        matches!((self, next), (Planned, Instructed) | (Instructed, Completed))
    }

    /// Plans in these states hold quantity that is committed but not shipped.
    pub fn is_open(self) -> bool {
        matches!(
            self,
            ShippingPlanStatus::Planned | ShippingPlanStatus::Instructed
        )
    }
}

/// Rejects any order status change that is not a legal single step.
pub fn ensure_transition(
    order_no: &str,
    from: OrderStatus,
    to: OrderStatus,
) -> Result<(), ServiceError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(ServiceError::invalid_status(format!(
            "Order {} cannot move from '{}' to '{}'",
            order_no, from, to
        )))
    }
}

/// Rejects any shipping plan status change that is not a legal single step.
pub fn ensure_plan_transition(
    plan_id: i32,
    from: ShippingPlanStatus,
    to: ShippingPlanStatus,
) -> Result<(), ServiceError> {
    if from.can_advance_to(to) {
        Ok(())
    } else {
        Err(ServiceError::invalid_status(format!(
            "Shipping plan {} cannot move from '{}' to '{}'",
            plan_id, from, to
        )))
    }
}

/// Status after a receipt batch has been applied to an order that was in
/// `current`, given whether every line is now fully received.
///
/// Returns the chain of statuses passed through, excluding `current`.
pub fn status_after_receipts(current: OrderStatus, fully_received: bool) -> Vec<OrderStatus> {
    let mut path = Vec::new();
    let mut status = current;
    if status == OrderStatus::Approved {
        status = OrderStatus::InProduction;
        path.push(status);
    }
    if status == OrderStatus::InProduction && fully_received {
        path.push(OrderStatus::ReceivedComplete);
    }
    path
}
