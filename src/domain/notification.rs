use super::ids::{MachineId, OrderId, UserId};
use rust_decimal::Decimal;
use serde::Serialize;

/// Something a user or technician should hear about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Notification {
    OrderPlaced {
        user: UserId,
        order: OrderId,
        amount: Decimal,
    },
    OrderCompleted {
        user: UserId,
        order: OrderId,
        amount: Decimal,
    },
    OrderFailed {
        user: UserId,
        order: OrderId,
        reason: String,
    },
    OrderCanceled {
        user: UserId,
        order: OrderId,
    },
    CodeIssued {
        user: UserId,
        order: OrderId,
        code: String,
        amount: Decimal,
    },
    PaymentOutstanding {
        user: UserId,
        order: OrderId,
        amount: Decimal,
    },
    RefundRequired {
        user: UserId,
        order: OrderId,
        amount: Decimal,
    },
    LowStock {
        machine: MachineId,
        lane: u8,
        level: u32,
    },
}

impl Notification {
    pub fn order(&self) -> Option<OrderId> {
        match self {
            Self::OrderPlaced { order, .. }
            | Self::OrderCompleted { order, .. }
            | Self::OrderFailed { order, .. }
            | Self::OrderCanceled { order, .. }
            | Self::CodeIssued { order, .. }
            | Self::PaymentOutstanding { order, .. }
            | Self::RefundRequired { order, .. } => Some(*order),
            Self::LowStock { .. } => None,
        }
    }
}
