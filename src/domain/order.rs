use super::ids::{MachineId, OrderId, ProductId, UserId};
use super::money::Amount;
use super::ports::Record;
use crate::error::VendingError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Wallet,
    Code,
    Card,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Canceled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
        };
        f.write_str(name)
    }
}

/// Inputs that drive the order state machine.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum OrderEvent {
    PaymentConfirmed,
    DispenseSucceeded,
    DispenseFailed,
    CodeExpired,
    Canceled,
}

/// Work the engine performs after a transition has been committed.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Effect {
    /// Collect a deferred wallet charge.
    Charge,
    /// Return reserved quantities to product stock.
    Restock,
    /// Give a collected wallet charge back.
    Refund,
    ReleaseMachine,
    Notify,
}

/// Outcome of feeding an event to the state machine.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Transition {
    Applied {
        from: OrderStatus,
        to: OrderStatus,
        effects: &'static [Effect],
    },
    /// The order already reached the state this event leads to.
    AlreadyApplied(OrderStatus),
}

/// The full transition table. Pairs not listed here are rejected.
pub fn transition(state: OrderStatus, event: OrderEvent) -> Result<Transition, VendingError> {
    use Effect::*;
    use OrderEvent as E;
    use OrderStatus as S;

    let applied = |to: OrderStatus, effects: &'static [Effect]| -> Result<Transition, VendingError> {
        Ok(Transition::Applied {
            from: state,
            to,
            effects,
        })
    };

    match (state, event) {
        (S::Pending, E::PaymentConfirmed) => applied(S::Processing, &[Notify]),
        (S::Pending, E::CodeExpired | E::Canceled) => applied(S::Canceled, &[Restock, Notify]),
        (S::Processing, E::DispenseSucceeded) => applied(S::Completed, &[Charge, ReleaseMachine, Notify]),
        (S::Processing, E::DispenseFailed) => {
            applied(S::Failed, &[Restock, Refund, ReleaseMachine, Notify])
        }
        (S::Processing, E::PaymentConfirmed)
        | (S::Completed, E::DispenseSucceeded)
        | (S::Failed, E::DispenseFailed)
        | (S::Canceled, E::CodeExpired | E::Canceled) => Ok(Transition::AlreadyApplied(state)),
        (state, event) => Err(VendingError::InvalidState(format!(
            "cannot apply {event:?} to an order in {state}"
        ))),
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CodeStatus {
    Active,
    Used,
    Expired,
    Canceled,
}

/// Where the order stands with respect to collecting its payment.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChargeState {
    Uncharged,
    Charged { at: DateTime<Utc> },
    Refunded { at: DateTime<Utc> },
    /// The goods were delivered but the wallet could not be charged.
    Outstanding,
}

/// One ordered product. Price and quantity are frozen at creation; only
/// the lane assignment is filled in later.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product: ProductId,
    pub quantity: u32,
    pub unit_price: Amount,
    pub lane: Option<u8>,
}

impl LineItem {
    pub fn subtotal(&self) -> Decimal {
        self.unit_price.value() * Decimal::from(self.quantity)
    }
}

/// What the hardware is told to push out of one lane, and what it reported back.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LaneInstruction {
    pub lane: u8,
    pub product: ProductId,
    pub quantity: u32,
    pub detected: u32,
}

impl LaneInstruction {
    pub fn is_satisfied(&self) -> bool {
        self.detected >= self.quantity
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DispensingStatus {
    pub all_products_detected: bool,
    pub dispensed_at: Option<DateTime<Utc>>,
    pub is_dispensing_in_progress: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user: UserId,
    pub items: Vec<LineItem>,
    pub total_amount: Amount,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub charge: ChargeState,
    pub code_status: Option<CodeStatus>,
    pub machine: Option<MachineId>,
    pub dispensing_in_progress: bool,
    pub dispatch: Vec<LaneInstruction>,
    pub dispensed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub failure_details: Option<serde_json::Value>,
    pub hardware_details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl Order {
    /// Builds a `Pending` order. The total is computed here and never recomputed.
    pub fn new(
        user: UserId,
        items: Vec<LineItem>,
        payment_method: PaymentMethod,
        machine: Option<MachineId>,
        now: DateTime<Utc>,
    ) -> Result<Self, VendingError> {
        if items.is_empty() {
            return Err(VendingError::ValidationError(
                "An order needs at least one line item".to_string(),
            ));
        }
        if items.iter().any(|item| item.quantity == 0) {
            return Err(VendingError::ValidationError(
                "Line item quantity must be at least 1".to_string(),
            ));
        }
        let total_amount = Amount::new(items.iter().map(LineItem::subtotal).sum())?;

        Ok(Self {
            id: OrderId::new(),
            user,
            items,
            total_amount,
            payment_method,
            status: OrderStatus::Pending,
            charge: ChargeState::Uncharged,
            code_status: None,
            machine,
            dispensing_in_progress: false,
            dispatch: Vec::new(),
            dispensed_at: None,
            failure_reason: None,
            failure_details: None,
            hardware_details: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            failed_at: None,
            canceled_at: None,
            version: 0,
        })
    }

    /// Feeds `event` through the transition table and stamps the new state.
    pub fn apply(&mut self, event: OrderEvent, now: DateTime<Utc>) -> Result<Transition, VendingError> {
        let outcome = transition(self.status, event)?;
        if let Transition::Applied { to, .. } = outcome {
            self.status = to;
            self.updated_at = now;
            match to {
                OrderStatus::Completed => {
                    self.completed_at = Some(now);
                    self.dispensing_in_progress = false;
                    self.dispensed_at.get_or_insert(now);
                }
                OrderStatus::Failed => {
                    self.failed_at = Some(now);
                    self.dispensing_in_progress = false;
                }
                OrderStatus::Canceled => {
                    self.canceled_at = Some(now);
                    if self.code_status == Some(CodeStatus::Active) {
                        self.code_status = Some(match event {
                            OrderEvent::CodeExpired => CodeStatus::Expired,
                            _ => CodeStatus::Canceled,
                        });
                    }
                }
                OrderStatus::Pending | OrderStatus::Processing => {}
            }
        }
        Ok(outcome)
    }

    /// Whether the dispensing coordinator may hand this order to hardware.
    pub fn is_claimable_by(&self, machine: &MachineId) -> bool {
        self.status == OrderStatus::Processing
            && self.machine.as_ref() == Some(machine)
            && !self.dispensing_in_progress
            && self.dispensed_at.is_none()
    }

    pub fn is_charged(&self) -> bool {
        matches!(self.charge, ChargeState::Charged { .. })
    }

    /// Records a detection report for `lane`. Returns `true` once every
    /// planned lane has reported its full quantity.
    pub fn record_detection(
        &mut self,
        lane: u8,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<bool, VendingError> {
        let instruction = self
            .dispatch
            .iter_mut()
            .find(|instruction| instruction.lane == lane)
            .ok_or_else(|| {
                VendingError::ValidationError(format!(
                    "lane {lane} is not part of the dispatch plan for order {}",
                    self.id
                ))
            })?;
        instruction.detected = instruction.detected.saturating_add(quantity);
        self.updated_at = now;

        let done = self.all_products_detected();
        if done {
            self.dispensing_in_progress = false;
            self.dispensed_at.get_or_insert(now);
        }
        Ok(done)
    }

    pub fn all_products_detected(&self) -> bool {
        !self.dispatch.is_empty() && self.dispatch.iter().all(LaneInstruction::is_satisfied)
    }

    pub fn dispensing_status(&self) -> DispensingStatus {
        DispensingStatus {
            all_products_detected: !self.dispensing_in_progress && self.dispensed_at.is_some(),
            dispensed_at: self.dispensed_at,
            is_dispensing_in_progress: self.dispensing_in_progress,
        }
    }
}

impl Record for Order {
    const KIND: &'static str = "order";
    type Id = OrderId;

    fn id(&self) -> OrderId {
        self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}
