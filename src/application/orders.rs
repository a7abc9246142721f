use super::machines::{MachineRegistry, RunOutcome};
use super::retry::retry_transient;
use super::wallet::WalletLedger;
use crate::config::WalletCharge;
use crate::domain::clock::ClockBox;
use crate::domain::ids::{MachineId, OrderId, ProductId, UserId};
use crate::domain::money::Amount;
use crate::domain::notification::Notification;
use crate::domain::order::{
    ChargeState, CodeStatus, Effect, LineItem, Order, OrderEvent, OrderStatus, PaymentMethod, Transition,
};
use crate::domain::ports::{NotifierBox, OrderStoreBox, ProductStoreBox};
use crate::error::{Result, VendingError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{error, info, instrument, warn};

/// A requested product and quantity, before prices are attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    #[serde(rename = "productId")]
    pub product: ProductId,
    pub quantity: u32,
}

/// Owns order records and drives them through the transition table.
///
/// Every status change is a compare-and-swap on the order. Side effects
/// listed by the transition (restock, charge, refund, machine release,
/// notification) run only after the new status is committed, so a lost
/// race never produces them twice.
#[derive(Clone)]
pub struct OrderEngine {
    orders: OrderStoreBox,
    products: ProductStoreBox,
    ledger: WalletLedger,
    machines: MachineRegistry,
    notifier: NotifierBox,
    clock: ClockBox,
    wallet_charge: WalletCharge,
    retry_attempts: u32,
}

impl OrderEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        orders: OrderStoreBox,
        products: ProductStoreBox,
        ledger: WalletLedger,
        machines: MachineRegistry,
        notifier: NotifierBox,
        clock: ClockBox,
        wallet_charge: WalletCharge,
        retry_attempts: u32,
    ) -> Self {
        Self {
            orders,
            products,
            ledger,
            machines,
            notifier,
            clock,
            wallet_charge,
            retry_attempts,
        }
    }

    pub async fn get(&self, id: OrderId) -> Result<Order> {
        self.orders.fetch(&id).await
    }

    /// Creates a wallet or card order for `machine` and moves it straight to
    /// `Processing`. Code orders go through the code issuer instead.
    #[instrument(skip_all, fields(user = %user, machine = %machine, method = ?method))]
    pub async fn create(
        &self,
        user: UserId,
        lines: &[OrderLine],
        method: PaymentMethod,
        machine: MachineId,
    ) -> Result<Order> {
        if method == PaymentMethod::Code {
            return Err(VendingError::ValidationError(
                "Code orders must be created by issuing a payment code".to_string(),
            ));
        }
        self.machines.ensure_available(&machine).await?;
        let order = self.open(user, lines, method, Some(machine), None).await?;
        info!(order = %order.id, total = %order.total_amount, "order created");
        self.mark_processing(order.id).await
    }

    /// Prices `lines` and reserves their stock, then stores a `Pending` order.
    ///
    /// Either the order is stored with every line reserved (and, for an
    /// up-front wallet charge, paid), or nothing changes.
    pub(crate) async fn open(
        &self,
        user: UserId,
        lines: &[OrderLine],
        method: PaymentMethod,
        machine: Option<MachineId>,
        expected_total: Option<Amount>,
    ) -> Result<Order> {
        let items = self.quote(lines).await?;
        let now = self.clock.now();
        let mut order = Order::new(user, items, method, machine, now)?;
        if let Some(expected) = expected_total
            && expected != order.total_amount
        {
            return Err(VendingError::ValidationError(format!(
                "Amount {expected} does not match the order total {}",
                order.total_amount
            )));
        }

        let charge_now = method == PaymentMethod::Wallet && self.wallet_charge == WalletCharge::OnCreate;
        if method == PaymentMethod::Wallet {
            self.ledger.ensure_funds(user, order.total_amount).await?;
        }

        self.reserve(&order.items).await?;

        match method {
            PaymentMethod::Wallet if charge_now => {
                if let Err(err) = self.ledger.debit_for_order(user, order.total_amount, order.id).await {
                    self.rollback_reservation(&order).await;
                    return Err(err);
                }
                order.charge = ChargeState::Charged { at: now };
            }
            PaymentMethod::Wallet => {}
            PaymentMethod::Card => order.charge = ChargeState::Charged { at: now },
            PaymentMethod::Code => order.code_status = Some(CodeStatus::Active),
        }

        match self.orders.insert(order.clone()).await {
            Ok(stored) => Ok(stored),
            Err(err) => {
                if charge_now
                    && let Err(refund_err) = self.ledger.refund(user, order.total_amount, order.id).await
                {
                    error!(order = %order.id, error = %refund_err, "failed to refund after aborted order");
                }
                self.rollback_reservation(&order).await;
                Err(err)
            }
        }
    }

    /// Loads the products for `lines` and freezes their prices.
    ///
    /// Repeated products are merged into one line item.
    pub async fn quote(&self, lines: &[OrderLine]) -> Result<Vec<LineItem>> {
        if lines.is_empty() {
            return Err(VendingError::ValidationError(
                "An order needs at least one product".to_string(),
            ));
        }
        let mut merged: BTreeMap<ProductId, u32> = BTreeMap::new();
        for line in lines {
            if line.quantity == 0 {
                return Err(VendingError::ValidationError(
                    "Quantity must be at least 1".to_string(),
                ));
            }
            let quantity = merged.entry(line.product).or_default();
            *quantity = quantity.saturating_add(line.quantity);
        }

        let mut items = Vec::with_capacity(merged.len());
        for (id, quantity) in merged {
            let product = self.products.fetch(&id).await?;
            if product.carrier.is_none() {
                return Err(VendingError::ValidationError(format!(
                    "Product {} is not assigned to a carrier",
                    product.name
                )));
            }
            if product.quantity < quantity {
                return Err(VendingError::InsufficientStock {
                    product: product.name,
                    requested: quantity,
                    available: product.quantity,
                });
            }
            items.push(LineItem {
                product: id,
                quantity,
                unit_price: product.price,
                lane: None,
            });
        }
        Ok(items)
    }

    /// Confirms payment. A no-op for orders already past `Pending`.
    pub async fn mark_processing(&self, id: OrderId) -> Result<Order> {
        self.transition(id, OrderEvent::PaymentConfirmed, |_| Ok(())).await
    }

    /// Confirms payment of a code order at `machine`.
    pub(crate) async fn redeem_code(&self, id: OrderId, machine: MachineId) -> Result<Order> {
        let now = self.clock.now();
        let machine = &machine;
        self.transition(id, OrderEvent::PaymentConfirmed, move |order| {
            if order.code_status != Some(CodeStatus::Active) {
                return Err(VendingError::not_found("active code for order", order.id));
            }
            order.code_status = Some(CodeStatus::Used);
            order.machine = Some(machine.clone());
            order.charge = ChargeState::Charged { at: now };
            Ok(())
        })
        .await
    }

    /// Hardware confirmed delivery. Repeating the call returns the completed order.
    #[instrument(skip(self, details))]
    pub async fn complete_dispensing(
        &self,
        id: OrderId,
        machine: &MachineId,
        details: Option<serde_json::Value>,
    ) -> Result<Order> {
        let details = &details;
        self.transition(id, OrderEvent::DispenseSucceeded, move |order| {
            ensure_machine(order, machine)?;
            if details.is_some() {
                order.hardware_details = details.clone();
            }
            Ok(())
        })
        .await
    }

    /// Hardware (or a timeout) reported failure. Stock is returned and any
    /// wallet charge refunded.
    #[instrument(skip(self, details))]
    pub async fn fail_dispensing(
        &self,
        id: OrderId,
        machine: &MachineId,
        reason: &str,
        details: Option<serde_json::Value>,
    ) -> Result<Order> {
        let details = &details;
        self.transition(id, OrderEvent::DispenseFailed, move |order| {
            ensure_machine(order, machine)?;
            if order.status == OrderStatus::Processing {
                order.failure_reason = Some(reason.to_string());
                order.failure_details = details.clone();
            }
            Ok(())
        })
        .await
    }

    /// Cancels a code order whose code ran out. Advisory: does nothing once
    /// the code was used or the order moved on.
    #[instrument(skip(self))]
    pub async fn expire_code(&self, id: OrderId) -> Result<Order> {
        let result = self
            .transition(id, OrderEvent::CodeExpired, |order| {
                if order.code_status == Some(CodeStatus::Active) {
                    Ok(())
                } else {
                    Err(VendingError::InvalidState(format!(
                        "order {} has no active code",
                        order.id
                    )))
                }
            })
            .await;
        match result {
            Err(VendingError::InvalidState(reason)) => {
                warn!(%reason, "code expiry skipped");
                self.get(id).await
            }
            other => other,
        }
    }

    /// User cancellation, allowed while the order is still `Pending`.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: OrderId) -> Result<Order> {
        self.transition(id, OrderEvent::Canceled, |_| Ok(())).await
    }

    /// Collects the wallet charge for `id`. Safe to call any number of times.
    #[instrument(skip(self))]
    pub async fn charge_order(&self, id: OrderId) -> Result<Order> {
        retry_transient(self.retry_attempts, move || async move {
            let mut order = self.orders.fetch(&id).await?;
            if order.payment_method != PaymentMethod::Wallet {
                return Err(VendingError::ValidationError(format!(
                    "order {id} is not paid from a wallet"
                )));
            }
            match order.charge {
                ChargeState::Charged { .. } => return Ok(order),
                ChargeState::Refunded { .. } => {
                    return Err(VendingError::InvalidState(format!(
                        "order {id} was already refunded"
                    )));
                }
                ChargeState::Uncharged | ChargeState::Outstanding => {}
            }
            if matches!(order.status, OrderStatus::Failed | OrderStatus::Canceled) {
                return Err(VendingError::InvalidState(format!(
                    "cannot charge an order in {}",
                    order.status
                )));
            }
            self.ledger
                .debit_for_order(order.user, order.total_amount, id)
                .await?;
            order.charge = ChargeState::Charged {
                at: self.clock.now(),
            };
            self.orders.replace(order).await
        })
        .await
    }

    /// Applies `event` to the order, committing with compare-and-swap.
    ///
    /// `prepare` sees the stored order before the event is applied; it can
    /// reject the transition or annotate the order being written.
    async fn transition<F>(&self, id: OrderId, event: OrderEvent, prepare: F) -> Result<Order>
    where
        F: Fn(&mut Order) -> Result<()> + Send + Sync,
    {
        let prepare = &prepare;
        let (order, outcome) = retry_transient(self.retry_attempts, move || async move {
            let stored = self.orders.fetch(&id).await?;
            let mut updated = stored.clone();
            prepare(&mut updated)?;
            match updated.apply(event, self.clock.now())? {
                outcome @ Transition::AlreadyApplied(_) => Ok((stored, outcome)),
                outcome => Ok((self.orders.replace(updated).await?, outcome)),
            }
        })
        .await?;

        match outcome {
            Transition::Applied { from, to, effects } => {
                info!(order = %id, %from, %to, "order transitioned");
                self.run_effects(&order, effects).await;
                self.get(id).await
            }
            Transition::AlreadyApplied(state) => {
                info!(order = %id, %state, event = ?event, "transition already applied");
                Ok(order)
            }
        }
    }

    async fn run_effects(&self, order: &Order, effects: &[Effect]) {
        for effect in effects {
            match effect {
                Effect::Charge => self.collect_charge(order).await,
                Effect::Restock => {
                    if let Err(err) = self.restock(&order.items).await {
                        error!(order = %order.id, error = %err, "failed to restock order items");
                    }
                }
                Effect::Refund => self.refund(order).await,
                Effect::ReleaseMachine => self.release_machine(order).await,
                Effect::Notify => self.notifier.notify(notification_for(order)).await,
            }
        }
    }

    async fn collect_charge(&self, order: &Order) {
        if order.payment_method != PaymentMethod::Wallet || order.is_charged() {
            return;
        }
        if let Err(err) = self.charge_order(order.id).await {
            error!(order = %order.id, error = %err, "wallet charge failed after delivery");
            self.set_charge(order.id, ChargeState::Outstanding).await;
            self.notifier
                .notify(Notification::PaymentOutstanding {
                    user: order.user,
                    order: order.id,
                    amount: order.total_amount.value(),
                })
                .await;
        }
    }

    async fn refund(&self, order: &Order) {
        if !order.is_charged() {
            return;
        }
        match order.payment_method {
            PaymentMethod::Wallet => {
                match self.ledger.refund(order.user, order.total_amount, order.id).await {
                    Ok(refund) => {
                        let at = self.clock.now();
                        self.set_charge(order.id, ChargeState::Refunded { at }).await;
                        if refund.uncredited > Decimal::ZERO {
                            self.notifier
                                .notify(Notification::RefundRequired {
                                    user: order.user,
                                    order: order.id,
                                    amount: refund.uncredited,
                                })
                                .await;
                        }
                    }
                    Err(err) => error!(order = %order.id, error = %err, "wallet refund failed"),
                }
            }
            PaymentMethod::Card | PaymentMethod::Code => {
                warn!(order = %order.id, method = ?order.payment_method, "refund must be issued outside the wallet");
                self.notifier
                    .notify(Notification::RefundRequired {
                        user: order.user,
                        order: order.id,
                        amount: order.total_amount.value(),
                    })
                    .await;
            }
        }
    }

    async fn release_machine(&self, order: &Order) {
        let Some(machine) = &order.machine else {
            return;
        };
        let outcome = match order.status {
            OrderStatus::Completed => RunOutcome::Completed,
            OrderStatus::Failed => RunOutcome::Failed,
            _ => RunOutcome::Abandoned,
        };
        if let Err(err) = self.machines.release(machine, order.id, outcome).await {
            warn!(order = %order.id, %machine, error = %err, "failed to release machine");
        }
    }

    async fn set_charge(&self, id: OrderId, charge: ChargeState) {
        let result = retry_transient(self.retry_attempts, move || async move {
            let mut order = self.orders.fetch(&id).await?;
            order.charge = charge;
            self.orders.replace(order).await
        })
        .await;
        if let Err(err) = result {
            error!(order = %id, error = %err, "failed to record charge state");
        }
    }

    /// Takes every item's quantity out of stock in one batch, or nothing.
    async fn reserve(&self, items: &[LineItem]) -> Result<()> {
        retry_transient(self.retry_attempts, move || async move {
            let mut products = Vec::with_capacity(items.len());
            for item in items {
                let mut product = self.products.fetch(&item.product).await?;
                product.reserve(item.quantity)?;
                products.push(product);
            }
            self.products.replace_all(products).await.map(|_| ())
        })
        .await
    }

    async fn restock(&self, items: &[LineItem]) -> Result<()> {
        retry_transient(self.retry_attempts, move || async move {
            let mut products = Vec::with_capacity(items.len());
            for item in items {
                let mut product = self.products.fetch(&item.product).await?;
                product.restock(item.quantity);
                products.push(product);
            }
            self.products.replace_all(products).await.map(|_| ())
        })
        .await
    }

    async fn rollback_reservation(&self, order: &Order) {
        if let Err(err) = self.restock(&order.items).await {
            error!(order = %order.id, error = %err, "failed to release reserved stock");
        }
    }
}

fn ensure_machine(order: &Order, machine: &MachineId) -> Result<()> {
    match &order.machine {
        Some(assigned) if assigned == machine => Ok(()),
        Some(assigned) => Err(VendingError::ValidationError(format!(
            "order {} is assigned to machine {assigned}, not {machine}",
            order.id
        ))),
        None => Err(VendingError::InvalidState(format!(
            "order {} is not assigned to a machine",
            order.id
        ))),
    }
}

fn notification_for(order: &Order) -> Notification {
    let (user, id, amount) = (order.user, order.id, order.total_amount.value());
    match order.status {
        OrderStatus::Pending | OrderStatus::Processing => Notification::OrderPlaced {
            user,
            order: id,
            amount,
        },
        OrderStatus::Completed => Notification::OrderCompleted {
            user,
            order: id,
            amount,
        },
        OrderStatus::Failed => Notification::OrderFailed {
            user,
            order: id,
            reason: order
                .failure_reason
                .clone()
                .unwrap_or_else(|| "dispensing failed".to_string()),
        },
        OrderStatus::Canceled => Notification::OrderCanceled { user, order: id },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::VendingService;
    use crate::config::Settings;
    use crate::domain::clock::SystemClock;
    use crate::domain::money::Balance;
    use crate::domain::ports::Stores;
    use crate::domain::product::Product;
    use crate::infrastructure::notifier::RecordingNotifier;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    struct Fixture {
        service: VendingService,
        notifier: RecordingNotifier,
        machine: MachineId,
        a: ProductId,
        b: ProductId,
    }

    async fn fixture(settings: Settings) -> Fixture {
        let notifier = RecordingNotifier::new();
        let service = VendingService::new(
            Stores::in_memory(),
            Arc::new(notifier.clone()),
            Arc::new(SystemClock),
            settings,
        );
        let machine = MachineId::from("VM001");
        service.machines.register(machine.clone(), "Lobby", "Hall").await.unwrap();

        let a = service.seed_product(product("A", dec!(50), 5), Some("CHARIOT1")).await.unwrap();
        let b = service.seed_product(product("B", dec!(100), 5), Some("CHARIOT2")).await.unwrap();
        Fixture {
            service,
            notifier,
            machine,
            a: a.id,
            b: b.id,
        }
    }

    fn product(name: &str, price: Decimal, quantity: u32) -> Product {
        Product::new(name, name, Amount::new(price).unwrap(), quantity)
    }

    fn lines(f: &Fixture) -> Vec<OrderLine> {
        vec![
            OrderLine {
                product: f.a,
                quantity: 2,
            },
            OrderLine {
                product: f.b,
                quantity: 1,
            },
        ]
    }

    async fn funded_user(f: &Fixture, amount: Decimal) -> UserId {
        let user = UserId::new();
        f.service.wallets.deposit(user, Amount::new(amount).unwrap()).await.unwrap();
        user
    }

    async fn stock(f: &Fixture, id: ProductId) -> u32 {
        f.service.stores.products.fetch(&id).await.unwrap().quantity
    }

    #[tokio::test]
    async fn test_wallet_order_charged_on_completion() {
        let f = fixture(Settings::default()).await;
        let user = funded_user(&f, dec!(500)).await;

        let order = f
            .service
            .orders
            .create(user, &lines(&f), PaymentMethod::Wallet, f.machine.clone())
            .await
            .unwrap();
        assert_eq!(order.total_amount.value(), dec!(200));
        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(stock(&f, f.a).await, 3);
        assert_eq!(stock(&f, f.b).await, 4);
        assert_eq!(f.service.wallets.balance(user).await.unwrap(), Balance::new(dec!(500)));

        let done = f
            .service
            .orders
            .complete_dispensing(order.id, &f.machine, None)
            .await
            .unwrap();
        assert_eq!(done.status, OrderStatus::Completed);
        assert!(done.is_charged());
        assert_eq!(f.service.wallets.balance(user).await.unwrap(), Balance::new(dec!(300)));

        let again = f
            .service
            .orders
            .complete_dispensing(order.id, &f.machine, None)
            .await
            .unwrap();
        assert_eq!(again.status, OrderStatus::Completed);
        let wallet = f.service.wallets.wallet(user).await.unwrap();
        assert_eq!(wallet.balance, Balance::new(dec!(300)));
        assert_eq!(wallet.transactions.len(), 2);
    }

    #[tokio::test]
    async fn test_on_create_charge_and_failure_refund() {
        let settings = Settings {
            wallet_charge: WalletCharge::OnCreate,
            ..Settings::default()
        };
        let f = fixture(settings).await;
        let user = funded_user(&f, dec!(500)).await;

        let order = f
            .service
            .orders
            .create(user, &lines(&f), PaymentMethod::Wallet, f.machine.clone())
            .await
            .unwrap();
        assert!(order.is_charged());
        assert_eq!(f.service.wallets.balance(user).await.unwrap(), Balance::new(dec!(300)));

        let failed = f
            .service
            .orders
            .fail_dispensing(order.id, &f.machine, "jammed", None)
            .await
            .unwrap();
        assert_eq!(failed.status, OrderStatus::Failed);
        assert_eq!(failed.failure_reason.as_deref(), Some("jammed"));
        assert!(matches!(failed.charge, ChargeState::Refunded { .. }));
        assert_eq!(f.service.wallets.balance(user).await.unwrap(), Balance::new(dec!(500)));
        assert_eq!(stock(&f, f.a).await, 5);
        assert_eq!(stock(&f, f.b).await, 5);
    }

    #[tokio::test]
    async fn test_short_stock_reserves_nothing() {
        let f = fixture(Settings::default()).await;
        let lines = vec![
            OrderLine {
                product: f.a,
                quantity: 1,
            },
            OrderLine {
                product: f.b,
                quantity: 6,
            },
        ];

        let result = f
            .service
            .orders
            .create(UserId::new(), &lines, PaymentMethod::Card, f.machine.clone())
            .await;
        assert!(matches!(result, Err(VendingError::InsufficientStock { .. })));
        assert_eq!(stock(&f, f.a).await, 5);
        assert!(f.service.stores.orders.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wallet_precheck_rejects_poor_user() {
        let f = fixture(Settings::default()).await;
        let user = funded_user(&f, dec!(100)).await;
        let result = f
            .service
            .orders
            .create(user, &lines(&f), PaymentMethod::Wallet, f.machine.clone())
            .await;
        assert!(matches!(result, Err(VendingError::InsufficientFunds { .. })));
        assert_eq!(stock(&f, f.a).await, 5);
    }

    #[tokio::test]
    async fn test_unavailable_machine_rejects_orders() {
        let f = fixture(Settings::default()).await;
        f.service
            .machines
            .set_status(&f.machine, crate::domain::machine::MachineStatus::Maintenance)
            .await
            .unwrap();
        let result = f
            .service
            .orders
            .create(UserId::new(), &lines(&f), PaymentMethod::Card, f.machine.clone())
            .await;
        assert!(matches!(result, Err(VendingError::Unavailable(_))));

        let result = f
            .service
            .orders
            .create(UserId::new(), &lines(&f), PaymentMethod::Card, "VM404".into())
            .await;
        assert!(matches!(result, Err(VendingError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_outstanding_charge_still_completes() {
        let f = fixture(Settings::default()).await;
        let user = funded_user(&f, dec!(200)).await;
        let order = f
            .service
            .orders
            .create(user, &lines(&f), PaymentMethod::Wallet, f.machine.clone())
            .await
            .unwrap();
        f.service.wallets.debit(user, Amount::new(dec!(150)).unwrap()).await.unwrap();

        let done = f
            .service
            .orders
            .complete_dispensing(order.id, &f.machine, None)
            .await
            .unwrap();
        assert_eq!(done.status, OrderStatus::Completed);
        assert_eq!(done.charge, ChargeState::Outstanding);
        assert!(
            f.notifier
                .sent()
                .await
                .iter()
                .any(|n| matches!(n, Notification::PaymentOutstanding { .. }))
        );
    }

    #[tokio::test]
    async fn test_complete_rejects_wrong_state_and_machine() {
        let f = fixture(Settings::default()).await;
        let order = f
            .service
            .orders
            .create(UserId::new(), &lines(&f), PaymentMethod::Card, f.machine.clone())
            .await
            .unwrap();

        assert!(matches!(
            f.service
                .orders
                .complete_dispensing(order.id, &"VM002".into(), None)
                .await,
            Err(VendingError::ValidationError(_))
        ));
        f.service
            .orders
            .fail_dispensing(order.id, &f.machine, "timeout", None)
            .await
            .unwrap();
        assert!(matches!(
            f.service.orders.complete_dispensing(order.id, &f.machine, None).await,
            Err(VendingError::InvalidState(_))
        ));
        assert!(matches!(
            f.service.orders.cancel(order.id).await,
            Err(VendingError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_card_failure_requires_refund() {
        let f = fixture(Settings::default()).await;
        let order = f
            .service
            .orders
            .create(UserId::new(), &lines(&f), PaymentMethod::Card, f.machine.clone())
            .await
            .unwrap();
        f.service
            .orders
            .fail_dispensing(order.id, &f.machine, "empty lane", None)
            .await
            .unwrap();

        let sent = f.notifier.sent().await;
        assert!(sent.iter().any(|n| matches!(n, Notification::RefundRequired { .. })));
        assert!(sent.iter().any(|n| matches!(n, Notification::OrderFailed { .. })));
    }
}
