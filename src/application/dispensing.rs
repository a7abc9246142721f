use super::machines::MachineRegistry;
use super::retry::retry_transient;
use crate::domain::clock::ClockBox;
use crate::domain::ids::{MachineId, OrderId, ProductId};
use crate::domain::machine::{Machine, MachineStatus};
use crate::domain::order::{DispensingStatus, LaneInstruction, Order, OrderStatus};
use crate::domain::ports::{CarrierStoreBox, OrderStoreBox, ProductStoreBox};
use crate::error::{Result, VendingError};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

/// Result of asking for the next order to dispense.
#[derive(Debug, Clone, PartialEq)]
pub enum Claim {
    /// The order is now flagged in progress and the machine is busy with it.
    Dispatched(Order),
    /// No eligible order has anything that maps to a lane. Carries the
    /// oldest one, which stays unclaimed.
    NoDispensableContent(OrderId),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusView {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub dispensing_status: DispensingStatus,
}

/// Hands orders to the hardware poller one at a time per machine and
/// reconciles what the hardware reports back.
#[derive(Clone)]
pub struct DispensingCoordinator {
    orders: OrderStoreBox,
    products: ProductStoreBox,
    carriers: CarrierStoreBox,
    machines: MachineRegistry,
    clock: ClockBox,
    retry_attempts: u32,
}

impl DispensingCoordinator {
    pub fn new(
        orders: OrderStoreBox,
        products: ProductStoreBox,
        carriers: CarrierStoreBox,
        machines: MachineRegistry,
        clock: ClockBox,
        retry_attempts: u32,
    ) -> Self {
        Self {
            orders,
            products,
            carriers,
            machines,
            clock,
            retry_attempts,
        }
    }

    /// Claims the oldest order waiting for `machine` that has at least one
    /// line item on a lane. Orders with no lane are skipped, not claimed.
    ///
    /// Returns `None` when nothing is waiting or the machine is already busy
    /// with another order. Concurrent callers never receive the same order.
    #[instrument(skip(self))]
    pub async fn next_order_for_machine(&self, machine_id: &MachineId) -> Result<Option<Claim>> {
        let machine = self.machines.get(machine_id).await?;
        match machine.status {
            MachineStatus::Available => {}
            MachineStatus::Busy => {
                debug!("machine busy, nothing handed out");
                return Ok(None);
            }
            status => {
                return Err(VendingError::Unavailable(format!(
                    "vending machine {machine_id} is {status:?}"
                )));
            }
        }

        let waiting = self.waiting(machine_id, |order| order.is_claimable_by(machine_id)).await?;
        let Some(oldest) = waiting.first().map(|order| order.id) else {
            return Ok(None);
        };

        let mut picked = None;
        for candidate in waiting {
            let plan = self.plan(&machine, &candidate).await?;
            if plan.is_empty() {
                warn!(order = %candidate.id, "no line item resolves to a lane, trying next order");
                continue;
            }
            picked = Some((candidate.id, plan));
            break;
        }
        let Some((id, plan)) = picked else {
            return Ok(Some(Claim::NoDispensableContent(oldest)));
        };

        let plan = &plan;
        let claimed = retry_transient(self.retry_attempts, move || async move {
            let mut order = self.orders.fetch(&id).await?;
            if !order.is_claimable_by(machine_id) {
                return Ok(None);
            }
            order.dispensing_in_progress = true;
            order.dispatch = plan.clone();
            for item in &mut order.items {
                item.lane = plan
                    .iter()
                    .find(|instruction| instruction.product == item.product)
                    .map(|instruction| instruction.lane);
            }
            order.updated_at = self.clock.now();
            self.orders.replace(order).await.map(Some)
        })
        .await?;

        let Some(order) = claimed else {
            debug!(order = %id, "order claimed elsewhere");
            return Ok(None);
        };

        if let Err(err) = self.machines.claim(machine_id, order.id).await {
            debug!(order = %order.id, error = %err, "machine claimed elsewhere, releasing order");
            self.release_flag(order.id).await?;
            return Ok(None);
        }

        info!(order = %order.id, lanes = order.dispatch.len(), "order handed to hardware");
        Ok(Some(Claim::Dispatched(order)))
    }

    /// Records that `quantity` units came out of `lane` for the order.
    ///
    /// The order counts as dispensed once every planned lane has reported
    /// its full quantity. The status itself is finalized by completion.
    #[instrument(skip(self))]
    pub async fn report_detection(&self, id: OrderId, lane: u8, quantity: u32) -> Result<Order> {
        if quantity == 0 {
            return Err(VendingError::ValidationError(
                "Detected quantity must be at least 1".to_string(),
            ));
        }
        retry_transient(self.retry_attempts, move || async move {
            let mut order = self.orders.fetch(&id).await?;
            if !matches!(order.status, OrderStatus::Processing | OrderStatus::Completed) {
                return Err(VendingError::InvalidState(format!(
                    "cannot record detection for an order in {}",
                    order.status
                )));
            }
            if order.all_products_detected() {
                debug!("all lanes already reported");
                return Ok(order);
            }
            if order.record_detection(lane, quantity, self.clock.now())? {
                info!("all products detected");
            }
            self.orders.replace(order).await
        })
        .await
    }

    /// The oldest order still waiting on `machine`, without claiming it.
    pub async fn pending_order(&self, machine: &MachineId) -> Result<Option<Order>> {
        self.machines.get(machine).await?;
        let waiting = self
            .waiting(machine, |order| {
                order.status == OrderStatus::Processing && order.dispensed_at.is_none()
            })
            .await?;
        Ok(waiting.into_iter().next())
    }

    pub async fn order_status(&self, id: OrderId) -> Result<OrderStatusView> {
        let order = self.orders.fetch(&id).await?;
        Ok(OrderStatusView {
            order_id: order.id,
            status: order.status,
            dispensing_status: order.dispensing_status(),
        })
    }

    /// Orders for `machine` matching `predicate`, oldest first.
    async fn waiting<P>(&self, machine: &MachineId, predicate: P) -> Result<Vec<Order>>
    where
        P: Fn(&Order) -> bool,
    {
        let mut orders: Vec<Order> = self
            .orders
            .list()
            .await?
            .into_iter()
            .filter(|order| order.machine.as_ref() == Some(machine) && predicate(order))
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(orders)
    }

    /// Translates line items into lane instructions, skipping items that
    /// resolve to no lane.
    async fn plan(&self, machine: &Machine, order: &Order) -> Result<Vec<LaneInstruction>> {
        let lane_count = self.machines.lane_count();
        let mut plan: Vec<LaneInstruction> = Vec::new();
        for item in &order.items {
            let lane = match machine.lane_for(item.product) {
                Some(lane) => Some(lane),
                None => self.carrier_lane(item.product, lane_count).await?,
            };
            let Some(lane) = lane else {
                warn!(order = %order.id, product = %item.product, "product has no lane, skipping");
                continue;
            };
            match plan.iter_mut().find(|instruction| instruction.lane == lane) {
                Some(instruction) => instruction.quantity += item.quantity,
                None => plan.push(LaneInstruction {
                    lane,
                    product: item.product,
                    quantity: item.quantity,
                    detected: 0,
                }),
            }
        }
        plan.sort_by_key(|instruction| instruction.lane);
        Ok(plan)
    }

    async fn carrier_lane(&self, product: ProductId, lane_count: u8) -> Result<Option<u8>> {
        let Some(carrier) = self.products.get(&product).await?.and_then(|p| p.carrier) else {
            return Ok(None);
        };
        Ok(self
            .carriers
            .get(&carrier)
            .await?
            .and_then(|carrier| carrier.lane_hint())
            .filter(|lane| (1..=lane_count).contains(lane)))
    }

    async fn release_flag(&self, id: OrderId) -> Result<()> {
        retry_transient(self.retry_attempts, move || async move {
            let mut order = self.orders.fetch(&id).await?;
            if !order.dispensing_in_progress {
                return Ok(());
            }
            order.dispensing_in_progress = false;
            order.dispatch.clear();
            order.updated_at = self.clock.now();
            self.orders.replace(order).await.map(|_| ())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::VendingService;
    use crate::application::orders::OrderLine;
    use crate::config::Settings;
    use crate::domain::clock::ManualClock;
    use chrono::{Duration, Utc};
    use crate::domain::ids::UserId;
    use crate::domain::machine::LaneMapping;
    use crate::domain::money::Amount;
    use crate::domain::order::PaymentMethod;
    use crate::domain::ports::Stores;
    use crate::domain::product::Product;
    use crate::infrastructure::notifier::RecordingNotifier;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    async fn service() -> (VendingService, MachineId, ManualClock) {
        let clock = ManualClock::new(Utc::now());
        let service = VendingService::new(
            Stores::in_memory(),
            Arc::new(RecordingNotifier::new()),
            Arc::new(clock.clone()),
            Settings::default(),
        );
        let machine = MachineId::from("VM001");
        service.machines.register(machine.clone(), "Lobby", "Hall").await.unwrap();
        (service, machine, clock)
    }

    async fn seed(service: &VendingService, name: &str, carrier: &str) -> ProductId {
        let product = Product::new(name, name, Amount::new(dec!(50)).unwrap(), 10);
        service.seed_product(product, Some(carrier)).await.unwrap().id
    }

    async fn order(service: &VendingService, machine: &MachineId, lines: Vec<OrderLine>) -> Order {
        service
            .orders
            .create(UserId::new(), &lines, PaymentMethod::Card, machine.clone())
            .await
            .unwrap()
    }

    fn line(product: ProductId, quantity: u32) -> OrderLine {
        OrderLine { product, quantity }
    }

    #[tokio::test]
    async fn test_claim_plans_lanes_from_carrier_names() {
        let (service, machine, _) = service().await;
        let a = seed(&service, "A", "CHARIOT1").await;
        let b = seed(&service, "B", "CHARIOT3").await;
        let created = order(&service, &machine, vec![line(a, 2), line(b, 1)]).await;

        let Some(Claim::Dispatched(claimed)) = service.dispensing.next_order_for_machine(&machine).await.unwrap()
        else {
            panic!("expected a dispatched order");
        };
        assert_eq!(claimed.id, created.id);
        assert!(claimed.dispensing_in_progress);
        let lanes: Vec<_> = claimed.dispatch.iter().map(|i| (i.lane, i.quantity)).collect();
        assert_eq!(lanes, vec![(1, 2), (3, 1)]);
        assert_eq!(service.machines.get(&machine).await.unwrap().status, MachineStatus::Busy);

        assert_eq!(service.dispensing.next_order_for_machine(&machine).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_machine_mapping_wins_over_carrier_name() {
        let (service, machine, _) = service().await;
        let a = seed(&service, "A", "CHARIOT1").await;
        service
            .machines
            .update_lane_mapping(
                &machine,
                vec![LaneMapping {
                    lane: 4,
                    product: a,
                    stock_level: 10,
                }],
            )
            .await
            .unwrap();
        order(&service, &machine, vec![line(a, 1)]).await;

        let Some(Claim::Dispatched(claimed)) = service.dispensing.next_order_for_machine(&machine).await.unwrap()
        else {
            panic!("expected a dispatched order");
        };
        assert_eq!(claimed.dispatch[0].lane, 4);
        assert_eq!(claimed.items[0].lane, Some(4));
    }

    #[tokio::test]
    async fn test_unmapped_order_has_no_dispensable_content() {
        let (service, machine, _) = service().await;
        let a = seed(&service, "A", "SPARE").await;
        let created = order(&service, &machine, vec![line(a, 1)]).await;

        assert_eq!(
            service.dispensing.next_order_for_machine(&machine).await.unwrap(),
            Some(Claim::NoDispensableContent(created.id))
        );
        let stored = service.orders.get(created.id).await.unwrap();
        assert!(!stored.dispensing_in_progress);
        assert_eq!(service.machines.get(&machine).await.unwrap().status, MachineStatus::Available);
    }

    #[tokio::test]
    async fn test_unmapped_order_does_not_block_younger_orders() {
        let (service, machine, clock) = service().await;
        let spare = seed(&service, "A", "SPARE").await;
        let mapped = seed(&service, "B", "CHARIOT2").await;
        let stuck = order(&service, &machine, vec![line(spare, 1)]).await;
        clock.advance(Duration::seconds(1));
        let ready = order(&service, &machine, vec![line(mapped, 1)]).await;

        let Some(Claim::Dispatched(claimed)) = service.dispensing.next_order_for_machine(&machine).await.unwrap()
        else {
            panic!("expected the mapped order to be dispatched");
        };
        assert_eq!(claimed.id, ready.id);
        assert!(!service.orders.get(stuck.id).await.unwrap().dispensing_in_progress);
    }

    #[tokio::test]
    async fn test_oldest_order_first() {
        let (service, machine, clock) = service().await;
        let a = seed(&service, "A", "CHARIOT1").await;
        let first = order(&service, &machine, vec![line(a, 1)]).await;
        clock.advance(Duration::seconds(1));
        order(&service, &machine, vec![line(a, 1)]).await;

        assert_eq!(
            service.dispensing.pending_order(&machine).await.unwrap().map(|o| o.id),
            Some(first.id)
        );
        let Some(Claim::Dispatched(claimed)) = service.dispensing.next_order_for_machine(&machine).await.unwrap()
        else {
            panic!("expected a dispatched order");
        };
        assert_eq!(claimed.id, first.id);
    }

    #[tokio::test]
    async fn test_detection_waits_for_every_lane() {
        let (service, machine, _) = service().await;
        let a = seed(&service, "A", "CHARIOT1").await;
        let b = seed(&service, "B", "CHARIOT2").await;
        let created = order(&service, &machine, vec![line(a, 2), line(b, 1)]).await;
        service.dispensing.next_order_for_machine(&machine).await.unwrap();

        service.dispensing.report_detection(created.id, 1, 2).await.unwrap();
        let view = service.dispensing.order_status(created.id).await.unwrap();
        assert!(view.dispensing_status.is_dispensing_in_progress);
        assert!(!view.dispensing_status.all_products_detected);

        service.dispensing.report_detection(created.id, 2, 1).await.unwrap();
        let view = service.dispensing.order_status(created.id).await.unwrap();
        assert_eq!(view.status, OrderStatus::Processing);
        assert!(view.dispensing_status.all_products_detected);
        assert!(view.dispensing_status.dispensed_at.is_some());

        assert!(matches!(
            service.dispensing.report_detection(created.id, 3, 0).await,
            Err(VendingError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_completion_frees_machine_for_next_order() {
        let (service, machine, _) = service().await;
        let a = seed(&service, "A", "CHARIOT1").await;
        let first = order(&service, &machine, vec![line(a, 1)]).await;
        service.dispensing.next_order_for_machine(&machine).await.unwrap();
        service.orders.complete_dispensing(first.id, &machine, None).await.unwrap();

        let released = service.machines.get(&machine).await.unwrap();
        assert_eq!(released.status, MachineStatus::Available);
        assert_eq!(released.last_completed_order, Some(first.id));
        assert_eq!(service.dispensing.pending_order(&machine).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_offline_machine_is_unavailable() {
        let (service, machine, _) = service().await;
        service.machines.set_status(&machine, MachineStatus::Offline).await.unwrap();
        assert!(matches!(
            service.dispensing.next_order_for_machine(&machine).await,
            Err(VendingError::Unavailable(_))
        ));
    }
}
