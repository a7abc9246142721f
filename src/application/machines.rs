use super::retry::retry_transient;
use crate::domain::clock::ClockBox;
use crate::domain::ids::{MachineId, OrderId};
use crate::domain::machine::{LaneMapping, Machine, MachineStatus};
use crate::domain::notification::Notification;
use crate::domain::ports::{MachineStoreBox, NotifierBox, ProductStoreBox};
use crate::error::{Result, VendingError};
use tracing::{info, instrument, warn};

/// How a dispensing run ended, as far as the machine is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed,
    /// The claim was handed back without dispensing anything.
    Abandoned,
}

/// Keyed registry of vending machines and their lane tables.
#[derive(Clone)]
pub struct MachineRegistry {
    machines: MachineStoreBox,
    products: ProductStoreBox,
    notifier: NotifierBox,
    clock: ClockBox,
    lane_count: u8,
    low_stock_threshold: u32,
    retry_attempts: u32,
}

impl MachineRegistry {
    pub fn new(
        machines: MachineStoreBox,
        products: ProductStoreBox,
        notifier: NotifierBox,
        clock: ClockBox,
        lane_count: u8,
        low_stock_threshold: u32,
        retry_attempts: u32,
    ) -> Self {
        Self {
            machines,
            products,
            notifier,
            clock,
            lane_count,
            low_stock_threshold,
            retry_attempts,
        }
    }

    pub fn lane_count(&self) -> u8 {
        self.lane_count
    }

    /// Registers a machine, or updates name and location if it already exists.
    #[instrument(skip(self))]
    pub async fn register(&self, id: MachineId, name: &str, location: &str) -> Result<Machine> {
        if id.as_str().trim().is_empty() {
            return Err(VendingError::ValidationError(
                "Machine id is required".to_string(),
            ));
        }
        let id = &id;
        retry_transient(self.retry_attempts, move || async move {
            match self.machines.get(id).await? {
                Some(mut machine) => {
                    machine.name = name.to_string();
                    machine.location = location.to_string();
                    self.machines.replace(machine).await
                }
                None => {
                    let machine = Machine::new(id.clone(), name, location, self.clock.now());
                    let machine = self.machines.insert(machine).await?;
                    info!(machine = %machine.id, "machine registered");
                    Ok(machine)
                }
            }
        })
        .await
    }

    pub async fn get(&self, id: &MachineId) -> Result<Machine> {
        self.machines.fetch(id).await
    }

    pub async fn list(&self) -> Result<Vec<Machine>> {
        let mut machines = self.machines.list().await?;
        machines.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(machines)
    }

    /// Fails unless the machine exists and can take a new order.
    pub async fn ensure_available(&self, id: &MachineId) -> Result<Machine> {
        let machine = self.get(id).await?;
        if !machine.is_available() {
            return Err(VendingError::Unavailable(format!(
                "vending machine {id} is {:?}",
                machine.status
            )));
        }
        Ok(machine)
    }

    #[instrument(skip(self))]
    pub async fn set_status(&self, id: &MachineId, status: MachineStatus) -> Result<Machine> {
        self.update(id, move |machine, now| {
            if status == MachineStatus::Available {
                machine.current_order = None;
            }
            machine.status = status;
            machine.last_communication = now;
            Ok(())
        })
        .await
    }

    /// Replaces the lane table after checking every referenced product exists.
    #[instrument(skip(self, lanes))]
    pub async fn update_lane_mapping(&self, id: &MachineId, lanes: Vec<LaneMapping>) -> Result<Machine> {
        for mapping in &lanes {
            self.products.fetch(&mapping.product).await?;
        }
        let lane_count = self.lane_count;
        let lanes = &lanes;
        self.update(id, move |machine, _| machine.set_lanes(lanes.clone(), lane_count))
            .await
    }

    /// Adjusts one lane's physical stock counter and warns when it runs low.
    #[instrument(skip(self))]
    pub async fn adjust_stock(&self, id: &MachineId, lane: u8, delta: i64) -> Result<u32> {
        let machine = self
            .update(id, move |machine, _| machine.adjust_stock(lane, delta).map(|_| ()))
            .await?;
        let level = machine
            .lanes
            .iter()
            .find(|mapping| mapping.lane == lane)
            .map(|mapping| mapping.stock_level)
            .unwrap_or_default();

        if level <= self.low_stock_threshold {
            warn!(machine = %id, lane, level, "lane stock is low");
            self.notifier
                .notify(Notification::LowStock {
                    machine: id.clone(),
                    lane,
                    level,
                })
                .await;
        }
        Ok(level)
    }

    /// Marks the machine busy with `order`. Fails with `Unavailable` if it is
    /// not `Available`.
    pub async fn claim(&self, id: &MachineId, order: OrderId) -> Result<Machine> {
        self.update(id, move |machine, now| {
            if !machine.is_available() {
                return Err(VendingError::Unavailable(format!(
                    "vending machine {} is {:?}",
                    machine.id, machine.status
                )));
            }
            machine.status = MachineStatus::Busy;
            machine.current_order = Some(order);
            machine.last_communication = now;
            Ok(())
        })
        .await
    }

    /// Hands the machine back after a run on `order`.
    ///
    /// A machine put into maintenance or taken offline meanwhile keeps that status.
    pub async fn release(&self, id: &MachineId, order: OrderId, outcome: RunOutcome) -> Result<Machine> {
        self.update(id, move |machine, now| {
            if machine.status == MachineStatus::Busy
                && machine.current_order.is_none_or(|current| current == order)
            {
                machine.status = MachineStatus::Available;
            }
            if machine.current_order == Some(order) {
                machine.current_order = None;
            }
            match outcome {
                RunOutcome::Completed => machine.last_completed_order = Some(order),
                RunOutcome::Failed => machine.last_failed_order = Some(order),
                RunOutcome::Abandoned => {}
            }
            machine.last_communication = now;
            Ok(())
        })
        .await
    }

    async fn update<F>(&self, id: &MachineId, mutate: F) -> Result<Machine>
    where
        F: Fn(&mut Machine, chrono::DateTime<chrono::Utc>) -> Result<()> + Send + Sync,
    {
        let mutate = &mutate;
        retry_transient(self.retry_attempts, move || async move {
            let mut machine = self.machines.fetch(id).await?;
            mutate(&mut machine, self.clock.now())?;
            self.machines.replace(machine).await
        })
        .await
    }
}
