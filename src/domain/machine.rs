use super::ids::{MachineId, OrderId, ProductId};
use super::ports::Record;
use crate::error::VendingError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MachineStatus {
    Available,
    Busy,
    Maintenance,
    Offline,
}

/// Binds a physical lane ("couloir") to the product it dispenses.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LaneMapping {
    pub lane: u8,
    pub product: ProductId,
    pub stock_level: u32,
}

/// A registered vending machine.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    pub id: MachineId,
    pub name: String,
    pub location: String,
    pub status: MachineStatus,
    pub lanes: Vec<LaneMapping>,
    pub current_order: Option<OrderId>,
    pub last_completed_order: Option<OrderId>,
    pub last_failed_order: Option<OrderId>,
    pub last_communication: DateTime<Utc>,
    pub version: u64,
}

impl Machine {
    pub fn new(
        id: MachineId,
        name: impl Into<String>,
        location: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            location: location.into(),
            status: MachineStatus::Available,
            lanes: Vec::new(),
            current_order: None,
            last_completed_order: None,
            last_failed_order: None,
            last_communication: at,
            version: 0,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == MachineStatus::Available
    }

    pub fn lane_for(&self, product: ProductId) -> Option<u8> {
        self.lanes
            .iter()
            .find(|mapping| mapping.product == product)
            .map(|mapping| mapping.lane)
    }

    /// Replaces the lane table. Lanes must be unique and within `1..=lane_count`.
    pub fn set_lanes(&mut self, lanes: Vec<LaneMapping>, lane_count: u8) -> Result<(), VendingError> {
        let mut seen = HashSet::new();
        for mapping in &lanes {
            if mapping.lane < 1 || mapping.lane > lane_count {
                return Err(VendingError::ValidationError(format!(
                    "Lane must be between 1 and {lane_count}, got {}",
                    mapping.lane
                )));
            }
            if !seen.insert(mapping.lane) {
                return Err(VendingError::ValidationError(format!(
                    "Lane {} is mapped more than once",
                    mapping.lane
                )));
            }
        }
        self.lanes = lanes;
        Ok(())
    }

    /// Adds `delta` to a lane's stock counter, clamping at zero. Returns the new level.
    pub fn adjust_stock(&mut self, lane: u8, delta: i64) -> Result<u32, VendingError> {
        let mapping = self
            .lanes
            .iter_mut()
            .find(|mapping| mapping.lane == lane)
            .ok_or_else(|| VendingError::not_found("lane", lane))?;
        let level = (i64::from(mapping.stock_level) + delta).clamp(0, i64::from(u32::MAX));
        mapping.stock_level = level as u32;
        Ok(mapping.stock_level)
    }
}

impl Record for Machine {
    const KIND: &'static str = "machine";
    type Id = MachineId;

    fn id(&self) -> MachineId {
        self.id.clone()
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}
