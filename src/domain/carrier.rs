use super::ids::{CarrierId, ProductId};
use super::ports::Record;
use crate::error::VendingError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub enum CarrierStatus {
    Available,
    Occupied,
    Full,
}

/// A capacity-limited container ("chariot") holding units of one product kind.
///
/// Invariants: `products.len() <= capacity`, and `product_type` is set iff
/// `products` is non-empty. Every mutation checks them before committing.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Carrier {
    pub id: CarrierId,
    pub name: String,
    pub capacity: usize,
    pub products: Vec<ProductId>,
    pub product_type: Option<String>,
    pub status: CarrierStatus,
    pub version: u64,
}

impl Carrier {
    pub fn new(name: impl Into<String>, capacity: usize) -> Result<Self, VendingError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(VendingError::ValidationError(
                "Carrier name is required".to_string(),
            ));
        }
        if capacity == 0 {
            return Err(VendingError::ValidationError(
                "Carrier capacity must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            id: CarrierId::new(),
            name,
            capacity,
            products: Vec::new(),
            product_type: None,
            status: CarrierStatus::Available,
            version: 0,
        })
    }

    pub fn can_accept(&self) -> bool {
        self.products.len() < self.capacity
    }

    pub fn count(&self) -> usize {
        self.products.len()
    }

    /// Places one unit of `product` (of kind `kind`) into the carrier.
    pub fn add_product(&mut self, product: ProductId, kind: &str) -> Result<(), VendingError> {
        if let Some(current) = &self.product_type
            && !self.products.is_empty()
            && current != kind
        {
            return Err(VendingError::TypeConflict {
                carrier: self.name.clone(),
                current: current.clone(),
                requested: kind.to_string(),
            });
        }
        if !self.can_accept() {
            return Err(VendingError::CapacityExceeded {
                carrier: self.name.clone(),
                capacity: self.capacity,
            });
        }
        if self.products.is_empty() {
            self.product_type = Some(kind.to_string());
        }
        self.products.push(product);
        self.refresh_status();
        Ok(())
    }

    /// Removes one unit of `product`.
    pub fn remove_product(&mut self, product: ProductId) -> Result<(), VendingError> {
        let index = self
            .products
            .iter()
            .position(|p| *p == product)
            .ok_or_else(|| VendingError::not_found("product in carrier", product))?;
        self.products.remove(index);
        self.refresh_status();
        Ok(())
    }

    /// Clears the carrier and returns the distinct products it held.
    pub fn empty(&mut self) -> Vec<ProductId> {
        let mut removed = std::mem::take(&mut self.products);
        removed.sort();
        removed.dedup();
        self.refresh_status();
        removed
    }

    pub fn contains(&self, product: ProductId) -> bool {
        self.products.contains(&product)
    }

    /// Lane number encoded in the carrier name (`CHARIOT3` -> 3).
    pub fn lane_hint(&self) -> Option<u8> {
        let digits: String = self.name.chars().filter(char::is_ascii_digit).collect();
        digits.parse().ok()
    }

    fn refresh_status(&mut self) {
        self.status = if self.products.is_empty() {
            self.product_type = None;
            CarrierStatus::Available
        } else if self.products.len() >= self.capacity {
            CarrierStatus::Full
        } else {
            CarrierStatus::Occupied
        };
    }
}

impl Record for Carrier {
    const KIND: &'static str = "carrier";
    type Id = CarrierId;

    fn id(&self) -> CarrierId {
        self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}
