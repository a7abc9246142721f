use super::ids::{CarrierId, ProductId};
use super::money::Amount;
use super::ports::Record;
use crate::error::VendingError;
use serde::{Deserialize, Serialize};

/// A sellable product and its available (unreserved) quantity.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// The type tag a carrier enforces; products of different kinds never share a carrier.
    pub kind: String,
    pub price: Amount,
    pub quantity: u32,
    pub carrier: Option<CarrierId>,
    pub version: u64,
}

impl Product {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, price: Amount, quantity: u32) -> Self {
        Self {
            id: ProductId::new(),
            name: name.into(),
            kind: kind.into(),
            price,
            quantity,
            carrier: None,
            version: 0,
        }
    }

    /// Takes `quantity` units out of the available stock.
    pub fn reserve(&mut self, quantity: u32) -> Result<(), VendingError> {
        if self.quantity < quantity {
            return Err(VendingError::InsufficientStock {
                product: self.name.clone(),
                requested: quantity,
                available: self.quantity,
            });
        }
        self.quantity -= quantity;
        Ok(())
    }

    pub fn restock(&mut self, quantity: u32) {
        self.quantity = self.quantity.saturating_add(quantity);
    }
}

impl Record for Product {
    const KIND: &'static str = "product";
    type Id = ProductId;

    fn id(&self) -> ProductId {
        self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reserve_and_restock() {
        let mut product = Product::new("Cola", "soda", Amount::new(dec!(50)).unwrap(), 3);
        product.reserve(2).unwrap();
        assert_eq!(product.quantity, 1);

        assert!(matches!(
            product.reserve(2),
            Err(VendingError::InsufficientStock { available: 1, .. })
        ));
        product.restock(2);
        assert_eq!(product.quantity, 3);
    }
}
