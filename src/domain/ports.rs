use super::carrier::Carrier;
use super::code::PaymentCode;
use super::machine::Machine;
use super::notification::Notification;
use super::order::Order;
use super::product::Product;
use super::wallet::Wallet;
use crate::error::{Result, VendingError};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;

/// A durable record addressed by id and protected by an optimistic version.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Human readable entity name, used in errors and as the storage namespace.
    const KIND: &'static str;

    type Id: Clone + Eq + Hash + Display + Serialize + DeserializeOwned + Send + Sync + 'static;

    fn id(&self) -> Self::Id;
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
}

/// Storage port shared by every record kind.
///
/// `replace` and `replace_all` are compare-and-swap writes: a record is
/// accepted only if the stored version still equals `record.version()`.
/// On success the store bumps the version and returns the stored copy.
#[async_trait]
pub trait Repository<T: Record>: Send + Sync {
    async fn get(&self, id: &T::Id) -> Result<Option<T>>;

    /// Stores a new record at version 1. Fails with `Conflict` if the id exists.
    async fn insert(&self, record: T) -> Result<T>;

    async fn replace(&self, record: T) -> Result<T>;

    /// Applies every replacement or none of them.
    async fn replace_all(&self, records: Vec<T>) -> Result<Vec<T>>;

    async fn list(&self) -> Result<Vec<T>>;

    async fn fetch(&self, id: &T::Id) -> Result<T> {
        self.get(id)
            .await?
            .ok_or_else(|| VendingError::not_found(T::KIND, id))
    }
}

pub type OrderStoreBox = Arc<dyn Repository<Order>>;
pub type ProductStoreBox = Arc<dyn Repository<Product>>;
pub type CarrierStoreBox = Arc<dyn Repository<Carrier>>;
pub type WalletStoreBox = Arc<dyn Repository<Wallet>>;
pub type CodeStoreBox = Arc<dyn Repository<PaymentCode>>;
pub type MachineStoreBox = Arc<dyn Repository<Machine>>;

/// Delivery of user and technician facing notifications.
///
/// Delivery is best effort: a failing notifier never rolls back a transition.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification);
}

pub type NotifierBox = Arc<dyn Notifier>;

/// The full set of stores a running coordinator works against.
#[derive(Clone)]
pub struct Stores {
    pub orders: OrderStoreBox,
    pub products: ProductStoreBox,
    pub carriers: CarrierStoreBox,
    pub wallets: WalletStoreBox,
    pub codes: CodeStoreBox,
    pub machines: MachineStoreBox,
}
