use crate::domain::ports::{Record, Repository, Stores};
use crate::error::{Result, VendingError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for any record kind.
///
/// Uses `Arc<RwLock<HashMap<Id, T>>>` for shared concurrent access. Every
/// write takes the write lock, so the version check and the write happen
/// as one step.
#[derive(Clone)]
pub struct InMemoryRepository<T: Record> {
    records: Arc<RwLock<HashMap<T::Id, T>>>,
}

impl<T: Record> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<T: Record> InMemoryRepository<T> {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_version<T: Record>(records: &HashMap<T::Id, T>, record: &T) -> Result<()> {
    match records.get(&record.id()) {
        Some(stored) if stored.version() == record.version() => Ok(()),
        Some(_) => Err(VendingError::conflict(T::KIND, record.id())),
        None => Err(VendingError::not_found(T::KIND, record.id())),
    }
}

#[async_trait]
impl<T: Record> Repository<T> for InMemoryRepository<T> {
    async fn get(&self, id: &T::Id) -> Result<Option<T>> {
        let records = self.records.read().await;
        Ok(records.get(id).cloned())
    }

    async fn insert(&self, mut record: T) -> Result<T> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id()) {
            return Err(VendingError::conflict(T::KIND, record.id()));
        }
        record.set_version(1);
        records.insert(record.id(), record.clone());
        Ok(record)
    }

    async fn replace(&self, mut record: T) -> Result<T> {
        let mut records = self.records.write().await;
        check_version(&records, &record)?;
        record.set_version(record.version() + 1);
        records.insert(record.id(), record.clone());
        Ok(record)
    }

    async fn replace_all(&self, records_in: Vec<T>) -> Result<Vec<T>> {
        let mut records = self.records.write().await;
        for record in &records_in {
            check_version(&records, record)?;
        }
        let mut stored = Vec::with_capacity(records_in.len());
        for mut record in records_in {
            record.set_version(record.version() + 1);
            records.insert(record.id(), record.clone());
            stored.push(record);
        }
        Ok(stored)
    }

    async fn list(&self) -> Result<Vec<T>> {
        let records = self.records.read().await;
        Ok(records.values().cloned().collect())
    }
}

impl Stores {
    /// A full set of empty in-memory stores.
    pub fn in_memory() -> Self {
        Self {
            orders: Arc::new(InMemoryRepository::new()),
            products: Arc::new(InMemoryRepository::new()),
            carriers: Arc::new(InMemoryRepository::new()),
            wallets: Arc::new(InMemoryRepository::new()),
            codes: Arc::new(InMemoryRepository::new()),
            machines: Arc::new(InMemoryRepository::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Amount;
    use crate::domain::product::Product;
    use rust_decimal_macros::dec;

    fn product(quantity: u32) -> Product {
        Product::new("Cola", "soda", Amount::new(dec!(50)).unwrap(), quantity)
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryRepository::new();
        let stored = store.insert(product(3)).await.unwrap();
        assert_eq!(stored.version, 1);

        let retrieved = store.get(&stored.id).await.unwrap().unwrap();
        assert_eq!(retrieved, stored);
        assert!(store.insert(stored.clone()).await.is_err());
    }

    #[tokio::test]
    async fn test_replace_is_compare_and_swap() {
        let store = InMemoryRepository::new();
        let stored = store.insert(product(3)).await.unwrap();

        let mut first = stored.clone();
        first.quantity = 2;
        let mut second = stored.clone();
        second.quantity = 1;

        let first = store.replace(first).await.unwrap();
        assert_eq!(first.version, 2);
        assert!(matches!(
            store.replace(second).await,
            Err(VendingError::Conflict { .. })
        ));
        assert_eq!(store.fetch(&stored.id).await.unwrap().quantity, 2);
    }

    #[tokio::test]
    async fn test_replace_all_is_all_or_nothing() {
        let store = InMemoryRepository::new();
        let a = store.insert(product(3)).await.unwrap();
        let b = store.insert(product(3)).await.unwrap();

        // Bump b so the batch below carries a stale copy of it.
        let mut bumped = b.clone();
        bumped.quantity = 0;
        store.replace(bumped).await.unwrap();

        let mut stale_a = a.clone();
        stale_a.quantity = 1;
        let mut stale_b = b.clone();
        stale_b.quantity = 1;
        assert!(store.replace_all(vec![stale_a, stale_b]).await.is_err());
        assert_eq!(store.fetch(&a.id).await.unwrap().quantity, 3);
    }

    #[tokio::test]
    async fn test_fetch_missing_is_not_found() {
        let store: InMemoryRepository<Product> = InMemoryRepository::new();
        let missing = product(1).id;
        assert!(matches!(
            store.fetch(&missing).await,
            Err(VendingError::NotFound { entity: "product", .. })
        ));
    }
}
