use crate::domain::carrier::Carrier;
use crate::domain::code::PaymentCode;
use crate::domain::machine::Machine;
use crate::domain::order::Order;
use crate::domain::ports::{Record, Repository, Stores};
use crate::domain::product::Product;
use crate::domain::wallet::Wallet;
use crate::error::{Result, VendingError};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// One column family per record kind, named after `Record::KIND`.
pub const COLUMN_FAMILIES: [&str; 6] = [
    Order::KIND,
    Product::KIND,
    Carrier::KIND,
    Wallet::KIND,
    PaymentCode::KIND,
    Machine::KIND,
];

/// A persistent store implementation using RocksDB.
///
/// Records are stored as JSON under their id. RocksDB has no conditional
/// put, so every write path takes `write_lock` to make the version check
/// and the write a single step within this process.
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the specified path, creating
    /// any missing column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, descriptors).map_err(VendingError::storage)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn repository<T: Record>(&self) -> RocksDbRepository<T> {
        RocksDbRepository {
            store: self.clone(),
            _record: PhantomData,
        }
    }

    /// A full set of stores backed by this database.
    pub fn stores(&self) -> Stores {
        Stores {
            orders: Arc::new(self.repository::<Order>()),
            products: Arc::new(self.repository::<Product>()),
            carriers: Arc::new(self.repository::<Carrier>()),
            wallets: Arc::new(self.repository::<Wallet>()),
            codes: Arc::new(self.repository::<PaymentCode>()),
            machines: Arc::new(self.repository::<Machine>()),
        }
    }
}

/// Typed view over one column family of a [`RocksDbStore`].
pub struct RocksDbRepository<T: Record> {
    store: RocksDbStore,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> RocksDbRepository<T> {
    fn cf(&self) -> Result<&rocksdb::ColumnFamily> {
        self.store.db.cf_handle(T::KIND).ok_or_else(|| {
            VendingError::storage(std::io::Error::other(format!(
                "{} column family not found",
                T::KIND
            )))
        })
    }

    fn key(id: &T::Id) -> Vec<u8> {
        id.to_string().into_bytes()
    }

    fn read(&self, id: &T::Id) -> Result<Option<T>> {
        let cf = self.cf()?;
        match self.store.db.get_cf(cf, Self::key(id)).map_err(VendingError::storage)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn check_version(&self, record: &T) -> Result<()> {
        match self.read(&record.id())? {
            Some(stored) if stored.version() == record.version() => Ok(()),
            Some(_) => Err(VendingError::conflict(T::KIND, record.id())),
            None => Err(VendingError::not_found(T::KIND, record.id())),
        }
    }
}

#[async_trait]
impl<T: Record> Repository<T> for RocksDbRepository<T> {
    async fn get(&self, id: &T::Id) -> Result<Option<T>> {
        self.read(id)
    }

    async fn insert(&self, mut record: T) -> Result<T> {
        let _guard = self.store.write_lock.lock().await;
        if self.read(&record.id())?.is_some() {
            return Err(VendingError::conflict(T::KIND, record.id()));
        }
        record.set_version(1);
        let cf = self.cf()?;
        self.store
            .db
            .put_cf(cf, Self::key(&record.id()), serde_json::to_vec(&record)?)
            .map_err(VendingError::storage)?;
        Ok(record)
    }

    async fn replace(&self, record: T) -> Result<T> {
        let mut stored = self.replace_all(vec![record]).await?;
        stored
            .pop()
            .ok_or_else(|| VendingError::InternalError("empty replace batch".to_string()))
    }

    async fn replace_all(&self, records: Vec<T>) -> Result<Vec<T>> {
        let _guard = self.store.write_lock.lock().await;
        for record in &records {
            self.check_version(record)?;
        }

        let cf = self.cf()?;
        let mut batch = WriteBatch::default();
        let mut stored = Vec::with_capacity(records.len());
        for mut record in records {
            record.set_version(record.version() + 1);
            batch.put_cf(cf, Self::key(&record.id()), serde_json::to_vec(&record)?);
            stored.push(record);
        }
        self.store.db.write(batch).map_err(VendingError::storage)?;
        Ok(stored)
    }

    async fn list(&self) -> Result<Vec<T>> {
        let cf = self.cf()?;
        let mut records = Vec::new();
        for item in self.store.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item.map_err(VendingError::storage)?;
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }
}
