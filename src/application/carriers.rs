use super::retry::retry_transient;
use crate::domain::carrier::Carrier;
use crate::domain::ids::{CarrierId, ProductId};
use crate::domain::ports::{CarrierStoreBox, ProductStoreBox};
use crate::error::{Result, VendingError};
use tracing::{info, instrument};

/// Keeps carriers within capacity and single-typed, and keeps each
/// product's carrier link in step with the carrier's contents.
///
/// A carrier mutation and the matching product link change are written
/// in two CAS steps; if the second one fails the first is undone.
#[derive(Clone)]
pub struct CarrierManager {
    carriers: CarrierStoreBox,
    products: ProductStoreBox,
    default_capacity: usize,
    retry_attempts: u32,
}

impl CarrierManager {
    pub fn new(
        carriers: CarrierStoreBox,
        products: ProductStoreBox,
        default_capacity: usize,
        retry_attempts: u32,
    ) -> Self {
        Self {
            carriers,
            products,
            default_capacity,
            retry_attempts,
        }
    }

    /// Creates a carrier. Names are unique; `capacity` falls back to the default.
    #[instrument(skip(self))]
    pub async fn create(&self, name: &str, capacity: Option<usize>) -> Result<Carrier> {
        let carrier = Carrier::new(name, capacity.unwrap_or(self.default_capacity))?;
        if self.find_by_name(&carrier.name).await?.is_some() {
            return Err(VendingError::ValidationError(format!(
                "Carrier {} already exists",
                carrier.name
            )));
        }
        let carrier = self.carriers.insert(carrier).await?;
        info!(carrier = %carrier.name, capacity = carrier.capacity, "carrier created");
        Ok(carrier)
    }

    /// Returns the carrier called `name`, creating it with the default capacity.
    pub async fn get_or_create(&self, name: &str) -> Result<Carrier> {
        match self.find_by_name(name).await? {
            Some(carrier) => Ok(carrier),
            None => self.create(name, None).await,
        }
    }

    pub async fn get(&self, id: CarrierId) -> Result<Carrier> {
        self.carriers.fetch(&id).await
    }

    pub async fn list(&self) -> Result<Vec<Carrier>> {
        let mut carriers = self.carriers.list().await?;
        carriers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(carriers)
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Carrier>> {
        let name = name.trim();
        Ok(self
            .carriers
            .list()
            .await?
            .into_iter()
            .find(|carrier| carrier.name == name))
    }

    pub async fn can_accept(&self, id: CarrierId) -> Result<bool> {
        Ok(self.get(id).await?.can_accept())
    }

    /// Places one unit of `product` into the carrier and links the product to it.
    #[instrument(skip(self))]
    pub async fn add_product(&self, id: CarrierId, product: ProductId) -> Result<Carrier> {
        let carrier = retry_transient(self.retry_attempts, move || async move {
            let linked = self.products.fetch(&product).await?;
            if let Some(other) = linked.carrier
                && other != id
            {
                return Err(VendingError::InvalidState(format!(
                    "product {} is already assigned to carrier {other}",
                    linked.name
                )));
            }
            let mut carrier = self.carriers.fetch(&id).await?;
            carrier.add_product(product, &linked.kind)?;
            self.carriers.replace(carrier).await
        })
        .await?;

        if let Err(err) = self.link(product, Some(id)).await {
            self.undo(id, move |carrier| carrier.remove_product(product)).await;
            return Err(err);
        }
        info!(carrier = %carrier.name, count = carrier.count(), "product added to carrier");
        Ok(carrier)
    }

    /// Removes one unit of `product`. The product stays linked while other
    /// units of it remain in the carrier.
    #[instrument(skip(self))]
    pub async fn remove_product(&self, id: CarrierId, product: ProductId) -> Result<Carrier> {
        let carrier = retry_transient(self.retry_attempts, move || async move {
            let mut carrier = self.carriers.fetch(&id).await?;
            carrier.remove_product(product)?;
            self.carriers.replace(carrier).await
        })
        .await?;

        if !carrier.contains(product) {
            self.unlink(product, id).await?;
        }
        info!(carrier = %carrier.name, count = carrier.count(), "product removed from carrier");
        Ok(carrier)
    }

    /// Clears the carrier and unlinks every product it held.
    #[instrument(skip(self))]
    pub async fn empty(&self, id: CarrierId) -> Result<Carrier> {
        let (carrier, removed) = retry_transient(self.retry_attempts, move || async move {
            let mut carrier = self.carriers.fetch(&id).await?;
            let removed = carrier.empty();
            Ok((self.carriers.replace(carrier).await?, removed))
        })
        .await?;

        for product in removed {
            self.unlink(product, id).await?;
        }
        info!(carrier = %carrier.name, "carrier emptied");
        Ok(carrier)
    }

    async fn link(&self, product: ProductId, carrier: Option<CarrierId>) -> Result<()> {
        retry_transient(self.retry_attempts, move || async move {
            let mut stored = self.products.fetch(&product).await?;
            if stored.carrier == carrier {
                return Ok(());
            }
            stored.carrier = carrier;
            self.products.replace(stored).await.map(|_| ())
        })
        .await
    }

    /// Drops the product's carrier link if it still points at `carrier`.
    async fn unlink(&self, product: ProductId, carrier: CarrierId) -> Result<()> {
        retry_transient(self.retry_attempts, move || async move {
            let Some(mut stored) = self.products.get(&product).await? else {
                return Ok(());
            };
            if stored.carrier != Some(carrier) {
                return Ok(());
            }
            stored.carrier = None;
            self.products.replace(stored).await.map(|_| ())
        })
        .await
    }

    async fn undo<F>(&self, id: CarrierId, revert: F)
    where
        F: Fn(&mut Carrier) -> Result<()> + Send + Sync,
    {
        let revert = &revert;
        let result = retry_transient(self.retry_attempts, move || async move {
            let mut carrier = self.carriers.fetch(&id).await?;
            revert(&mut carrier)?;
            self.carriers.replace(carrier).await
        })
        .await;
        if let Err(err) = result {
            tracing::error!(carrier = %id, error = %err, "failed to undo carrier change");
        }
    }
}
