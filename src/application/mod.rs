//! Application layer: the services that own each record kind and the
//! [`VendingService`] bundle wiring them to one set of stores.

pub mod carriers;
pub mod codes;
pub mod dispensing;
pub mod machines;
pub mod orders;
pub mod retry;
pub mod wallet;

use crate::config::Settings;
use crate::domain::clock::ClockBox;
use crate::domain::ports::{NotifierBox, Stores};
use crate::domain::product::Product;
use crate::error::Result;
use carriers::CarrierManager;
use codes::{CodeIssuer, ExpirySweeper};
use dispensing::DispensingCoordinator;
use machines::MachineRegistry;
use orders::OrderEngine;
use tokio_util::sync::CancellationToken;
use tracing::info;
use wallet::WalletLedger;

/// Every service of the coordinator, sharing one set of stores, one
/// notifier and one clock.
#[derive(Clone)]
pub struct VendingService {
    pub stores: Stores,
    pub settings: Settings,
    pub wallets: WalletLedger,
    pub carriers: CarrierManager,
    pub machines: MachineRegistry,
    pub orders: OrderEngine,
    pub dispensing: DispensingCoordinator,
    pub codes: CodeIssuer,
}

impl VendingService {
    pub fn new(stores: Stores, notifier: NotifierBox, clock: ClockBox, settings: Settings) -> Self {
        let retry = settings.retry_attempts;
        let wallets = WalletLedger::new(stores.wallets.clone(), clock.clone(), settings.wallet_cap, retry);
        let carriers = CarrierManager::new(
            stores.carriers.clone(),
            stores.products.clone(),
            settings.carrier_capacity,
            retry,
        );
        let machines = MachineRegistry::new(
            stores.machines.clone(),
            stores.products.clone(),
            notifier.clone(),
            clock.clone(),
            settings.lane_count,
            settings.low_stock_threshold,
            retry,
        );
        let orders = OrderEngine::new(
            stores.orders.clone(),
            stores.products.clone(),
            wallets.clone(),
            machines.clone(),
            notifier.clone(),
            clock.clone(),
            settings.wallet_charge,
            retry,
        );
        let dispensing = DispensingCoordinator::new(
            stores.orders.clone(),
            stores.products.clone(),
            stores.carriers.clone(),
            machines.clone(),
            clock.clone(),
            retry,
        );
        let codes = CodeIssuer::new(
            stores.codes.clone(),
            orders.clone(),
            machines.clone(),
            notifier,
            clock,
            settings.code_ttl,
            retry,
        );

        Self {
            stores,
            settings,
            wallets,
            carriers,
            machines,
            orders,
            dispensing,
            codes,
        }
    }

    /// Adds a catalog product, placing it into the carrier named `carrier`
    /// (created with the default capacity if missing).
    ///
    /// The carrier is checked first, so a rejected row stores nothing.
    pub async fn seed_product(&self, product: Product, carrier: Option<&str>) -> Result<Product> {
        let Some(name) = carrier.map(str::trim).filter(|name| !name.is_empty()) else {
            return self.stores.products.insert(product).await;
        };

        let carrier = self.carriers.get_or_create(name).await?;
        carrier.clone().add_product(product.id, &product.kind)?;

        let product = self.stores.products.insert(product).await?;
        self.carriers.add_product(carrier.id, product.id).await?;
        info!(product = %product.name, carrier = %carrier.name, "product seeded");
        self.stores.products.fetch(&product.id).await
    }

    /// A sweeper expiring payment codes on the configured interval.
    pub fn expiry_sweeper(&self, shutdown: CancellationToken) -> ExpirySweeper {
        ExpirySweeper::new(self.codes.clone(), self.settings.sweep_interval, shutdown)
    }
}
