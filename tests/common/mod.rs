#![allow(dead_code)]

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use vending_coordinator::application::VendingService;
use vending_coordinator::application::orders::OrderLine;
use vending_coordinator::config::Settings;
use vending_coordinator::domain::clock::ManualClock;
use vending_coordinator::domain::ids::{MachineId, ProductId, UserId};
use vending_coordinator::domain::money::Amount;
use vending_coordinator::domain::product::Product;
use vending_coordinator::domain::ports::Stores;
use vending_coordinator::infrastructure::notifier::RecordingNotifier;

pub struct Harness {
    pub service: VendingService,
    pub clock: ManualClock,
    pub notifier: RecordingNotifier,
    pub machine: MachineId,
}

pub async fn harness() -> Harness {
    harness_with(Settings::default()).await
}

/// A coordinator over in-memory stores with one registered machine, `VM001`.
pub async fn harness_with(settings: Settings) -> Harness {
    let clock = ManualClock::new(Utc::now());
    let notifier = RecordingNotifier::new();
    let service = VendingService::new(
        Stores::in_memory(),
        Arc::new(notifier.clone()),
        Arc::new(clock.clone()),
        settings,
    );
    let machine = MachineId::from("VM001");
    service
        .machines
        .register(machine.clone(), "Lobby", "Ground floor")
        .await
        .unwrap();
    Harness {
        service,
        clock,
        notifier,
        machine,
    }
}

impl Harness {
    pub async fn seed(&self, name: &str, kind: &str, price: Decimal, quantity: u32, chariot: &str) -> ProductId {
        let product = Product::new(name, kind, amount(price), quantity);
        self.service.seed_product(product, Some(chariot)).await.unwrap().id
    }

    pub async fn stock(&self, product: ProductId) -> u32 {
        self.service.stores.products.fetch(&product).await.unwrap().quantity
    }

    pub async fn funded_user(&self, balance: Decimal) -> UserId {
        let user = UserId::new();
        self.service.wallets.deposit(user, amount(balance)).await.unwrap();
        user
    }
}

pub fn amount(value: Decimal) -> Amount {
    Amount::new(value).unwrap()
}

pub fn line(product: ProductId, quantity: u32) -> OrderLine {
    OrderLine { product, quantity }
}
