mod common;

use common::{amount, harness, line};
use rust_decimal_macros::dec;
use vending_coordinator::application::dispensing::Claim;
use vending_coordinator::domain::ids::UserId;
use vending_coordinator::domain::order::PaymentMethod;
use vending_coordinator::error::VendingError;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_polls_dispatch_at_most_one_order() {
    let h = harness().await;
    let cola = h.seed("Cola", "soda", dec!(75), 20, "CHARIOT1").await;
    for _ in 0..3 {
        h.service
            .orders
            .create(UserId::new(), &[line(cola, 1)], PaymentMethod::Card, h.machine.clone())
            .await
            .unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..16 {
        let service = h.service.clone();
        let machine = h.machine.clone();
        handles.push(tokio::spawn(async move {
            service.dispensing.next_order_for_machine(&machine).await
        }));
    }

    let mut dispatched = Vec::new();
    for handle in handles {
        if let Ok(Some(Claim::Dispatched(order))) = handle.await.unwrap() {
            dispatched.push(order.id);
        }
    }
    assert_eq!(dispatched.len(), 1);

    let machine = h.service.machines.get(&h.machine).await.unwrap();
    assert_eq!(machine.current_order, Some(dispatched[0]));
    let in_progress = h
        .service
        .stores
        .orders
        .list()
        .await
        .unwrap()
        .into_iter()
        .filter(|order| order.dispensing_in_progress)
        .count();
    assert_eq!(in_progress, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_orders_never_oversell() {
    let h = harness().await;
    let cola = h.seed("Cola", "soda", dec!(75), 5, "CHARIOT1").await;

    let mut handles = Vec::new();
    for _ in 0..12 {
        let service = h.service.clone();
        let machine = h.machine.clone();
        handles.push(tokio::spawn(async move {
            service
                .orders
                .create(UserId::new(), &[line(cola, 1)], PaymentMethod::Card, machine)
                .await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(VendingError::InsufficientStock { .. } | VendingError::Conflict { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert!(created <= 5);
    assert_eq!(h.stock(cola).await, 5 - created);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_deposits_respect_the_cap() {
    let h = harness().await;
    let user = UserId::new();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let service = h.service.clone();
        handles.push(tokio::spawn(async move {
            service.wallets.deposit(user, amount(dec!(1000))).await
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            accepted += 1;
        }
    }
    let balance = h.service.wallets.balance(user).await.unwrap().0;
    assert!(balance <= dec!(5000));
    assert_eq!(balance, dec!(1000) * rust_decimal::Decimal::from(accepted));

    let wallet = h.service.wallets.wallet(user).await.unwrap();
    assert_eq!(wallet.journal_total(), wallet.balance);
}
