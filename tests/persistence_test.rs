#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use rust_decimal_macros::dec;
use std::io::Write;
use std::process::Command;
use std::sync::Arc;
use tempfile::tempdir;
use vending_coordinator::application::VendingService;
use vending_coordinator::config::Settings;
use vending_coordinator::domain::clock::SystemClock;
use vending_coordinator::domain::ids::UserId;
use vending_coordinator::domain::money::Amount;
use vending_coordinator::infrastructure::notifier::LogNotifier;
use vending_coordinator::infrastructure::rocksdb::RocksDbStore;

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    let mut csv = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv, "product,name,kind,price,quantity,chariot").unwrap();
    writeln!(csv, ",Cola,soda,1.50,10,CHARIOT1").unwrap();

    // 1. First run seeds one product into CHARIOT1
    let output1 = Command::new(cargo_bin!("vending-coordinator"))
        .arg("inventory")
        .arg(csv.path())
        .arg("--db-path")
        .arg(&db_path)
        .output()
        .expect("Failed to execute command");
    assert!(output1.status.success());
    assert!(String::from_utf8_lossy(&output1.stdout).contains("CHARIOT1,10,1,Occupied,soda"));

    // 2. Second run finds the carrier from the first run and adds to it
    let output2 = Command::new(cargo_bin!("vending-coordinator"))
        .arg("inventory")
        .arg(csv.path())
        .arg("--db-path")
        .arg(&db_path)
        .output()
        .expect("Failed to execute command");
    assert!(output2.status.success());
    assert!(String::from_utf8_lossy(&output2.stdout).contains("CHARIOT1,10,2,Occupied,soda"));
}

#[tokio::test]
async fn test_wallet_survives_reopen() {
    let dir = tempdir().unwrap();
    let user = UserId::new();

    {
        let store = RocksDbStore::open(dir.path()).unwrap();
        let service = VendingService::new(store.stores(), Arc::new(LogNotifier), Arc::new(SystemClock), Settings::default());
        service.wallets.deposit(user, Amount::new(dec!(120)).unwrap()).await.unwrap();
    }

    let store = RocksDbStore::open(dir.path()).unwrap();
    let service = VendingService::new(store.stores(), Arc::new(LogNotifier), Arc::new(SystemClock), Settings::default());
    assert_eq!(service.wallets.balance(user).await.unwrap().0, dec!(120));
    assert_eq!(service.wallets.history(user).await.unwrap().len(), 1);
}
