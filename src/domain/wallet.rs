use super::ids::{OrderId, UserId};
use super::money::{Amount, Balance};
use super::ports::Record;
use crate::error::VendingError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Payment,
    Refund,
}

/// One immutable ledger entry. Payments carry a negative amount.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct WalletTransaction {
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    pub order_ref: Option<OrderId>,
}

/// A user's e-wallet.
///
/// The balance and the transaction log are updated together, so the
/// balance always equals the sum of the logged amounts.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub user: UserId,
    pub balance: Balance,
    pub transactions: Vec<WalletTransaction>,
    pub version: u64,
}

impl Wallet {
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            balance: Balance::ZERO,
            transactions: Vec::new(),
            version: 0,
        }
    }

    /// Credits the wallet unless the result would exceed `cap`.
    pub fn deposit(
        &mut self,
        amount: Amount,
        cap: Balance,
        at: DateTime<Utc>,
    ) -> Result<(), VendingError> {
        let next = self.balance + amount.into();
        if next > cap {
            return Err(VendingError::LimitExceeded {
                limit: cap.value(),
                balance: self.balance.value(),
                remaining: (cap - self.balance).value().max(Decimal::ZERO),
            });
        }
        self.balance = next;
        self.append(TransactionType::Deposit, amount.value(), at, None);
        Ok(())
    }

    /// Withdraws funds if sufficient.
    pub fn debit(
        &mut self,
        amount: Amount,
        order_ref: Option<OrderId>,
        at: DateTime<Utc>,
    ) -> Result<(), VendingError> {
        if self.balance < amount.into() {
            return Err(VendingError::InsufficientFunds {
                balance: self.balance.value(),
                required: amount.value(),
            });
        }
        self.balance -= amount.into();
        self.append(TransactionType::Payment, -amount.value(), at, order_ref);
        Ok(())
    }

    /// Returns funds for a failed order, crediting no more than the room left
    /// under `cap`. The REFUND entry is written even when nothing fits, so the
    /// order counts as refunded. Returns the part that could not be credited.
    pub fn refund(&mut self, amount: Amount, cap: Balance, order_ref: OrderId, at: DateTime<Utc>) -> Decimal {
        let room = (cap - self.balance).value().max(Decimal::ZERO);
        let credited = amount.value().min(room);
        self.balance += Balance::new(credited);
        self.append(TransactionType::Refund, credited, at, Some(order_ref));
        amount.value() - credited
    }

    pub fn has_entry(&self, kind: TransactionType, order: OrderId) -> bool {
        self.transactions
            .iter()
            .any(|tx| tx.kind == kind && tx.order_ref == Some(order))
    }

    /// Sum of the journal; equals `balance` for any wallet built through the methods above.
    pub fn journal_total(&self) -> Balance {
        Balance::new(self.transactions.iter().map(|tx| tx.amount).sum())
    }

    fn append(
        &mut self,
        kind: TransactionType,
        amount: Decimal,
        timestamp: DateTime<Utc>,
        order_ref: Option<OrderId>,
    ) {
        self.transactions.push(WalletTransaction {
            kind,
            amount,
            timestamp,
            order_ref,
        });
    }
}

impl Record for Wallet {
    const KIND: &'static str = "wallet";
    type Id = UserId;

    fn id(&self) -> UserId {
        self.user
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

    fn amount(value: Decimal) -> Amount {
        Amount::new(value).unwrap()
    }

    #[test]
    fn test_wallet_deposit() {
        let mut wallet = Wallet::new(UserId::new());
        wallet
            .deposit(amount(dec!(10.0)), Balance::new(dec!(5000)), Utc::now())
            .unwrap();
        assert_eq!(wallet.balance, Balance::new(dec!(10.0)));
        assert_eq!(wallet.transactions[0].kind, TransactionType::Deposit);
    }

    #[test]
    fn test_wallet_deposit_over_cap() {
        let mut wallet = Wallet::new(UserId::new());
        let cap = Balance::new(dec!(5000));
        wallet.deposit(amount(dec!(4900)), cap, Utc::now()).unwrap();

        let result = wallet.deposit(amount(dec!(200)), cap, Utc::now());
        match result {
            Err(VendingError::LimitExceeded { remaining, .. }) => {
                assert_eq!(remaining, dec!(100))
            }
            other => panic!("expected LimitExceeded, got {other:?}"),
        }
        assert_eq!(wallet.balance, Balance::new(dec!(4900)));
        assert_eq!(wallet.transactions.len(), 1);
    }

    #[test]
    fn test_wallet_debit_insufficient() {
        let mut wallet = Wallet::new(UserId::new());
        wallet
            .deposit(amount(dec!(10.0)), Balance::new(dec!(5000)), Utc::now())
            .unwrap();

        let result = wallet.debit(amount(dec!(20.0)), None, Utc::now());
        assert!(matches!(result, Err(VendingError::InsufficientFunds { .. })));
        assert_eq!(wallet.balance, Balance::new(dec!(10.0)));
    }

    #[test]
    fn test_journal_matches_balance() {
        let mut wallet = Wallet::new(UserId::new());
        let order = OrderId::new();
        wallet
            .deposit(amount(dec!(300)), Balance::new(dec!(5000)), Utc::now())
            .unwrap();
        wallet.debit(amount(dec!(200)), Some(order), Utc::now()).unwrap();
        let uncredited = wallet.refund(amount(dec!(200)), Balance::new(dec!(5000)), order, Utc::now());

        assert_eq!(uncredited, Decimal::ZERO);
        assert_eq!(wallet.balance, Balance::new(dec!(300)));
        assert_eq!(wallet.journal_total(), wallet.balance);
        assert_eq!(wallet.transactions[1].amount, dec!(-200));
        assert!(wallet.has_entry(TransactionType::Payment, order));
        assert!(wallet.has_entry(TransactionType::Refund, order));
    }

    #[test]
    fn test_refund_never_lifts_balance_over_cap() {
        let cap = Balance::new(dec!(5000));
        let mut wallet = Wallet::new(UserId::new());
        let order = OrderId::new();
        wallet.deposit(amount(dec!(5000)), cap, Utc::now()).unwrap();
        wallet.debit(amount(dec!(200)), Some(order), Utc::now()).unwrap();
        wallet.deposit(amount(dec!(150)), cap, Utc::now()).unwrap();

        let uncredited = wallet.refund(amount(dec!(200)), cap, order, Utc::now());
        assert_eq!(uncredited, dec!(150));
        assert_eq!(wallet.balance, cap);
        assert_eq!(wallet.journal_total(), wallet.balance);
        assert!(wallet.has_entry(TransactionType::Refund, order));
    }
}
