use super::retry::retry_transient;
use crate::domain::clock::ClockBox;
use crate::domain::ids::{OrderId, UserId};
use crate::domain::money::{Amount, Balance};
use crate::domain::ports::WalletStoreBox;
use crate::domain::wallet::{TransactionType, Wallet, WalletTransaction};
use crate::error::{Result, VendingError};
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

/// Outcome of [`WalletLedger::refund`].
#[derive(Debug, Clone)]
pub struct Refund {
    pub wallet: Wallet,
    /// Part of the refund the cap left no room for.
    pub uncredited: Decimal,
}

/// Applies deposits, payments and refunds to wallets.
///
/// Each operation is a single compare-and-swap on the wallet record, so the
/// balance and its journal always move together.
#[derive(Clone)]
pub struct WalletLedger {
    wallets: WalletStoreBox,
    clock: ClockBox,
    cap: Balance,
    retry_attempts: u32,
}

impl WalletLedger {
    pub fn new(wallets: WalletStoreBox, clock: ClockBox, cap: Balance, retry_attempts: u32) -> Self {
        Self {
            wallets,
            clock,
            cap,
            retry_attempts,
        }
    }

    pub fn cap(&self) -> Balance {
        self.cap
    }

    /// Credits `amount`, opening the wallet on first use.
    #[instrument(skip_all, fields(user = %user, amount = %amount))]
    pub async fn deposit(&self, user: UserId, amount: Amount) -> Result<Wallet> {
        let wallet = retry_transient(self.retry_attempts, move || self.try_deposit(user, amount)).await?;
        info!(balance = %wallet.balance, "deposit applied");
        Ok(wallet)
    }

    async fn try_deposit(&self, user: UserId, amount: Amount) -> Result<Wallet> {
        let now = self.clock.now();
        match self.wallets.get(&user).await? {
            Some(mut wallet) => {
                wallet.deposit(amount, self.cap, now)?;
                self.wallets.replace(wallet).await
            }
            None => {
                let mut wallet = Wallet::new(user);
                wallet.deposit(amount, self.cap, now)?;
                self.wallets.insert(wallet).await
            }
        }
    }

    /// A plain point-of-sale payment not tied to an order.
    #[instrument(skip_all, fields(user = %user, amount = %amount))]
    pub async fn debit(&self, user: UserId, amount: Amount) -> Result<Wallet> {
        retry_transient(self.retry_attempts, move || async move {
            let mut wallet = self.wallets.fetch(&user).await?;
            wallet.debit(amount, None, self.clock.now())?;
            self.wallets.replace(wallet).await
        })
        .await
    }

    /// Charges `amount` for `order`. Calling it again for the same order is a no-op.
    #[instrument(skip_all, fields(user = %user, order = %order, amount = %amount))]
    pub async fn debit_for_order(&self, user: UserId, amount: Amount, order: OrderId) -> Result<Wallet> {
        retry_transient(self.retry_attempts, move || async move {
            let mut wallet = self.wallets.fetch(&user).await?;
            if wallet.has_entry(TransactionType::Payment, order) {
                warn!("order already charged, skipping debit");
                return Ok(wallet);
            }
            wallet.debit(amount, Some(order), self.clock.now())?;
            self.wallets.replace(wallet).await
        })
        .await
    }

    /// Returns a previous charge for `order`. Only pays out once per order.
    ///
    /// The wallet is credited up to the cap; whatever does not fit is
    /// reported in [`Refund::uncredited`] and must be paid back elsewhere.
    #[instrument(skip_all, fields(user = %user, order = %order, amount = %amount))]
    pub async fn refund(&self, user: UserId, amount: Amount, order: OrderId) -> Result<Refund> {
        let refund = retry_transient(self.retry_attempts, move || async move {
            let mut wallet = self.wallets.fetch(&user).await?;
            if wallet.has_entry(TransactionType::Refund, order) {
                warn!("order already refunded, skipping");
                return Ok(Refund {
                    wallet,
                    uncredited: Decimal::ZERO,
                });
            }
            if !wallet.has_entry(TransactionType::Payment, order) {
                return Err(VendingError::InvalidState(format!(
                    "order {order} was never charged to this wallet"
                )));
            }
            let uncredited = wallet.refund(amount, self.cap, order, self.clock.now());
            let wallet = self.wallets.replace(wallet).await?;
            Ok(Refund { wallet, uncredited })
        })
        .await?;

        if refund.uncredited > Decimal::ZERO {
            warn!(uncredited = %refund.uncredited, "refund exceeds wallet cap, remainder not credited");
        }
        Ok(refund)
    }

    /// Fails with `InsufficientFunds` unless the wallet could pay `amount` right now.
    pub async fn ensure_funds(&self, user: UserId, amount: Amount) -> Result<()> {
        let balance = self.balance(user).await?;
        if balance < amount.into() {
            return Err(VendingError::InsufficientFunds {
                balance: balance.value(),
                required: amount.value(),
            });
        }
        Ok(())
    }

    pub async fn wallet(&self, user: UserId) -> Result<Wallet> {
        self.wallets.fetch(&user).await
    }

    /// Balance of `user`'s wallet, zero if it was never opened.
    pub async fn balance(&self, user: UserId) -> Result<Balance> {
        Ok(self
            .wallets
            .get(&user)
            .await?
            .map(|wallet| wallet.balance)
            .unwrap_or(Balance::ZERO))
    }

    pub async fn history(&self, user: UserId) -> Result<Vec<WalletTransaction>> {
        Ok(self.wallet(user).await?.transactions)
    }
}
