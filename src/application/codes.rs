use super::machines::MachineRegistry;
use super::orders::{OrderEngine, OrderLine};
use super::retry::retry_transient;
use crate::domain::clock::ClockBox;
use crate::domain::code::{PaymentCode, generate_code};
use crate::domain::ids::{CodeId, MachineId, UserId};
use crate::domain::money::Amount;
use crate::domain::notification::Notification;
use crate::domain::order::{CodeStatus, Order, PaymentMethod};
use crate::domain::ports::{CodeStoreBox, NotifierBox};
use crate::error::{Result, VendingError};
use chrono::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

const MAX_CODE_DRAWS: usize = 10;

/// Issues single-use payment codes bound to a pending order, and redeems
/// or expires them.
#[derive(Clone)]
pub struct CodeIssuer {
    codes: CodeStoreBox,
    orders: OrderEngine,
    machines: MachineRegistry,
    notifier: NotifierBox,
    clock: ClockBox,
    ttl: Duration,
    retry_attempts: u32,
}

impl CodeIssuer {
    pub fn new(
        codes: CodeStoreBox,
        orders: OrderEngine,
        machines: MachineRegistry,
        notifier: NotifierBox,
        clock: ClockBox,
        ttl: Duration,
        retry_attempts: u32,
    ) -> Self {
        Self {
            codes,
            orders,
            machines,
            notifier,
            clock,
            ttl,
            retry_attempts,
        }
    }

    /// Reserves stock for `lines` under a new `Pending` code order and
    /// returns the code that pays for it.
    ///
    /// When `amount` is given it must equal the order total.
    #[instrument(skip(self, lines), fields(user = %user))]
    pub async fn issue(&self, user: UserId, lines: &[OrderLine], amount: Option<Amount>) -> Result<PaymentCode> {
        let order = self.orders.open(user, lines, PaymentMethod::Code, None, amount).await?;

        let code = match self.store_code(&order).await {
            Ok(code) => code,
            Err(err) => {
                if let Err(cancel_err) = self.orders.cancel(order.id).await {
                    error!(order = %order.id, error = %cancel_err, "failed to cancel order after code failure");
                }
                return Err(err);
            }
        };

        info!(order = %order.id, expires_at = %code.expires_at, "payment code issued");
        self.notifier
            .notify(Notification::CodeIssued {
                user,
                order: order.id,
                code: code.code.clone(),
                amount: code.amount.value(),
            })
            .await;
        Ok(code)
    }

    async fn store_code(&self, order: &Order) -> Result<PaymentCode> {
        let active: Vec<String> = self
            .codes
            .list()
            .await?
            .into_iter()
            .filter(PaymentCode::is_active)
            .map(|code| code.code)
            .collect();

        let value = (0..MAX_CODE_DRAWS)
            .map(|_| generate_code(&mut rand::thread_rng()))
            .find(|value| !active.contains(value))
            .ok_or_else(|| VendingError::InternalError("could not draw an unused payment code".to_string()))?;

        let code = PaymentCode::new(
            value,
            order.user,
            order.id,
            order.total_amount,
            self.clock.now(),
            self.ttl,
        );
        self.codes.insert(code).await
    }

    /// Redeems `code` at `machine` and confirms payment of its order.
    ///
    /// A code past its TTL is expired on the spot (canceling its order) and
    /// rejected with `Expired`.
    #[instrument(skip(self, code))]
    pub async fn validate(&self, code: &str, machine: &MachineId) -> Result<Order> {
        let found = self
            .active_code(code)
            .await?
            .ok_or_else(|| VendingError::not_found("active code", code))?;

        let now = self.clock.now();
        if found.is_expired_at(now) {
            self.expire(found.id).await?;
            return Err(VendingError::Expired(format!("code {code} has expired")));
        }

        self.machines.ensure_available(machine).await?;

        let id = found.id;
        let redeemed = retry_transient(self.retry_attempts, move || async move {
            let mut stored = self.codes.fetch(&id).await?;
            stored.redeem(machine.clone(), now)?;
            self.codes.replace(stored).await
        })
        .await?;

        let order = self.orders.redeem_code(redeemed.order, machine.clone()).await?;
        info!(order = %order.id, "payment code redeemed");
        Ok(order)
    }

    pub async fn get(&self, id: CodeId) -> Result<PaymentCode> {
        self.codes.fetch(&id).await
    }

    async fn active_code(&self, value: &str) -> Result<Option<PaymentCode>> {
        Ok(self
            .codes
            .list()
            .await?
            .into_iter()
            .find(|code| code.is_active() && code.code == value))
    }

    /// Expires every active code past its TTL. Returns how many were expired.
    pub async fn sweep_expired(&self) -> Result<usize> {
        let now = self.clock.now();
        let due: Vec<CodeId> = self
            .codes
            .list()
            .await?
            .into_iter()
            .filter(|code| code.is_active() && code.is_expired_at(now))
            .map(|code| code.id)
            .collect();

        let mut expired = 0;
        for id in due {
            match self.expire(id).await {
                Ok(true) => expired += 1,
                Ok(false) => {}
                Err(err) => warn!(code = %id, error = %err, "failed to expire code"),
            }
        }
        Ok(expired)
    }

    /// Marks the code expired and cancels its order if the order still waits
    /// on it. Returns `false` when the code was no longer active.
    async fn expire(&self, id: CodeId) -> Result<bool> {
        let code = retry_transient(self.retry_attempts, move || async move {
            let mut code = self.codes.fetch(&id).await?;
            if !code.is_active() {
                return Ok(None);
            }
            code.status = CodeStatus::Expired;
            self.codes.replace(code).await.map(Some)
        })
        .await?;

        let Some(code) = code else {
            return Ok(false);
        };
        let order = self.orders.expire_code(code.order).await?;
        info!(order = %order.id, status = %order.status, "payment code expired");
        Ok(true)
    }
}

/// Periodically expires lapsed payment codes until shut down.
///
/// Expiry is driven by what is stored, not by in-process timers, so codes
/// issued before a restart still expire.
pub struct ExpirySweeper {
    issuer: CodeIssuer,
    interval: std::time::Duration,
    shutdown: CancellationToken,
}

impl ExpirySweeper {
    pub fn new(issuer: CodeIssuer, interval: std::time::Duration, shutdown: CancellationToken) -> Self {
        Self {
            issuer,
            interval,
            shutdown,
        }
    }

    pub async fn run(self) {
        info!(interval = ?self.interval, "code expiry sweeper started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.issuer.sweep_expired().await {
                        Ok(0) => {}
                        Ok(count) => info!(count, "expired payment codes"),
                        Err(err) => error!(error = %err, "code expiry sweep failed"),
                    }
                }
                _ = self.shutdown.cancelled() => {
                    info!("code expiry sweeper received shutdown signal");
                    return;
                }
            }
        }
    }
}
