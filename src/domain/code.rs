use super::ids::{CodeId, MachineId, OrderId, UserId};
use super::money::Amount;
use super::order::CodeStatus;
use super::ports::Record;
use crate::error::VendingError;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A single-use numeric code standing in for payment at the machine.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCode {
    pub id: CodeId,
    pub code: String,
    pub user: UserId,
    pub order: OrderId,
    pub amount: Amount,
    pub status: CodeStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub redeemed_by: Option<MachineId>,
    pub version: u64,
}

impl PaymentCode {
    pub fn new(
        code: String,
        user: UserId,
        order: OrderId,
        amount: Amount,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            id: CodeId::new(),
            code,
            user,
            order,
            amount,
            status: CodeStatus::Active,
            created_at: now,
            expires_at: now + ttl,
            redeemed_by: None,
            version: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == CodeStatus::Active
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn redeem(&mut self, machine: MachineId, now: DateTime<Utc>) -> Result<(), VendingError> {
        if !self.is_active() {
            return Err(VendingError::not_found("active code", &self.code));
        }
        if self.is_expired_at(now) {
            return Err(VendingError::Expired(format!("code {} has expired", self.code)));
        }
        self.status = CodeStatus::Used;
        self.redeemed_by = Some(machine);
        Ok(())
    }
}

/// Draws a 6-digit code. Uniqueness among active codes is checked by the issuer.
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.gen_range(100_000..1_000_000u32).to_string()
}

impl Record for PaymentCode {
    const KIND: &'static str = "code";
    type Id = CodeId;

    fn id(&self) -> CodeId {
        self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}
