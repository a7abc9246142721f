use miette::Diagnostic;
use rust_decimal::Decimal;
use thiserror::Error;

/// Every failure a vending operation can surface.
///
/// Business rejections (`InsufficientStock`, `CapacityExceeded`, ...) are
/// expected outcomes the caller can act on. `Conflict` means a
/// compare-and-swap lost a race and the caller may retry. `Storage` and
/// `Internal` are the only variants that indicate something is broken.
#[derive(Error, Diagnostic, Debug)]
pub enum VendingError {
    #[error("Validation error: {0}")]
    #[diagnostic(code(vending::validation))]
    ValidationError(String),

    #[error("{entity} {id} not found")]
    #[diagnostic(code(vending::not_found))]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid state: {0}")]
    #[diagnostic(
        code(vending::invalid_state),
        help("refresh the record and retry the operation")
    )]
    InvalidState(String),

    #[error("Concurrent update conflict on {entity} {id}")]
    #[diagnostic(code(vending::conflict))]
    Conflict { entity: &'static str, id: String },

    #[error("Unavailable: {0}")]
    #[diagnostic(code(vending::unavailable))]
    Unavailable(String),

    #[error("Carrier {carrier} is full (capacity {capacity})")]
    #[diagnostic(code(vending::capacity_exceeded))]
    CapacityExceeded { carrier: String, capacity: usize },

    #[error("Carrier {carrier} holds {current}, cannot accept {requested}")]
    #[diagnostic(code(vending::type_conflict))]
    TypeConflict {
        carrier: String,
        current: String,
        requested: String,
    },

    #[error("Insufficient stock for product {product}: requested {requested}, available {available}")]
    #[diagnostic(code(vending::insufficient_stock))]
    InsufficientStock {
        product: String,
        requested: u32,
        available: u32,
    },

    #[error("Insufficient funds: balance {balance}, required {required}")]
    #[diagnostic(code(vending::insufficient_funds))]
    InsufficientFunds { balance: Decimal, required: Decimal },

    #[error("Wallet limit of {limit} exceeded: balance {balance}, remaining capacity {remaining}")]
    #[diagnostic(code(vending::limit_exceeded))]
    LimitExceeded {
        limit: Decimal,
        balance: Decimal,
        remaining: Decimal,
    },

    #[error("Expired: {0}")]
    #[diagnostic(code(vending::expired))]
    Expired(String),

    #[error("Storage error: {0}")]
    #[diagnostic(code(vending::storage))]
    StorageError(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("CSV error: {0}")]
    #[diagnostic(code(vending::csv))]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    #[diagnostic(code(vending::io))]
    IoError(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(vending::internal))]
    InternalError(String),
}

impl VendingError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(entity: &'static str, id: impl ToString) -> Self {
        Self::Conflict {
            entity,
            id: id.to_string(),
        }
    }

    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::StorageError(Box::new(err))
    }

    /// Whether retrying the same call after reloading state can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::StorageError(_))
    }
}

impl From<serde_json::Error> for VendingError {
    fn from(err: serde_json::Error) -> Self {
        Self::storage(err)
    }
}

pub type Result<T> = std::result::Result<T, VendingError>;
