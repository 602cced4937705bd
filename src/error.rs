use thiserror::Error;

/// Failures of the persistence layer behind the repository traits.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    LockPoisoned,

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("conflicting record: {0}")]
    Conflict(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the compliance engine to its callers.
///
/// Messages carry the ids and numeric values involved so the boundary layer
/// can pass them through verbatim.
#[derive(Error, Debug)]
pub enum ComplianceError {
    #[error("Cannot {action} non-positive amount ({amount})")]
    InvalidAmount { action: &'static str, amount: f64 },

    #[error("Invalid {field} ({value}): must be a finite number")]
    InvalidInput { field: &'static str, value: f64 },

    #[error("No compliance record found for ship {ship_id} in year {year}")]
    NotFoundComplianceRecord { ship_id: String, year: i32 },

    #[error("Ship {ship_id} has no surplus to bank (CB: {cb})")]
    NoSurplus { ship_id: String, cb: f64 },

    #[error("Ship {ship_id} has no banked surplus to apply")]
    NoBankedSurplus { ship_id: String },

    #[error("Amount {requested} exceeds available {ceiling} {available}")]
    ExceedsAvailable {
        ceiling: &'static str,
        requested: f64,
        available: f64,
    },

    #[error("{stage} validation failed: {}", errors.join(", "))]
    ValidationFailed {
        stage: &'static str,
        errors: Vec<String>,
    },

    #[error("No baseline route set. Please set a baseline first.")]
    NoBaseline,

    #[error("Route {0} not found")]
    RouteNotFound(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

pub type ComplianceResult<T> = Result<T, ComplianceError>;

/// How the boundary layer should classify an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    BadRequest,
    NotFound,
    Internal,
}

impl ComplianceError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ComplianceError::InvalidAmount { .. }
            | ComplianceError::InvalidInput { .. }
            | ComplianceError::NoSurplus { .. }
            | ComplianceError::NoBankedSurplus { .. }
            | ComplianceError::ExceedsAvailable { .. }
            | ComplianceError::ValidationFailed { .. }
            | ComplianceError::NoBaseline => ErrorClass::BadRequest,
            ComplianceError::NotFoundComplianceRecord { .. } | ComplianceError::RouteNotFound(_) => {
                ErrorClass::NotFound
            }
            ComplianceError::Storage(StoreError::NotFound(_)) => ErrorClass::NotFound,
            ComplianceError::Storage(_) => ErrorClass::Internal,
        }
    }

    /// Stable kind name, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            ComplianceError::InvalidAmount { .. } => "InvalidAmount",
            ComplianceError::InvalidInput { .. } => "InvalidInput",
            ComplianceError::NotFoundComplianceRecord { .. } => "NotFoundComplianceRecord",
            ComplianceError::NoSurplus { .. } => "NoSurplus",
            ComplianceError::NoBankedSurplus { .. } => "NoBankedSurplus",
            ComplianceError::ExceedsAvailable { .. } => "ExceedsAvailable",
            ComplianceError::ValidationFailed { .. } => "ValidationFailed",
            ComplianceError::NoBaseline => "NoBaseline",
            ComplianceError::RouteNotFound(_) => "RouteNotFound",
            ComplianceError::Storage(_) => "Storage",
        }
    }
}
