// Entity Models - records the engine reads and writes
//
// Each record has:
// - Opaque identity (UUID) assigned by the store
// - Business key (ship-year, route_id) used by lookups
// - created_at / updated_at maintained by the store

pub mod bank_entry;
pub mod compliance;
pub mod pool;
pub mod route;

pub use bank_entry::{BankEntry, BankingSummary, NewBankEntry};
pub use compliance::{AdjustedComplianceBalance, ComplianceBalance, NewComplianceBalance};
pub use pool::{NewPool, Pool, PoolAllocation, PoolMember, PoolMemberInput, PoolValidationResult};
pub use route::{NewRoute, Route, RouteComparison, RouteFilters, RouteUpdate};

/// Fresh opaque identifier for a stored record
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
