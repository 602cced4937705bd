// 🔌 Repository interfaces - what the engine needs from a store
//
// The engine never talks to a database directly. Each use case takes the
// repositories it needs as explicit arguments, so any store that implements
// these traits (in-memory, SQLite, ...) can sit underneath.

use crate::banking;
use crate::entities::{
    BankEntry, ComplianceBalance, NewBankEntry, NewComplianceBalance, NewPool, NewRoute, Pool,
    Route, RouteFilters, RouteUpdate,
};
use crate::error::StoreResult;

pub trait ComplianceRepository: Send + Sync {
    fn find_by_ship_and_year(&self, ship_id: &str, year: i32) -> StoreResult<Option<ComplianceBalance>>;

    /// Insert a new row; fails with Conflict if the ship-year already exists
    fn create(&self, record: NewComplianceBalance) -> StoreResult<ComplianceBalance>;

    /// Overwrite the CB of an existing row by id
    fn update(&self, id: &str, cb_gco2eq: f64) -> StoreResult<ComplianceBalance>;

    /// Insert, or overwrite the CB of the existing row for (ship_id, year)
    fn upsert(&self, record: NewComplianceBalance) -> StoreResult<ComplianceBalance>;
}

pub trait BankRepository: Send + Sync {
    /// All entries for a ship, newest first
    fn find_by_ship(&self, ship_id: &str) -> StoreResult<Vec<BankEntry>>;

    /// Entries for a ship recorded against one year, newest first
    fn find_by_ship_and_year(&self, ship_id: &str, year: i32) -> StoreResult<Vec<BankEntry>>;

    /// Sum of never-applied entries for a ship, across all years
    fn find_available_balance(&self, ship_id: &str) -> StoreResult<f64> {
        Ok(banking::available_balance(&self.find_by_ship(ship_id)?))
    }

    fn create(&self, entry: NewBankEntry) -> StoreResult<BankEntry>;

    /// Flip is_applied on an existing entry. The ledger itself never calls
    /// this; it appends instead.
    fn mark_as_applied(&self, id: &str) -> StoreResult<BankEntry>;
}

pub trait PoolRepository: Send + Sync {
    fn find_by_id(&self, id: &str) -> StoreResult<Option<Pool>>;

    fn find_by_year(&self, year: i32) -> StoreResult<Vec<Pool>>;

    /// Insert the pool and every member atomically
    fn create(&self, pool: NewPool) -> StoreResult<Pool>;
}

pub trait RouteRepository: Send + Sync {
    /// Routes matching the filters, in insertion order
    fn find_all(&self, filters: &RouteFilters) -> StoreResult<Vec<Route>>;

    fn find_by_id(&self, id: &str) -> StoreResult<Option<Route>>;

    fn find_by_route_id(&self, route_id: &str) -> StoreResult<Option<Route>>;

    fn find_baseline(&self) -> StoreResult<Option<Route>>;

    fn create(&self, route: NewRoute) -> StoreResult<Route>;

    fn update(&self, id: &str, update: &RouteUpdate) -> StoreResult<Route>;

    /// Clear every baseline flag and set it on `route_id`, as one unit
    fn set_baseline(&self, route_id: &str) -> StoreResult<Route>;
}
