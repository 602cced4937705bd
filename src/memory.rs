// 🧠 In-Memory Store - every repository over append-only vectors
//
// Used by tests, demos and the CLI's dry runs. Each collection sits behind its
// own RwLock; multi-record writes (pool + members, baseline switch) happen
// under a single write guard so readers never see half of one.

use crate::entities::{
    BankEntry, ComplianceBalance, NewBankEntry, NewComplianceBalance, NewPool, NewRoute, Pool,
    Route, RouteFilters, RouteUpdate,
};
use crate::error::{StoreError, StoreResult};
use crate::repository::{BankRepository, ComplianceRepository, PoolRepository, RouteRepository};
use chrono::Utc;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    compliance: Arc<RwLock<Vec<ComplianceBalance>>>,
    bank_entries: Arc<RwLock<Vec<BankEntry>>>,
    pools: Arc<RwLock<Vec<Pool>>>,
    routes: Arc<RwLock<Vec<Route>>>,
}

fn read<T>(lock: &RwLock<T>) -> StoreResult<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| StoreError::LockPoisoned)
}

fn write<T>(lock: &RwLock<T>) -> StoreResult<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| StoreError::LockPoisoned)
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every record (used before reseeding)
    pub fn clear(&self) -> StoreResult<()> {
        write(&self.pools)?.clear();
        write(&self.bank_entries)?.clear();
        write(&self.compliance)?.clear();
        write(&self.routes)?.clear();
        Ok(())
    }

    pub fn bank_entry_count(&self) -> StoreResult<usize> {
        Ok(read(&self.bank_entries)?.len())
    }
}

// ============================================================================
// COMPLIANCE
// ============================================================================

impl ComplianceRepository for InMemoryStore {
    fn find_by_ship_and_year(&self, ship_id: &str, year: i32) -> StoreResult<Option<ComplianceBalance>> {
        let rows = read(&self.compliance)?;
        Ok(rows
            .iter()
            .find(|r| r.ship_id == ship_id && r.year == year)
            .cloned())
    }

    fn create(&self, record: NewComplianceBalance) -> StoreResult<ComplianceBalance> {
        let mut rows = write(&self.compliance)?;

        if rows.iter().any(|r| r.ship_id == record.ship_id && r.year == record.year) {
            return Err(StoreError::Conflict(format!(
                "compliance record for ship {} in year {} already exists",
                record.ship_id, record.year
            )));
        }

        let row = ComplianceBalance::from_new(record);
        rows.push(row.clone());
        Ok(row)
    }

    fn update(&self, id: &str, cb_gco2eq: f64) -> StoreResult<ComplianceBalance> {
        let mut rows = write(&self.compliance)?;
        let row = rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("compliance record {}", id)))?;

        row.cb_gco2eq = cb_gco2eq;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    fn upsert(&self, record: NewComplianceBalance) -> StoreResult<ComplianceBalance> {
        let mut rows = write(&self.compliance)?;

        if let Some(row) = rows
            .iter_mut()
            .find(|r| r.ship_id == record.ship_id && r.year == record.year)
        {
            row.cb_gco2eq = record.cb_gco2eq;
            row.updated_at = Utc::now();
            return Ok(row.clone());
        }

        let row = ComplianceBalance::from_new(record);
        rows.push(row.clone());
        Ok(row)
    }
}

// ============================================================================
// BANK LEDGER
// ============================================================================

impl BankRepository for InMemoryStore {
    fn find_by_ship(&self, ship_id: &str) -> StoreResult<Vec<BankEntry>> {
        let entries = read(&self.bank_entries)?;
        Ok(entries
            .iter()
            .rev()
            .filter(|e| e.ship_id == ship_id)
            .cloned()
            .collect())
    }

    fn find_by_ship_and_year(&self, ship_id: &str, year: i32) -> StoreResult<Vec<BankEntry>> {
        let entries = read(&self.bank_entries)?;
        Ok(entries
            .iter()
            .rev()
            .filter(|e| e.ship_id == ship_id && e.year == year)
            .cloned()
            .collect())
    }

    fn create(&self, entry: NewBankEntry) -> StoreResult<BankEntry> {
        let entry = BankEntry::from_new(entry);
        write(&self.bank_entries)?.push(entry.clone());
        Ok(entry)
    }

    fn mark_as_applied(&self, id: &str) -> StoreResult<BankEntry> {
        let mut entries = write(&self.bank_entries)?;
        let entry = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("bank entry {}", id)))?;

        entry.is_applied = true;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }
}

// ============================================================================
// POOLS
// ============================================================================

impl PoolRepository for InMemoryStore {
    fn find_by_id(&self, id: &str) -> StoreResult<Option<Pool>> {
        Ok(read(&self.pools)?.iter().find(|p| p.id == id).cloned())
    }

    fn find_by_year(&self, year: i32) -> StoreResult<Vec<Pool>> {
        Ok(read(&self.pools)?
            .iter()
            .filter(|p| p.year == year)
            .cloned()
            .collect())
    }

    fn create(&self, pool: NewPool) -> StoreResult<Pool> {
        let pool = Pool::from_new(pool);
        write(&self.pools)?.push(pool.clone());
        Ok(pool)
    }
}

// ============================================================================
// ROUTES
// ============================================================================

impl RouteRepository for InMemoryStore {
    fn find_all(&self, filters: &RouteFilters) -> StoreResult<Vec<Route>> {
        Ok(read(&self.routes)?
            .iter()
            .filter(|r| filters.matches(r))
            .cloned()
            .collect())
    }

    fn find_by_id(&self, id: &str) -> StoreResult<Option<Route>> {
        Ok(read(&self.routes)?.iter().find(|r| r.id == id).cloned())
    }

    fn find_by_route_id(&self, route_id: &str) -> StoreResult<Option<Route>> {
        Ok(read(&self.routes)?
            .iter()
            .find(|r| r.route_id == route_id)
            .cloned())
    }

    fn find_baseline(&self) -> StoreResult<Option<Route>> {
        Ok(read(&self.routes)?.iter().find(|r| r.is_baseline).cloned())
    }

    fn create(&self, route: NewRoute) -> StoreResult<Route> {
        let mut routes = write(&self.routes)?;

        if routes.iter().any(|r| r.route_id == route.route_id) {
            return Err(StoreError::Conflict(format!("route {} already exists", route.route_id)));
        }

        let route = Route::from_new(route);
        if route.is_baseline {
            for r in routes.iter_mut() {
                r.is_baseline = false;
            }
        }
        routes.push(route.clone());
        Ok(route)
    }

    fn update(&self, id: &str, update: &RouteUpdate) -> StoreResult<Route> {
        let mut routes = write(&self.routes)?;
        let route = routes
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("route {}", id)))?;

        route.apply(update);
        Ok(route.clone())
    }

    fn set_baseline(&self, route_id: &str) -> StoreResult<Route> {
        let mut routes = write(&self.routes)?;

        if !routes.iter().any(|r| r.route_id == route_id) {
            return Err(StoreError::NotFound(format!("route {}", route_id)));
        }

        let now = Utc::now();
        let mut selected = None;
        for route in routes.iter_mut() {
            let is_target = route.route_id == route_id;
            if route.is_baseline != is_target {
                route.is_baseline = is_target;
                route.updated_at = now;
            }
            if is_target {
                selected = Some(route.clone());
            }
        }

        selected.ok_or_else(|| StoreError::NotFound(format!("route {}", route_id)))
    }
}
