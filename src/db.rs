// 🗄️ SQLite Store - durable implementation of every repository trait
//
// One connection behind a Mutex. Every mutation also appends a row to the
// `events` audit table inside the same SQL transaction, so the audit trail and
// the data never disagree.

use crate::entities::{
    BankEntry, ComplianceBalance, NewBankEntry, NewComplianceBalance, NewPool, NewRoute, Pool,
    PoolMember, Route, RouteFilters, RouteUpdate,
};
use crate::error::{StoreError, StoreResult};
use crate::repository::{BankRepository, ComplianceRepository, PoolRepository, RouteRepository};
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Actor recorded on audit events written by the store
const ACTOR: &str = "fueleu-ledger";

/// Event for the audit trail: every change is recorded
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub fn setup_database(conn: &Connection) -> StoreResult<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Compliance balances: one row per ship-year
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS ship_compliance (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT UNIQUE NOT NULL,
            ship_id TEXT NOT NULL,
            year INTEGER NOT NULL,
            cb_gco2eq REAL NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (ship_id, year)
        )",
        [],
    )?;

    // ==========================================================================
    // Bank ledger (append-only)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS bank_entries (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT UNIQUE NOT NULL,
            ship_id TEXT NOT NULL,
            year INTEGER NOT NULL,
            amount_gco2eq REAL NOT NULL,
            is_applied INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Pools and their members
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS pools (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT UNIQUE NOT NULL,
            year INTEGER NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS pool_members (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT UNIQUE NOT NULL,
            pool_id TEXT NOT NULL REFERENCES pools(id),
            ship_id TEXT NOT NULL,
            cb_before REAL NOT NULL,
            cb_after REAL NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Routes
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS routes (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT UNIQUE NOT NULL,
            route_id TEXT UNIQUE NOT NULL,
            vessel_type TEXT NOT NULL,
            fuel_type TEXT NOT NULL,
            year INTEGER NOT NULL,
            ghg_intensity REAL NOT NULL,
            fuel_consumption REAL NOT NULL,
            distance REAL NOT NULL,
            total_emissions REAL NOT NULL,
            is_baseline INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_bank_ship_year ON bank_entries(ship_id, year)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_pools_year ON pools(year)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_pool_members_pool ON pool_members(pool_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)",
        [],
    )?;

    Ok(())
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> StoreResult<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> StoreResult<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: timestamp(row, 1)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e))
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

/// Record a mutation of `entity` on the audit trail
fn audit<T: Serialize>(
    conn: &Connection,
    event_type: &str,
    entity_type: &str,
    entity_id: &str,
    entity: &T,
) -> StoreResult<()> {
    let event = Event::new(
        event_type,
        entity_type,
        entity_id,
        serde_json::to_value(entity)?,
        ACTOR,
    );
    insert_event(conn, &event)
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn timestamp(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

const COMPLIANCE_COLUMNS: &str = "id, ship_id, year, cb_gco2eq, created_at, updated_at";

fn compliance_from_row(row: &Row) -> rusqlite::Result<ComplianceBalance> {
    Ok(ComplianceBalance {
        id: row.get(0)?,
        ship_id: row.get(1)?,
        year: row.get(2)?,
        cb_gco2eq: row.get(3)?,
        created_at: timestamp(row, 4)?,
        updated_at: timestamp(row, 5)?,
    })
}

const BANK_COLUMNS: &str = "id, ship_id, year, amount_gco2eq, is_applied, created_at, updated_at";

fn bank_entry_from_row(row: &Row) -> rusqlite::Result<BankEntry> {
    Ok(BankEntry {
        id: row.get(0)?,
        ship_id: row.get(1)?,
        year: row.get(2)?,
        amount_gco2eq: row.get(3)?,
        is_applied: row.get(4)?,
        created_at: timestamp(row, 5)?,
        updated_at: timestamp(row, 6)?,
    })
}

const ROUTE_COLUMNS: &str = "id, route_id, vessel_type, fuel_type, year, ghg_intensity, \
     fuel_consumption, distance, total_emissions, is_baseline, created_at, updated_at";

fn route_from_row(row: &Row) -> rusqlite::Result<Route> {
    Ok(Route {
        id: row.get(0)?,
        route_id: row.get(1)?,
        vessel_type: row.get(2)?,
        fuel_type: row.get(3)?,
        year: row.get(4)?,
        ghg_intensity: row.get(5)?,
        fuel_consumption: row.get(6)?,
        distance: row.get(7)?,
        total_emissions: row.get(8)?,
        is_baseline: row.get(9)?,
        created_at: timestamp(row, 10)?,
        updated_at: timestamp(row, 11)?,
    })
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// ============================================================================
// STORE
// ============================================================================

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file and make sure the schema exists
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        setup_database(&conn)?;
        debug!(path = %path.display(), "opened sqlite store");
        Ok(SqliteStore { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(SqliteStore { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Delete every domain record; the audit trail is kept
    pub fn clear(&self) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM pool_members", [])?;
        tx.execute("DELETE FROM pools", [])?;
        tx.execute("DELETE FROM bank_entries", [])?;
        tx.execute("DELETE FROM ship_compliance", [])?;
        tx.execute("DELETE FROM routes", [])?;
        insert_event(
            &tx,
            &Event::new("store_cleared", "store", "all", serde_json::json!({}), ACTOR),
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn events_for(&self, entity_type: &str, entity_id: &str) -> StoreResult<Vec<Event>> {
        let conn = self.lock()?;
        get_events_for_entity(&conn, entity_type, entity_id)
    }
}

fn load_members(conn: &Connection, pool_id: &str) -> StoreResult<Vec<PoolMember>> {
    let mut stmt = conn.prepare(
        "SELECT id, pool_id, ship_id, cb_before, cb_after
         FROM pool_members
         WHERE pool_id = ?1
         ORDER BY seq",
    )?;

    let members = stmt
        .query_map(params![pool_id], |row| {
            Ok(PoolMember {
                id: row.get(0)?,
                pool_id: row.get(1)?,
                ship_id: row.get(2)?,
                cb_before: row.get(3)?,
                cb_after: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(members)
}

fn find_route_by(conn: &Connection, column: &str, value: &str) -> StoreResult<Option<Route>> {
    let sql = format!("SELECT {} FROM routes WHERE {} = ?1", ROUTE_COLUMNS, column);
    Ok(conn
        .query_row(&sql, params![value], route_from_row)
        .optional()?)
}

// ============================================================================
// COMPLIANCE
// ============================================================================

impl ComplianceRepository for SqliteStore {
    fn find_by_ship_and_year(&self, ship_id: &str, year: i32) -> StoreResult<Option<ComplianceBalance>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM ship_compliance WHERE ship_id = ?1 AND year = ?2",
            COMPLIANCE_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![ship_id, year], compliance_from_row)
            .optional()?)
    }

    fn create(&self, record: NewComplianceBalance) -> StoreResult<ComplianceBalance> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let row = ComplianceBalance::from_new(record);

        tx.execute(
            "INSERT INTO ship_compliance (id, ship_id, year, cb_gco2eq, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                row.id,
                row.ship_id,
                row.year,
                row.cb_gco2eq,
                row.created_at.to_rfc3339(),
                row.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                StoreError::Conflict(format!(
                    "compliance record for ship {} in year {} already exists",
                    row.ship_id, row.year
                ))
            } else {
                StoreError::Sqlite(e)
            }
        })?;

        audit(&tx, "compliance_created", "compliance", &row.id, &row)?;
        tx.commit()?;
        Ok(row)
    }

    fn update(&self, id: &str, cb_gco2eq: f64) -> StoreResult<ComplianceBalance> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let changed = tx.execute(
            "UPDATE ship_compliance SET cb_gco2eq = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, cb_gco2eq, Utc::now().to_rfc3339()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("compliance record {}", id)));
        }

        let sql = format!("SELECT {} FROM ship_compliance WHERE id = ?1", COMPLIANCE_COLUMNS);
        let row = tx.query_row(&sql, params![id], compliance_from_row)?;

        audit(&tx, "compliance_updated", "compliance", &row.id, &row)?;
        tx.commit()?;
        Ok(row)
    }

    fn upsert(&self, record: NewComplianceBalance) -> StoreResult<ComplianceBalance> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = Utc::now();

        let existing: Option<String> = tx
            .query_row(
                "SELECT id FROM ship_compliance WHERE ship_id = ?1 AND year = ?2",
                params![record.ship_id, record.year],
                |row| row.get(0),
            )
            .optional()?;

        let (id, event_type) = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE ship_compliance SET cb_gco2eq = ?2, updated_at = ?3 WHERE id = ?1",
                    params![id, record.cb_gco2eq, now.to_rfc3339()],
                )?;
                (id, "compliance_updated")
            }
            None => {
                let row = ComplianceBalance::from_new(record);
                tx.execute(
                    "INSERT INTO ship_compliance (id, ship_id, year, cb_gco2eq, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        row.id,
                        row.ship_id,
                        row.year,
                        row.cb_gco2eq,
                        row.created_at.to_rfc3339(),
                        row.updated_at.to_rfc3339(),
                    ],
                )?;
                (row.id, "compliance_created")
            }
        };

        let sql = format!("SELECT {} FROM ship_compliance WHERE id = ?1", COMPLIANCE_COLUMNS);
        let row = tx.query_row(&sql, params![id], compliance_from_row)?;

        audit(&tx, event_type, "compliance", &row.id, &row)?;
        tx.commit()?;
        Ok(row)
    }
}

// ============================================================================
// BANK LEDGER
// ============================================================================

impl BankRepository for SqliteStore {
    fn find_by_ship(&self, ship_id: &str) -> StoreResult<Vec<BankEntry>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM bank_entries WHERE ship_id = ?1 ORDER BY seq DESC",
            BANK_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![ship_id], bank_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn find_by_ship_and_year(&self, ship_id: &str, year: i32) -> StoreResult<Vec<BankEntry>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM bank_entries WHERE ship_id = ?1 AND year = ?2 ORDER BY seq DESC",
            BANK_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![ship_id, year], bank_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn find_available_balance(&self, ship_id: &str) -> StoreResult<f64> {
        let conn = self.lock()?;
        let total: f64 = conn.query_row(
            "SELECT COALESCE(SUM(amount_gco2eq), 0.0)
             FROM bank_entries
             WHERE ship_id = ?1 AND is_applied = 0",
            params![ship_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    fn create(&self, entry: NewBankEntry) -> StoreResult<BankEntry> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let entry = BankEntry::from_new(entry);

        tx.execute(
            "INSERT INTO bank_entries (
                id, ship_id, year, amount_gco2eq, is_applied, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.id,
                entry.ship_id,
                entry.year,
                entry.amount_gco2eq,
                entry.is_applied,
                entry.created_at.to_rfc3339(),
                entry.updated_at.to_rfc3339(),
            ],
        )?;

        let event_type = if entry.is_applied { "surplus_applied" } else { "surplus_banked" };
        audit(&tx, event_type, "bank_entry", &entry.id, &entry)?;
        tx.commit()?;
        Ok(entry)
    }

    fn mark_as_applied(&self, id: &str) -> StoreResult<BankEntry> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let changed = tx.execute(
            "UPDATE bank_entries SET is_applied = 1, updated_at = ?2 WHERE id = ?1",
            params![id, Utc::now().to_rfc3339()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("bank entry {}", id)));
        }

        let sql = format!("SELECT {} FROM bank_entries WHERE id = ?1", BANK_COLUMNS);
        let entry = tx.query_row(&sql, params![id], bank_entry_from_row)?;

        audit(&tx, "bank_entry_marked_applied", "bank_entry", &entry.id, &entry)?;
        tx.commit()?;
        Ok(entry)
    }
}

// ============================================================================
// POOLS
// ============================================================================

impl PoolRepository for SqliteStore {
    fn find_by_id(&self, id: &str) -> StoreResult<Option<Pool>> {
        let conn = self.lock()?;

        let header = conn
            .query_row(
                "SELECT id, year, created_at FROM pools WHERE id = ?1",
                params![id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i32>(1)?, timestamp(row, 2)?)),
            )
            .optional()?;

        match header {
            Some((id, year, created_at)) => {
                let members = load_members(&conn, &id)?;
                Ok(Some(Pool { id, year, created_at, members }))
            }
            None => Ok(None),
        }
    }

    fn find_by_year(&self, year: i32) -> StoreResult<Vec<Pool>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT id, year, created_at FROM pools WHERE year = ?1 ORDER BY seq",
        )?;
        let headers = stmt
            .query_map(params![year], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i32>(1)?, timestamp(row, 2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        headers
            .into_iter()
            .map(|(id, year, created_at)| {
                let members = load_members(&conn, &id)?;
                Ok(Pool { id, year, created_at, members })
            })
            .collect()
    }

    fn create(&self, pool: NewPool) -> StoreResult<Pool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let pool = Pool::from_new(pool);

        tx.execute(
            "INSERT INTO pools (id, year, created_at) VALUES (?1, ?2, ?3)",
            params![pool.id, pool.year, pool.created_at.to_rfc3339()],
        )?;

        for member in &pool.members {
            tx.execute(
                "INSERT INTO pool_members (id, pool_id, ship_id, cb_before, cb_after)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    member.id,
                    member.pool_id,
                    member.ship_id,
                    member.cb_before,
                    member.cb_after,
                ],
            )?;
        }

        audit(&tx, "pool_created", "pool", &pool.id, &pool)?;
        tx.commit()?;
        Ok(pool)
    }
}

// ============================================================================
// ROUTES
// ============================================================================

impl RouteRepository for SqliteStore {
    fn find_all(&self, filters: &RouteFilters) -> StoreResult<Vec<Route>> {
        let conn = self.lock()?;

        let mut sql = format!("SELECT {} FROM routes WHERE 1 = 1", ROUTE_COLUMNS);
        let mut args: Vec<Value> = Vec::new();

        if let Some(vessel_type) = &filters.vessel_type {
            args.push(Value::Text(vessel_type.clone()));
            sql.push_str(&format!(" AND vessel_type = ?{}", args.len()));
        }
        if let Some(fuel_type) = &filters.fuel_type {
            args.push(Value::Text(fuel_type.clone()));
            sql.push_str(&format!(" AND fuel_type = ?{}", args.len()));
        }
        if let Some(year) = filters.year {
            args.push(Value::Integer(i64::from(year)));
            sql.push_str(&format!(" AND year = ?{}", args.len()));
        }
        sql.push_str(" ORDER BY seq");

        let mut stmt = conn.prepare(&sql)?;
        let routes = stmt
            .query_map(params_from_iter(args.iter()), route_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(routes)
    }

    fn find_by_id(&self, id: &str) -> StoreResult<Option<Route>> {
        let conn = self.lock()?;
        find_route_by(&conn, "id", id)
    }

    fn find_by_route_id(&self, route_id: &str) -> StoreResult<Option<Route>> {
        let conn = self.lock()?;
        find_route_by(&conn, "route_id", route_id)
    }

    fn find_baseline(&self) -> StoreResult<Option<Route>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM routes WHERE is_baseline = 1 ORDER BY seq LIMIT 1",
            ROUTE_COLUMNS
        );
        Ok(conn.query_row(&sql, [], route_from_row).optional()?)
    }

    fn create(&self, route: NewRoute) -> StoreResult<Route> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let route = Route::from_new(route);

        if route.is_baseline {
            tx.execute(
                "UPDATE routes SET is_baseline = 0, updated_at = ?1 WHERE is_baseline = 1",
                params![route.created_at.to_rfc3339()],
            )?;
        }

        tx.execute(
            "INSERT INTO routes (
                id, route_id, vessel_type, fuel_type, year, ghg_intensity,
                fuel_consumption, distance, total_emissions, is_baseline, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                route.id,
                route.route_id,
                route.vessel_type,
                route.fuel_type,
                route.year,
                route.ghg_intensity,
                route.fuel_consumption,
                route.distance,
                route.total_emissions,
                route.is_baseline,
                route.created_at.to_rfc3339(),
                route.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                StoreError::Conflict(format!("route {} already exists", route.route_id))
            } else {
                StoreError::Sqlite(e)
            }
        })?;

        audit(&tx, "route_created", "route", &route.id, &route)?;
        tx.commit()?;
        Ok(route)
    }

    fn update(&self, id: &str, update: &RouteUpdate) -> StoreResult<Route> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let mut route = find_route_by(&tx, "id", id)?
            .ok_or_else(|| StoreError::NotFound(format!("route {}", id)))?;
        route.apply(update);

        tx.execute(
            "UPDATE routes SET
                vessel_type = ?2, fuel_type = ?3, year = ?4, ghg_intensity = ?5,
                fuel_consumption = ?6, distance = ?7, total_emissions = ?8, updated_at = ?9
             WHERE id = ?1",
            params![
                route.id,
                route.vessel_type,
                route.fuel_type,
                route.year,
                route.ghg_intensity,
                route.fuel_consumption,
                route.distance,
                route.total_emissions,
                route.updated_at.to_rfc3339(),
            ],
        )?;

        audit(&tx, "route_updated", "route", &route.id, &route)?;
        tx.commit()?;
        Ok(route)
    }

    fn set_baseline(&self, route_id: &str) -> StoreResult<Route> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        // dropping `tx` on an early return rolls everything back
        let changed = tx.execute(
            "UPDATE routes SET is_baseline = 1, updated_at = ?2 WHERE route_id = ?1",
            params![route_id, now],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("route {}", route_id)));
        }

        tx.execute(
            "UPDATE routes SET is_baseline = 0, updated_at = ?2
             WHERE is_baseline = 1 AND route_id <> ?1",
            params![route_id, now],
        )?;

        let route = find_route_by(&tx, "route_id", route_id)?
            .ok_or_else(|| StoreError::NotFound(format!("route {}", route_id)))?;

        audit(&tx, "baseline_set", "route", &route.id, &route)?;
        tx.commit()?;
        Ok(route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::banking::{BankRequest, BankingLedger};
    use crate::entities::PoolAllocation;
    use crate::error::ComplianceError;

    fn route(route_id: &str, year: i32, ghg: f64, baseline: bool) -> NewRoute {
        NewRoute {
            route_id: route_id.to_string(),
            vessel_type: "Container".to_string(),
            fuel_type: "HFO".to_string(),
            year,
            ghg_intensity: ghg,
            fuel_consumption: 5000.0,
            distance: 12000.0,
            total_emissions: 4500.0,
            is_baseline: baseline,
        }
    }

    #[test]
    fn test_event_log() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let event = Event::new(
            "test_event",
            "pool",
            "pool_123",
            serde_json::json!({"year": 2025}),
            "test_actor",
        );

        insert_event(&conn, &event).unwrap();

        let events = get_events_for_entity(&conn, "pool", "pool_123").unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "test_event");
        assert_eq!(events[0].actor, "test_actor");
        assert_eq!(events[0].data["year"], 2025);
    }

    #[test]
    fn test_setup_database_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        setup_database(&conn).unwrap();
    }

    #[test]
    fn test_upsert_keeps_identity_and_audits() {
        let store = SqliteStore::open_in_memory().unwrap();

        let first = store.upsert(NewComplianceBalance::new("SHIP001", 2025, 1000.0)).unwrap();
        let second = store.upsert(NewComplianceBalance::new("SHIP001", 2025, -250.0)).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.cb_gco2eq, -250.0);
        assert!(second.updated_at >= first.updated_at);

        let stored = ComplianceRepository::find_by_ship_and_year(&store, "SHIP001", 2025)
            .unwrap()
            .unwrap();
        assert_eq!(stored, second);

        let events = store.events_for("compliance", &first.id).unwrap();
        let kinds: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(kinds, vec!["compliance_updated", "compliance_created"]);
    }

    #[test]
    fn test_create_rejects_duplicate_ship_year() {
        let store = SqliteStore::open_in_memory().unwrap();
        ComplianceRepository::create(&store, NewComplianceBalance::new("SHIP001", 2024, 1.0)).unwrap();

        let err = ComplianceRepository::create(&store, NewComplianceBalance::new("SHIP001", 2024, 2.0))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_update_unknown_record() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = ComplianceRepository::update(&store, "missing", 1.0).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_bank_entries_newest_first_and_available_balance() {
        let store = SqliteStore::open_in_memory().unwrap();

        BankRepository::create(&store, NewBankEntry::banked("SHIP001", 2024, 100.0)).unwrap();
        BankRepository::create(&store, NewBankEntry::banked("SHIP001", 2025, 50.0)).unwrap();
        BankRepository::create(&store, NewBankEntry::applied("SHIP001", 2025, 30.0)).unwrap();
        BankRepository::create(&store, NewBankEntry::banked("SHIP002", 2025, 999.0)).unwrap();

        let entries = BankRepository::find_by_ship(&store, "SHIP001").unwrap();
        let amounts: Vec<f64> = entries.iter().map(|e| e.amount_gco2eq).collect();
        assert_eq!(amounts, vec![30.0, 50.0, 100.0]);

        // applied entries never reduce the available balance
        assert_eq!(store.find_available_balance("SHIP001").unwrap(), 150.0);
        assert_eq!(store.find_available_balance("NOBODY").unwrap(), 0.0);

        let year = BankRepository::find_by_ship_and_year(&store, "SHIP001", 2025).unwrap();
        assert_eq!(year.len(), 2);
        assert!(year[0].is_applied);
    }

    #[test]
    fn test_mark_as_applied() {
        let store = SqliteStore::open_in_memory().unwrap();
        let entry = BankRepository::create(&store, NewBankEntry::banked("SHIP001", 2024, 10.0)).unwrap();

        let marked = store.mark_as_applied(&entry.id).unwrap();
        assert!(marked.is_applied);
        assert_eq!(store.find_available_balance("SHIP001").unwrap(), 0.0);

        assert!(matches!(store.mark_as_applied("missing"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_pool_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();

        let created = PoolRepository::create(
            &store,
            NewPool {
                year: 2025,
                members: vec![
                    PoolAllocation { ship_id: "S1".into(), cb_before: 100.0, cb_after: 0.0 },
                    PoolAllocation { ship_id: "S2".into(), cb_before: -80.0, cb_after: 0.0 },
                    PoolAllocation { ship_id: "S3".into(), cb_before: -10.0, cb_after: 10.0 },
                ],
            },
        )
        .unwrap();

        let loaded = PoolRepository::find_by_id(&store, &created.id).unwrap().unwrap();
        assert_eq!(loaded, created);
        assert_eq!(loaded.members.len(), 3);
        assert!(loaded.members.iter().all(|m| m.pool_id == created.id));

        assert_eq!(store.find_by_year(2025).unwrap().len(), 1);
        assert!(store.find_by_year(2024).unwrap().is_empty());
        assert!(PoolRepository::find_by_id(&store, "missing").unwrap().is_none());
    }

    #[test]
    fn test_route_filters_and_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        RouteRepository::create(&store, route("R001", 2024, 91.0, true)).unwrap();
        RouteRepository::create(&store, route("R002", 2024, 88.0, false)).unwrap();
        RouteRepository::create(&store, route("R004", 2025, 89.2, false)).unwrap();

        let all = store.find_all(&RouteFilters::default()).unwrap();
        let ids: Vec<&str> = all.iter().map(|r| r.route_id.as_str()).collect();
        assert_eq!(ids, vec!["R001", "R002", "R004"]);

        let filtered = store
            .find_all(&RouteFilters {
                vessel_type: Some("Container".into()),
                year: Some(2024),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(filtered.len(), 2);

        let err = RouteRepository::create(&store, route("R001", 2024, 91.0, false)).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_set_baseline_keeps_single_flag() {
        let store = SqliteStore::open_in_memory().unwrap();
        RouteRepository::create(&store, route("R001", 2024, 91.0, true)).unwrap();
        let candidate = RouteRepository::create(&store, route("R002", 2024, 88.0, false)).unwrap();

        let selected = store.set_baseline("R002").unwrap();
        assert!(selected.is_baseline);
        assert_eq!(selected.id, candidate.id);

        let baselines: Vec<Route> = store
            .find_all(&RouteFilters::default())
            .unwrap()
            .into_iter()
            .filter(|r| r.is_baseline)
            .collect();
        assert_eq!(baselines.len(), 1);
        assert_eq!(baselines[0].route_id, "R002");

        // unknown route leaves the old baseline untouched
        assert!(matches!(store.set_baseline("R999"), Err(StoreError::NotFound(_))));
        assert_eq!(store.find_baseline().unwrap().unwrap().route_id, "R002");

        // route events are keyed by the row id, like every other entity
        let events = store.events_for("route", &candidate.id).unwrap();
        let kinds: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(kinds, vec!["baseline_set", "route_created"]);
        assert!(events.iter().all(|e| e.entity_id == candidate.id));
        assert!(store.events_for("route", "R002").unwrap().is_empty());
    }

    #[test]
    fn test_route_update_preserves_baseline() {
        let store = SqliteStore::open_in_memory().unwrap();
        let created = RouteRepository::create(&store, route("R001", 2024, 91.0, true)).unwrap();

        let updated = RouteRepository::update(
            &store,
            &created.id,
            &RouteUpdate { ghg_intensity: Some(90.0), ..Default::default() },
        )
        .unwrap();

        assert_eq!(updated.ghg_intensity, 90.0);
        assert!(updated.is_baseline);
        assert_eq!(
            RouteRepository::find_by_id(&store, &created.id).unwrap().unwrap().ghg_intensity,
            90.0
        );
    }

    #[test]
    fn test_ledger_over_sqlite() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert(NewComplianceBalance::new("SHIP001", 2024, 15_000.0)).unwrap();
        let ledger = BankingLedger::new(&store, &store);

        ledger
            .bank_surplus(&BankRequest {
                ship_id: "SHIP001".into(),
                year: 2024,
                amount_gco2eq: 10_000.0,
            })
            .unwrap();

        let err = ledger
            .bank_surplus(&BankRequest {
                ship_id: "SHIP001".into(),
                year: 2024,
                amount_gco2eq: 16_000.0,
            })
            .unwrap_err();
        assert!(matches!(err, ComplianceError::ExceedsAvailable { .. }));

        let summary = ledger
            .apply_banked(&BankRequest {
                ship_id: "SHIP001".into(),
                year: 2024,
                amount_gco2eq: 4_000.0,
            })
            .unwrap();
        assert_eq!(summary.cb_after, 19_000.0);

        assert_eq!(store.find_available_balance("SHIP001").unwrap(), 10_000.0);
        assert_eq!(ledger.adjusted_cb("SHIP001", 2024).unwrap().adjusted_cb, 19_000.0);
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fueleu.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.upsert(NewComplianceBalance::new("SHIP001", 2025, 42.0)).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let row = ComplianceRepository::find_by_ship_and_year(&store, "SHIP001", 2025)
            .unwrap()
            .unwrap();
        assert_eq!(row.cb_gco2eq, 42.0);
    }

    #[test]
    fn test_clear_keeps_audit_trail() {
        let store = SqliteStore::open_in_memory().unwrap();
        let created = RouteRepository::create(&store, route("R001", 2024, 91.0, true)).unwrap();

        store.clear().unwrap();

        assert!(store.find_all(&RouteFilters::default()).unwrap().is_empty());
        assert_eq!(store.events_for("route", &created.id).unwrap().len(), 1);
    }
}
