// FuelEU Ledger - Core Library
// Compliance balances, banking, pooling and route comparison for the CLI,
// the API server and tests

pub mod constants;
pub mod calculator;
pub mod entities;
pub mod error;
pub mod repository;
pub mod memory;     // In-memory store
pub mod db;         // SQLite store + audit trail
pub mod compliance; // Compute CB
pub mod banking;    // Bank / apply surplus
pub mod pooling;    // Pool validation + allocation
pub mod comparison; // Routes vs baseline
pub mod seed;
pub mod config;

// Re-export commonly used types
pub use calculator::{
    compliance_balance, energy_in_scope, is_compliant, percent_diff, target_intensity,
    ComplianceCalculation,
};
pub use entities::{
    AdjustedComplianceBalance, BankEntry, BankingSummary, ComplianceBalance, NewBankEntry,
    NewComplianceBalance, NewPool, NewRoute, Pool, PoolAllocation, PoolMember, PoolMemberInput,
    PoolValidationResult, Route, RouteComparison, RouteFilters, RouteUpdate,
};
pub use error::{ComplianceError, ComplianceResult, ErrorClass, StoreError, StoreResult};
pub use repository::{BankRepository, ComplianceRepository, PoolRepository, RouteRepository};
pub use memory::InMemoryStore;
pub use db::{get_events_for_entity, insert_event, setup_database, Event, SqliteStore};
pub use compliance::{ComplianceService, ComputeCbRequest};
pub use banking::{BankRequest, BankingLedger};
pub use pooling::{CreatePoolRequest, PoolService, PoolValidator};
pub use comparison::{ComparisonEngine, RouteService};
pub use seed::{import_routes, load_routes_csv, seed, ImportSummary, SeedSummary};
pub use config::{init_tracing, AppConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
