// FuelEU Ledger - command line
//
// Every engine use case against the SQLite store. Results are printed as
// pretty JSON on stdout; logs go to stderr.

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use fueleu_ledger::{
    import_routes, init_tracing, load_routes_csv, seed, AppConfig, BankRequest, BankingLedger,
    ComparisonEngine, ComplianceService, ComputeCbRequest, CreatePoolRequest, PoolMemberInput,
    PoolService, RouteFilters, RouteService, SqliteStore,
};

#[derive(Parser)]
#[command(name = "fueleu")]
#[command(about = "FuelEU Maritime compliance ledger", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "FUELEU_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file (overrides config)
    #[arg(short, long)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct RouteFilterArgs {
    #[arg(long)]
    vessel_type: Option<String>,

    #[arg(long)]
    fuel_type: Option<String>,

    #[arg(long)]
    year: Option<i32>,
}

impl From<RouteFilterArgs> for RouteFilters {
    fn from(args: RouteFilterArgs) -> Self {
        RouteFilters {
            vessel_type: args.vessel_type,
            fuel_type: args.fuel_type,
            year: args.year,
        }
    }
}

#[derive(Args)]
struct LedgerArgs {
    #[arg(long)]
    ship_id: String,

    #[arg(long)]
    year: i32,

    /// gCO2eq
    #[arg(long, allow_negative_numbers = true)]
    amount: f64,
}

impl From<LedgerArgs> for BankRequest {
    fn from(args: LedgerArgs) -> Self {
        BankRequest {
            ship_id: args.ship_id,
            year: args.year,
            amount_gco2eq: args.amount,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Clear the store and load the reference dataset
    Seed,

    /// Import routes from a CSV file (existing routeIds are skipped)
    ImportRoutes { path: PathBuf },

    /// Compute and store the compliance balance for a ship-year
    ComputeCb {
        #[arg(long)]
        ship_id: String,

        #[arg(long)]
        year: i32,

        /// gCO2e/MJ
        #[arg(long)]
        actual_intensity: f64,

        /// Tonnes of fuel
        #[arg(long)]
        fuel_consumption: f64,
    },

    /// Stored CB plus surplus applied against that year
    AdjustedCb {
        #[arg(long)]
        ship_id: String,

        #[arg(long)]
        year: i32,
    },

    /// Bank part of a ship-year's surplus
    Bank(LedgerArgs),

    /// Apply banked surplus to a ship-year
    Apply(LedgerArgs),

    /// List bank ledger entries, newest first
    Records {
        #[arg(long)]
        ship_id: String,

        #[arg(long)]
        year: Option<i32>,
    },

    /// Create a pool; repeat --member SHIP=CB for each member
    PoolCreate {
        #[arg(long)]
        year: i32,

        #[arg(long = "member", required = true, value_parser = parse_member)]
        members: Vec<PoolMemberInput>,
    },

    /// List pools for a year
    Pools {
        #[arg(long)]
        year: i32,
    },

    /// Show one pool
    Pool { id: String },

    /// List routes
    Routes(RouteFilterArgs),

    /// Make a route the baseline
    Baseline { route_id: String },

    /// Compare routes against the baseline
    Compare(RouteFilterArgs),
}

/// Parse SHIP=CB
fn parse_member(raw: &str) -> Result<PoolMemberInput, String> {
    let (ship_id, cb) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SHIP=CB, got {:?}", raw))?;
    let cb: f64 = cb
        .trim()
        .parse()
        .map_err(|e| format!("invalid CB for {}: {}", ship_id, e))?;
    if !cb.is_finite() {
        return Err(format!("CB for {} must be a finite number, got {}", ship_id, cb));
    }
    Ok(PoolMemberInput::new(ship_id.trim(), cb))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database_path = database;
    }

    init_tracing(&config.log_level, config.log_json)?;

    let store = SqliteStore::open(&config.database_path)
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;

    run(cli.command, &store)
}

fn run(command: Command, store: &SqliteStore) -> Result<()> {
    match command {
        Command::Seed => {
            store.clear()?;
            let summary = seed(store, store)?;
            eprintln!(
                "✓ Seeded {} routes and {} compliance records",
                summary.routes.inserted, summary.compliance_records
            );
            print_json(&summary)
        }

        Command::ImportRoutes { path } => {
            let routes = load_routes_csv(&path)?;
            eprintln!("✓ Loaded {} routes from CSV", routes.len());
            let summary = import_routes(store, routes)?;
            eprintln!("✓ Inserted: {} routes", summary.inserted);
            eprintln!("✓ Skipped duplicates: {}", summary.duplicates);
            print_json(&summary)
        }

        Command::ComputeCb { ship_id, year, actual_intensity, fuel_consumption } => {
            let record = ComplianceService::new(store).compute_cb(&ComputeCbRequest {
                ship_id,
                year,
                actual_intensity,
                fuel_consumption,
            })?;
            print_json(&record)
        }

        Command::AdjustedCb { ship_id, year } => {
            let adjusted = BankingLedger::new(store, store).adjusted_cb(&ship_id, year)?;
            print_json(&adjusted)
        }

        Command::Bank(args) => {
            let entry = BankingLedger::new(store, store).bank_surplus(&args.into())?;
            print_json(&entry)
        }

        Command::Apply(args) => {
            let summary = BankingLedger::new(store, store).apply_banked(&args.into())?;
            print_json(&summary)
        }

        Command::Records { ship_id, year } => {
            let records = BankingLedger::new(store, store).records(&ship_id, year)?;
            print_json(&records)
        }

        Command::PoolCreate { year, members } => {
            let pool = PoolService::new(store, store).create_pool(&CreatePoolRequest { year, members })?;
            print_json(&pool)
        }

        Command::Pools { year } => {
            let pools = PoolService::new(store, store).find_by_year(year)?;
            print_json(&pools)
        }

        Command::Pool { id } => {
            let pool = PoolService::new(store, store)
                .find_by_id(&id)?
                .ok_or_else(|| anyhow!("Pool {} not found", id))?;
            print_json(&pool)
        }

        Command::Routes(filters) => {
            let routes = RouteService::new(store).get_routes(&filters.into())?;
            print_json(&routes)
        }

        Command::Baseline { route_id } => {
            let route = RouteService::new(store).set_baseline(&route_id)?;
            print_json(&route)
        }

        Command::Compare(filters) => {
            let comparisons = ComparisonEngine::new(store).compute(&filters.into())?;
            print_json(&comparisons)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_member() {
        let member = parse_member("SHIP002=-8000").unwrap();
        assert_eq!(member.ship_id, "SHIP002");
        assert_eq!(member.cb_before, -8000.0);

        assert!(parse_member("SHIP002").is_err());
        assert!(parse_member("SHIP002=lots").is_err());
        assert!(parse_member("S1=NaN").is_err());
        assert!(parse_member("S1=inf").is_err());
    }

    #[test]
    fn test_pool_create_args() {
        let cli = Cli::try_parse_from([
            "fueleu",
            "pool-create",
            "--year",
            "2025",
            "--member",
            "S1=100",
            "--member",
            "S2=-80",
        ])
        .unwrap();

        match cli.command {
            Command::PoolCreate { year, members } => {
                assert_eq!(year, 2025);
                assert_eq!(members.len(), 2);
                assert_eq!(members[1].cb_before, -80.0);
            }
            _ => panic!("expected pool-create"),
        }
    }

    #[test]
    fn test_compute_cb_rejects_nan_intensity() {
        let store = SqliteStore::open_in_memory().unwrap();

        let err = run(
            Command::ComputeCb {
                ship_id: "SHIP001".into(),
                year: 2025,
                actual_intensity: f64::NAN,
                fuel_consumption: 5000.0,
            },
            &store,
        )
        .unwrap_err();
        assert!(err.to_string().contains("actualIntensity"));
    }

    #[test]
    fn test_run_against_sqlite() {
        let store = SqliteStore::open_in_memory().unwrap();

        run(Command::Seed, &store).unwrap();
        run(
            Command::Bank(LedgerArgs { ship_id: "SHIP001".into(), year: 2024, amount: 5000.0 }),
            &store,
        )
        .unwrap();

        let err = run(
            Command::Bank(LedgerArgs { ship_id: "SHIP002".into(), year: 2024, amount: 100.0 }),
            &store,
        )
        .unwrap_err();
        assert!(err.to_string().contains("no surplus"));

        assert!(run(Command::Pool { id: "missing".into() }, &store).is_err());
    }
}
