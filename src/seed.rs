// 🌱 Seed Data - reference routes and compliance balances
//
// Five routes (R001 is the baseline) and SHIP001-SHIP004 balances for
// 2024-2026. Routes can also be imported from CSV with camelCase headers:
//
//   routeId,vesselType,fuelType,year,ghgIntensity,fuelConsumption,distance,totalEmissions[,isBaseline]

use crate::entities::{NewComplianceBalance, NewRoute};
use crate::error::{StoreError, StoreResult};
use crate::repository::{ComplianceRepository, RouteRepository};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub inserted: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub routes: ImportSummary,
    pub compliance_records: usize,
}

#[allow(clippy::too_many_arguments)]
fn route(
    route_id: &str,
    vessel_type: &str,
    fuel_type: &str,
    year: i32,
    ghg_intensity: f64,
    fuel_consumption: f64,
    distance: f64,
    total_emissions: f64,
    is_baseline: bool,
) -> NewRoute {
    NewRoute {
        route_id: route_id.to_string(),
        vessel_type: vessel_type.to_string(),
        fuel_type: fuel_type.to_string(),
        year,
        ghg_intensity,
        fuel_consumption,
        distance,
        total_emissions,
        is_baseline,
    }
}

pub fn seed_routes() -> Vec<NewRoute> {
    vec![
        route("R001", "Container", "HFO", 2024, 91.0, 5000.0, 12000.0, 4500.0, true),
        route("R002", "BulkCarrier", "LNG", 2024, 88.0, 4800.0, 11500.0, 4200.0, false),
        route("R003", "Tanker", "MGO", 2024, 93.5, 5100.0, 12500.0, 4700.0, false),
        route("R004", "RoRo", "HFO", 2025, 89.2, 4900.0, 11800.0, 4300.0, false),
        route("R005", "Container", "LNG", 2025, 90.5, 4950.0, 11900.0, 4400.0, false),
    ]
}

pub fn seed_compliance() -> Vec<NewComplianceBalance> {
    // (year, [SHIP001, SHIP002, SHIP003, SHIP004])
    let rows: [(i32, [f64; 4]); 3] = [
        (2024, [15_000.0, -8_000.0, 12_000.0, -5_000.0]),
        (2025, [18_000.0, -6_000.0, 14_000.0, -7_000.0]),
        (2026, [20_000.0, -4_000.0, 16_000.0, -9_000.0]),
    ];

    rows.iter()
        .flat_map(|(year, cbs)| {
            cbs.iter().enumerate().map(move |(i, cb)| {
                NewComplianceBalance::new(&format!("SHIP{:03}", i + 1), *year, *cb)
            })
        })
        .collect()
}

/// Insert routes, skipping any whose routeId already exists
pub fn import_routes(routes: &dyn RouteRepository, rows: Vec<NewRoute>) -> StoreResult<ImportSummary> {
    let mut summary = ImportSummary::default();

    for row in rows {
        let route_id = row.route_id.clone();
        match routes.create(row) {
            Ok(_) => summary.inserted += 1,
            Err(StoreError::Conflict(_)) => {
                debug!(route_id = %route_id, "route already present, skipped");
                summary.duplicates += 1;
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        "imported routes"
    );
    Ok(summary)
}

/// Load the reference dataset. Compliance rows are upserted, so running this
/// twice leaves the same state.
pub fn seed(
    routes: &dyn RouteRepository,
    compliance: &dyn ComplianceRepository,
) -> StoreResult<SeedSummary> {
    let route_summary = import_routes(routes, seed_routes())?;

    let mut compliance_records = 0;
    for record in seed_compliance() {
        compliance.upsert(record)?;
        compliance_records += 1;
    }

    info!(
        routes = route_summary.inserted,
        compliance_records,
        "seeded reference data"
    );

    Ok(SeedSummary {
        routes: route_summary,
        compliance_records,
    })
}

pub fn load_routes_csv(csv_path: &Path) -> Result<Vec<NewRoute>> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open CSV file {}", csv_path.display()))?;

    let mut routes = Vec::new();

    for (i, result) in rdr.deserialize().enumerate() {
        // header is line 1
        let route: NewRoute =
            result.with_context(|| format!("Failed to deserialize route on line {}", i + 2))?;
        routes.push(route);
    }

    Ok(routes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::RouteFilters;
    use crate::memory::InMemoryStore;
    use std::io::Write;

    #[test]
    fn test_seed_dataset_shape() {
        let routes = seed_routes();
        assert_eq!(routes.len(), 5);
        assert_eq!(routes.iter().filter(|r| r.is_baseline).count(), 1);
        assert_eq!(routes[0].route_id, "R001");

        let compliance = seed_compliance();
        assert_eq!(compliance.len(), 12);
        assert_eq!(compliance[1].ship_id, "SHIP002");
        assert_eq!(compliance[1].year, 2024);
        assert_eq!(compliance[1].cb_gco2eq, -8_000.0);
        assert_eq!(compliance[11].ship_id, "SHIP004");
        assert_eq!(compliance[11].cb_gco2eq, -9_000.0);
    }

    #[test]
    fn test_seed_twice_is_stable() {
        let store = InMemoryStore::new();

        let first = seed(&store, &store).unwrap();
        assert_eq!(first.routes.inserted, 5);
        assert_eq!(first.compliance_records, 12);

        let second = seed(&store, &store).unwrap();
        assert_eq!(second.routes.inserted, 0);
        assert_eq!(second.routes.duplicates, 5);

        assert_eq!(store.find_all(&RouteFilters::default()).unwrap().len(), 5);
        assert_eq!(store.find_baseline().unwrap().unwrap().route_id, "R001");
        let cb = ComplianceRepository::find_by_ship_and_year(&store, "SHIP003", 2026)
            .unwrap()
            .unwrap();
        assert_eq!(cb.cb_gco2eq, 16_000.0);
    }

    #[test]
    fn test_load_routes_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "routeId,vesselType,fuelType,year,ghgIntensity,fuelConsumption,distance,totalEmissions"
        )
        .unwrap();
        writeln!(file, "R101,Container,HFO,2025,90.1,5000,12000,4500").unwrap();
        writeln!(file, "R102,Tanker,MGO,2026,87.5,4000,9000,3100").unwrap();
        file.flush().unwrap();

        let routes = load_routes_csv(file.path()).unwrap();

        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].route_id, "R101");
        assert_eq!(routes[1].year, 2026);
        assert!(!routes[1].is_baseline);
    }

    #[test]
    fn test_load_routes_csv_reports_bad_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "routeId,vesselType,fuelType,year,ghgIntensity,fuelConsumption,distance,totalEmissions"
        )
        .unwrap();
        writeln!(file, "R101,Container,HFO,not-a-year,90.1,5000,12000,4500").unwrap();
        file.flush().unwrap();

        let err = load_routes_csv(file.path()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
