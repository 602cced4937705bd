// ⚓ Compute CB - turn a ship-year's intensity and fuel into a stored balance
//
// target = target_intensity(year)
// energy = fuel_tonnes × 41 000 MJ/t
// CB     = (target - actual) × energy   → upserted for (ship_id, year)

use crate::calculator::ComplianceCalculation;
use crate::entities::{ComplianceBalance, NewComplianceBalance};
use crate::error::{ComplianceError, ComplianceResult};
use crate::repository::ComplianceRepository;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeCbRequest {
    pub ship_id: String,
    pub year: i32,

    /// gCO2e/MJ
    pub actual_intensity: f64,

    /// Tonnes
    pub fuel_consumption: f64,
}

impl ComputeCbRequest {
    /// NaN or infinite inputs would poison the stored balance
    pub fn check_finite(&self) -> ComplianceResult<()> {
        for (field, value) in [
            ("actualIntensity", self.actual_intensity),
            ("fuelConsumption", self.fuel_consumption),
        ] {
            if !value.is_finite() {
                return Err(ComplianceError::InvalidInput { field, value });
            }
        }
        Ok(())
    }
}

pub struct ComplianceService<'a> {
    compliance: &'a dyn ComplianceRepository,
}

impl<'a> ComplianceService<'a> {
    pub fn new(compliance: &'a dyn ComplianceRepository) -> Self {
        ComplianceService { compliance }
    }

    /// Compute the CB for a ship-year and store it, replacing any prior value
    pub fn compute_cb(&self, request: &ComputeCbRequest) -> ComplianceResult<ComplianceBalance> {
        request.check_finite().map_err(|err| {
            warn!(ship_id = %request.ship_id, year = request.year, "rejected CB input: {}", err);
            err
        })?;

        let calc = ComplianceCalculation::compute(
            &request.ship_id,
            request.year,
            request.actual_intensity,
            request.fuel_consumption,
        );

        let stored = self.compliance.upsert(NewComplianceBalance::new(
            &request.ship_id,
            request.year,
            calc.compliance_balance,
        ))?;

        info!(
            ship_id = %stored.ship_id,
            year = stored.year,
            target = calc.target_intensity,
            actual = calc.actual_intensity,
            energy_mj = calc.energy_in_scope,
            cb = stored.cb_gco2eq,
            "computed compliance balance"
        );

        Ok(stored)
    }

    /// Same computation without touching the store
    pub fn preview(&self, request: &ComputeCbRequest) -> ComplianceCalculation {
        ComplianceCalculation::compute(
            &request.ship_id,
            request.year,
            request.actual_intensity,
            request.fuel_consumption,
        )
    }

    pub fn find(&self, ship_id: &str, year: i32) -> ComplianceResult<Option<ComplianceBalance>> {
        Ok(self.compliance.find_by_ship_and_year(ship_id, year)?)
    }
}
