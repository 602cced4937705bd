// 🧮 Compliance Calculator - pure CB arithmetic
//
// Formula:
//   CB = (target_intensity - actual_intensity) × energy_in_scope
//
// Positive CB is a surplus (ship ran cleaner than required), negative is a
// deficit. Nothing here touches storage; every function is total over its
// numeric domain.

use crate::constants::{BASELINE_INTENSITY, ENERGY_PER_TONNE_FUEL, TARGET_INTENSITIES};
use serde::{Deserialize, Serialize};

/// Target GHG intensity (gCO2e/MJ) for a reporting year
pub fn target_intensity(year: i32) -> f64 {
    for (threshold, target) in TARGET_INTENSITIES {
        if year >= threshold {
            return target;
        }
    }

    BASELINE_INTENSITY
}

/// Energy in scope (MJ) from fuel consumption in tonnes
pub fn energy_in_scope(fuel_consumption_tonnes: f64) -> f64 {
    fuel_consumption_tonnes * ENERGY_PER_TONNE_FUEL
}

/// Compliance balance in gCO2eq
pub fn compliance_balance(target_intensity: f64, actual_intensity: f64, energy_in_scope: f64) -> f64 {
    (target_intensity - actual_intensity) * energy_in_scope
}

/// Percentage difference of `comparison` relative to `baseline`
///
/// A zero baseline yields 0 instead of dividing by zero.
pub fn percent_diff(comparison: f64, baseline: f64) -> f64 {
    if baseline == 0.0 {
        return 0.0;
    }

    ((comparison / baseline) - 1.0) * 100.0
}

/// Compliant when actual intensity does not exceed the target (inclusive)
pub fn is_compliant(actual_intensity: f64, target_intensity: f64) -> bool {
    actual_intensity <= target_intensity
}

// ============================================================================
// CALCULATION BREAKDOWN
// ============================================================================

/// Every intermediate value of a CB computation for one ship-year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceCalculation {
    pub ship_id: String,
    pub year: i32,
    pub target_intensity: f64,
    pub actual_intensity: f64,
    pub energy_in_scope: f64,
    pub compliance_balance: f64,
}

impl ComplianceCalculation {
    pub fn compute(ship_id: &str, year: i32, actual_intensity: f64, fuel_consumption_tonnes: f64) -> Self {
        let target = target_intensity(year);
        let energy = energy_in_scope(fuel_consumption_tonnes);

        ComplianceCalculation {
            ship_id: ship_id.to_string(),
            year,
            target_intensity: target,
            actual_intensity,
            energy_in_scope: energy,
            compliance_balance: compliance_balance(target, actual_intensity, energy),
        }
    }

    pub fn is_surplus(&self) -> bool {
        self.compliance_balance > 0.0
    }

    pub fn is_compliant(&self) -> bool {
        is_compliant(self.actual_intensity, self.target_intensity)
    }
}
