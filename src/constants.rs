// 📜 Regulatory Constants - FuelEU Maritime target intensities
// Regulation (EU) 2023/1805, Annex IV
//
// Targets are a step function over threshold years. A year takes the value of
// the highest threshold it has reached; anything before 2025 sits on the
// reference baseline.

/// Reference GHG intensity before any reduction applies (gCO2e/MJ)
pub const BASELINE_INTENSITY: f64 = 91.16;

/// Lower calorific value used to convert fuel mass to energy (MJ per tonne)
pub const ENERGY_PER_TONNE_FUEL: f64 = 41_000.0;

/// First year the regulation applies
pub const FIRST_COMPLIANCE_YEAR: i32 = 2025;

/// (threshold year, target intensity gCO2e/MJ), highest threshold first
pub const TARGET_INTENSITIES: [(i32, f64); 8] = [
    (2050, 18.232),  // -80%
    (2045, 49.6368), // -46%
    (2040, 58.8176), // -35.5%
    (2035, 68.37),   // -26%
    (2030, 78.7792), // -13.5%
    (2027, 85.7176), // -6%
    (2026, 87.9832), // -3.5%
    (2025, 89.3368), // -2%
];
