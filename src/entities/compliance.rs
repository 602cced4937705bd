// ⚖️ Compliance Balance - one row per ship-year
//
// Recomputing a ship-year overwrites cb_gco2eq in place; no history is kept.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceBalance {
    pub id: String,
    pub ship_id: String,
    pub year: i32,

    /// Signed gCO2eq: positive = surplus, negative = deficit
    pub cb_gco2eq: f64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ComplianceBalance {
    pub fn from_new(record: NewComplianceBalance) -> Self {
        let now = Utc::now();

        ComplianceBalance {
            id: super::new_id(),
            ship_id: record.ship_id,
            year: record.year,
            cb_gco2eq: record.cb_gco2eq,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_surplus(&self) -> bool {
        self.cb_gco2eq > 0.0
    }

    pub fn is_deficit(&self) -> bool {
        self.cb_gco2eq < 0.0
    }
}

/// Insert/upsert payload keyed by (ship_id, year)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComplianceBalance {
    pub ship_id: String,
    pub year: i32,
    pub cb_gco2eq: f64,
}

impl NewComplianceBalance {
    pub fn new(ship_id: &str, year: i32, cb_gco2eq: f64) -> Self {
        NewComplianceBalance {
            ship_id: ship_id.to_string(),
            year,
            cb_gco2eq,
        }
    }
}

/// Stored CB plus the banked surplus applied in that same year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustedComplianceBalance {
    pub ship_id: String,
    pub year: i32,
    pub original_cb: f64,
    pub banked_amount: f64,
    pub adjusted_cb: f64,
}
