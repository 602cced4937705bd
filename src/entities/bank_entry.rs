// 🏦 Bank Entry - one ledger transaction
//
// The bank ledger is an event log. Banking a surplus appends an entry with
// is_applied = false; applying banked surplus appends a separate entry with
// is_applied = true. Entries are never edited by the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankEntry {
    pub id: String,
    pub ship_id: String,

    /// Year the transaction was recorded against
    pub year: i32,

    /// Always positive
    pub amount_gco2eq: f64,

    /// false = banked surplus, true = record of an application
    pub is_applied: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BankEntry {
    pub fn from_new(entry: NewBankEntry) -> Self {
        let now = Utc::now();

        BankEntry {
            id: super::new_id(),
            ship_id: entry.ship_id,
            year: entry.year,
            amount_gco2eq: entry.amount_gco2eq,
            is_applied: entry.is_applied,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBankEntry {
    pub ship_id: String,
    pub year: i32,
    pub amount_gco2eq: f64,
    pub is_applied: bool,
}

impl NewBankEntry {
    pub fn banked(ship_id: &str, year: i32, amount: f64) -> Self {
        NewBankEntry {
            ship_id: ship_id.to_string(),
            year,
            amount_gco2eq: amount,
            is_applied: false,
        }
    }

    pub fn applied(ship_id: &str, year: i32, amount: f64) -> Self {
        NewBankEntry {
            ship_id: ship_id.to_string(),
            year,
            amount_gco2eq: amount,
            is_applied: true,
        }
    }
}

/// Result of applying banked surplus
///
/// cb_after is a projection for display; the stored CB is not rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankingSummary {
    pub ship_id: String,
    pub year: i32,
    pub cb_before: f64,
    pub applied: f64,
    pub cb_after: f64,
}
