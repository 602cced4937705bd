// 🏦 Banking Ledger - bank surplus now, apply it later
//
// The ledger is an append-only log of BankEntry records:
//   bank  → entry { is_applied: false }  (surplus put aside)
//   apply → entry { is_applied: true }   (record of an application)
//
// Available balance = Σ amount over is_applied = false, across every year.
// Applying does not consume the banked entries; it only appends a record.
// Adjusted CB for a ship-year adds the applied records of that exact year.
//
// Preconditions are checked in a fixed order and the first failure wins.
// Nothing is written before every check has passed.

use crate::entities::{AdjustedComplianceBalance, BankEntry, BankingSummary, NewBankEntry};
use crate::error::{ComplianceError, ComplianceResult};
use crate::repository::{BankRepository, ComplianceRepository};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ============================================================================
// LEDGER REDUCERS
// ============================================================================

/// Sum of entries still banked (never applied), regardless of year
pub fn available_balance(entries: &[BankEntry]) -> f64 {
    entries
        .iter()
        .filter(|e| !e.is_applied)
        .map(|e| e.amount_gco2eq)
        .sum()
}

/// Sum of application records made against `year`
pub fn applied_total(entries: &[BankEntry], year: i32) -> f64 {
    entries
        .iter()
        .filter(|e| e.is_applied && e.year == year)
        .map(|e| e.amount_gco2eq)
        .sum()
}

// ============================================================================
// REQUESTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankRequest {
    pub ship_id: String,
    pub year: i32,
    pub amount_gco2eq: f64,
}

// ============================================================================
// BANKING LEDGER
// ============================================================================

pub struct BankingLedger<'a> {
    bank: &'a dyn BankRepository,
    compliance: &'a dyn ComplianceRepository,
}

impl<'a> BankingLedger<'a> {
    pub fn new(bank: &'a dyn BankRepository, compliance: &'a dyn ComplianceRepository) -> Self {
        BankingLedger { bank, compliance }
    }

    /// Bank part or all of a ship-year's surplus
    ///
    /// The stored CB is re-read on every call and is not reduced by banking,
    /// so two calls against the same surplus can both succeed.
    pub fn bank_surplus(&self, request: &BankRequest) -> ComplianceResult<BankEntry> {
        let BankRequest { ship_id, year, amount_gco2eq: amount } = request;

        ensure_positive("bank", *amount)?;

        let compliance = self
            .compliance
            .find_by_ship_and_year(ship_id, *year)?
            .ok_or_else(|| not_found(ship_id, *year))?;

        if compliance.cb_gco2eq <= 0.0 {
            return Err(rejected(ComplianceError::NoSurplus {
                ship_id: ship_id.clone(),
                cb: compliance.cb_gco2eq,
            }));
        }

        if *amount > compliance.cb_gco2eq {
            return Err(rejected(ComplianceError::ExceedsAvailable {
                ceiling: "surplus",
                requested: *amount,
                available: compliance.cb_gco2eq,
            }));
        }

        let entry = self.bank.create(NewBankEntry::banked(ship_id, *year, *amount))?;

        info!(
            ship_id = %ship_id,
            year = *year,
            amount = *amount,
            entry_id = %entry.id,
            "banked surplus"
        );

        Ok(entry)
    }

    /// Apply banked surplus against a ship-year
    ///
    /// cb_after in the summary is a projection; the stored CB is untouched.
    pub fn apply_banked(&self, request: &BankRequest) -> ComplianceResult<BankingSummary> {
        let BankRequest { ship_id, year, amount_gco2eq: amount } = request;

        ensure_positive("apply", *amount)?;

        let compliance = self
            .compliance
            .find_by_ship_and_year(ship_id, *year)?
            .ok_or_else(|| not_found(ship_id, *year))?;

        let available = self.bank.find_available_balance(ship_id)?;

        if available <= 0.0 {
            return Err(rejected(ComplianceError::NoBankedSurplus {
                ship_id: ship_id.clone(),
            }));
        }

        if *amount > available {
            return Err(rejected(ComplianceError::ExceedsAvailable {
                ceiling: "banked balance",
                requested: *amount,
                available,
            }));
        }

        let entry = self.bank.create(NewBankEntry::applied(ship_id, *year, *amount))?;

        let cb_before = compliance.cb_gco2eq;
        let summary = BankingSummary {
            ship_id: ship_id.clone(),
            year: *year,
            cb_before,
            applied: *amount,
            cb_after: cb_before + amount,
        };

        info!(
            ship_id = %ship_id,
            year = *year,
            applied = *amount,
            cb_before = summary.cb_before,
            cb_after = summary.cb_after,
            entry_id = %entry.id,
            "applied banked surplus"
        );

        Ok(summary)
    }

    /// Stored CB plus everything applied against that exact year
    pub fn adjusted_cb(&self, ship_id: &str, year: i32) -> ComplianceResult<AdjustedComplianceBalance> {
        let compliance = self
            .compliance
            .find_by_ship_and_year(ship_id, year)?
            .ok_or_else(|| not_found(ship_id, year))?;

        let entries = self.bank.find_by_ship_and_year(ship_id, year)?;
        let banked_amount = applied_total(&entries, year);

        Ok(AdjustedComplianceBalance {
            ship_id: ship_id.to_string(),
            year,
            original_cb: compliance.cb_gco2eq,
            banked_amount,
            adjusted_cb: compliance.cb_gco2eq + banked_amount,
        })
    }

    /// Ledger entries for a ship, optionally narrowed to one year
    pub fn records(&self, ship_id: &str, year: Option<i32>) -> ComplianceResult<Vec<BankEntry>> {
        let entries = match year {
            Some(year) => self.bank.find_by_ship_and_year(ship_id, year)?,
            None => self.bank.find_by_ship(ship_id)?,
        };
        Ok(entries)
    }
}

fn ensure_positive(action: &'static str, amount: f64) -> ComplianceResult<()> {
    // NaN fails this check too
    if !(amount > 0.0) {
        return Err(rejected(ComplianceError::InvalidAmount { action, amount }));
    }
    Ok(())
}

fn not_found(ship_id: &str, year: i32) -> ComplianceError {
    rejected(ComplianceError::NotFoundComplianceRecord {
        ship_id: ship_id.to_string(),
        year,
    })
}

fn rejected(err: ComplianceError) -> ComplianceError {
    warn!(kind = err.kind(), "banking request rejected: {}", err);
    err
}
