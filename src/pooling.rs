// 🤝 Pooling Engine - surplus ships cover deficit ships
//
// FuelEU Maritime Article 21 pooling, in three phases:
//   1. pre_validate   → at least 2 members, Σ cb_before >= 0
//   2. allocate       → greedy transfer from the largest surpluses to deficits
//   3. post_validate  → no deficit ship exits worse, no surplus ship exits negative
//
// Every phase is a pure function over the member list. PoolService wires them
// to the repositories.
//
// Conservation: Σ cb_after == Σ cb_before for every allocation.

use crate::entities::{NewPool, Pool, PoolAllocation, PoolMemberInput, PoolValidationResult};
use crate::error::{ComplianceError, ComplianceResult};
use crate::repository::{ComplianceRepository, PoolRepository};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, info, warn};

pub const MIN_POOL_MEMBERS: usize = 2;

// ============================================================================
// POOL VALIDATOR
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct PoolValidator;

impl PoolValidator {
    pub fn new() -> Self {
        PoolValidator
    }

    /// Rules checked before any allocation; all violations are reported
    pub fn pre_validate(&self, members: &[PoolMemberInput]) -> PoolValidationResult {
        let mut errors = Vec::new();

        if members.len() < MIN_POOL_MEMBERS {
            errors.push(format!("Pool must have at least {} members", MIN_POOL_MEMBERS));
        }

        for member in members.iter().filter(|m| !m.cb_before.is_finite()) {
            errors.push(format!(
                "CB for {} ({}) must be a finite number",
                member.ship_id, member.cb_before
            ));
        }

        let total_cb: f64 = members.iter().map(|m| m.cb_before).sum();
        if total_cb < 0.0 {
            errors.push(format!(
                "Total CB ({:.2}) must be >= 0 for pool creation",
                total_cb
            ));
        }

        PoolValidationResult::from_errors(errors)
    }

    /// Greedy redistribution of surplus onto deficits
    ///
    /// Members come back sorted by cb_before descending (stable for ties).
    /// Surplus members are drained in that order and the surplus they have
    /// left carries over from one deficit member to the next. Zero-CB
    /// members are left as they are.
    pub fn allocate(&self, members: &[PoolMemberInput]) -> Vec<PoolAllocation> {
        let mut sorted: Vec<&PoolMemberInput> = members.iter().collect();
        sorted.sort_by(|a, b| b.cb_before.partial_cmp(&a.cb_before).unwrap_or(Ordering::Equal));

        let mut result: Vec<PoolAllocation> = sorted
            .into_iter()
            .map(|m| PoolAllocation {
                ship_id: m.ship_id.clone(),
                cb_before: m.cb_before,
                cb_after: m.cb_before,
            })
            .collect();

        let surplus_idx: Vec<usize> = (0..result.len()).filter(|&i| result[i].cb_after > 0.0).collect();
        let deficit_idx: Vec<usize> = (0..result.len()).filter(|&i| result[i].cb_after < 0.0).collect();

        for &d in &deficit_idx {
            let mut remaining = result[d].cb_after.abs();

            for &s in &surplus_idx {
                if remaining <= 0.0 {
                    break;
                }
                if result[s].cb_after <= 0.0 {
                    continue;
                }

                let transfer = result[s].cb_after.min(remaining);
                result[s].cb_after -= transfer;
                result[d].cb_after += transfer;
                remaining -= transfer;

                debug!(
                    from = %result[s].ship_id,
                    to = %result[d].ship_id,
                    transfer,
                    "pool transfer"
                );
            }
        }

        result
    }

    /// Fairness rules checked on the allocation; all violations are reported
    pub fn post_validate(&self, allocations: &[PoolAllocation]) -> PoolValidationResult {
        let mut errors = Vec::new();

        for a in allocations {
            if a.cb_before < 0.0 && a.cb_after < a.cb_before {
                errors.push(format!(
                    "Ship {} with deficit cannot exit worse (before: {}, after: {})",
                    a.ship_id, a.cb_before, a.cb_after
                ));
            }

            if a.cb_before > 0.0 && a.cb_after < 0.0 {
                errors.push(format!(
                    "Ship {} with surplus cannot exit negative (before: {}, after: {})",
                    a.ship_id, a.cb_before, a.cb_after
                ));
            }
        }

        PoolValidationResult::from_errors(errors)
    }
}

// ============================================================================
// POOL SERVICE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePoolRequest {
    pub year: i32,
    pub members: Vec<PoolMemberInput>,
}

pub struct PoolService<'a> {
    pools: &'a dyn PoolRepository,
    compliance: &'a dyn ComplianceRepository,
    validator: PoolValidator,
}

impl<'a> PoolService<'a> {
    pub fn new(pools: &'a dyn PoolRepository, compliance: &'a dyn ComplianceRepository) -> Self {
        PoolService {
            pools,
            compliance,
            validator: PoolValidator::new(),
        }
    }

    /// Validate, allocate and persist a pool
    ///
    /// Members must each have a stored CB for the year, but the allocation
    /// runs on the cb_before values the caller supplied.
    pub fn create_pool(&self, request: &CreatePoolRequest) -> ComplianceResult<Pool> {
        let validation = self.validator.pre_validate(&request.members);
        if !validation.is_valid {
            return Err(rejected(ComplianceError::ValidationFailed {
                stage: "Pool",
                errors: validation.errors,
            }));
        }

        for member in &request.members {
            if self
                .compliance
                .find_by_ship_and_year(&member.ship_id, request.year)?
                .is_none()
            {
                return Err(rejected(ComplianceError::NotFoundComplianceRecord {
                    ship_id: member.ship_id.clone(),
                    year: request.year,
                }));
            }
        }

        let allocations = self.validator.allocate(&request.members);

        let validation = self.validator.post_validate(&allocations);
        if !validation.is_valid {
            return Err(rejected(ComplianceError::ValidationFailed {
                stage: "Pool allocation",
                errors: validation.errors,
            }));
        }

        let pool = self.pools.create(NewPool {
            year: request.year,
            members: allocations,
        })?;

        info!(
            pool_id = %pool.id,
            year = pool.year,
            members = pool.members.len(),
            total_cb = pool.total_after(),
            "created pool"
        );

        Ok(pool)
    }

    pub fn find_by_id(&self, id: &str) -> ComplianceResult<Option<Pool>> {
        Ok(self.pools.find_by_id(id)?)
    }

    pub fn find_by_year(&self, year: i32) -> ComplianceResult<Vec<Pool>> {
        Ok(self.pools.find_by_year(year)?)
    }
}

fn rejected(err: ComplianceError) -> ComplianceError {
    warn!(kind = err.kind(), "pool request rejected: {}", err);
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::NewComplianceBalance;
    use crate::memory::InMemoryStore;
    use proptest::prelude::*;

    fn members(list: &[(&str, f64)]) -> Vec<PoolMemberInput> {
        list.iter().map(|(id, cb)| PoolMemberInput::new(id, *cb)).collect()
    }

    fn after(allocations: &[PoolAllocation], ship_id: &str) -> f64 {
        allocations
            .iter()
            .find(|a| a.ship_id == ship_id)
            .map(|a| a.cb_after)
            .unwrap()
    }

    fn store_with_ships(year: i32, ships: &[(&str, f64)]) -> InMemoryStore {
        let store = InMemoryStore::new();
        for (ship_id, cb) in ships {
            store.upsert(NewComplianceBalance::new(ship_id, year, *cb)).unwrap();
        }
        store
    }

    #[test]
    fn test_allocate_covers_all_deficits() {
        let validator = PoolValidator::new();
        let input = members(&[("S1", 20000.0), ("S2", -10000.0), ("S3", -5000.0)]);

        let result = validator.allocate(&input);

        assert_eq!(after(&result, "S1"), 5000.0);
        assert_eq!(after(&result, "S2"), 0.0);
        assert_eq!(after(&result, "S3"), 0.0);

        let before: f64 = result.iter().map(|a| a.cb_before).sum();
        let after_sum: f64 = result.iter().map(|a| a.cb_after).sum();
        assert_eq!(before, after_sum);
    }

    #[test]
    fn test_allocate_sorts_descending() {
        let validator = PoolValidator::new();
        let input = members(&[("D", -8000.0), ("Z", 0.0), ("S", 10000.0)]);

        let result = validator.allocate(&input);
        let order: Vec<&str> = result.iter().map(|a| a.ship_id.as_str()).collect();

        assert_eq!(order, vec!["S", "Z", "D"]);
        assert_eq!(after(&result, "Z"), 0.0);
    }

    #[test]
    fn test_allocate_surplus_carries_across_deficits() {
        let validator = PoolValidator::new();
        let input = members(&[("A", 6000.0), ("B", 5000.0), ("C", -7000.0), ("D", -3000.0)]);

        let result = validator.allocate(&input);

        // D sorts ahead of C; A covers D, then A and B together cover C
        assert_eq!(after(&result, "A"), 0.0);
        assert_eq!(after(&result, "B"), 1000.0);
        assert_eq!(after(&result, "C"), 0.0);
        assert_eq!(after(&result, "D"), 0.0);
    }

    #[test]
    fn test_allocate_partial_cover_when_total_negative() {
        let validator = PoolValidator::new();
        let input = members(&[("S", 3000.0), ("D", -5000.0)]);

        let result = validator.allocate(&input);

        assert_eq!(after(&result, "S"), 0.0);
        assert_eq!(after(&result, "D"), -2000.0);
    }

    #[test]
    fn test_pre_validate_rules() {
        let validator = PoolValidator::new();

        let single = validator.pre_validate(&members(&[("S1", 1000.0)]));
        assert!(!single.is_valid);
        assert!(single.errors[0].contains("at least 2 members"));

        let negative = validator.pre_validate(&members(&[("S1", 1000.0), ("S2", -5000.0)]));
        assert!(!negative.is_valid);
        assert_eq!(negative.errors, vec!["Total CB (-4000.00) must be >= 0 for pool creation"]);

        let both = validator.pre_validate(&members(&[("S1", -1.0)]));
        assert_eq!(both.errors.len(), 2);

        assert!(validator.pre_validate(&members(&[("S1", 0.0), ("S2", 0.0)])).is_valid);

        let not_a_number = validator.pre_validate(&members(&[("S1", 1000.0), ("S2", f64::NAN)]));
        assert!(!not_a_number.is_valid);
        assert_eq!(not_a_number.errors, vec!["CB for S2 (NaN) must be a finite number"]);

        let infinite = validator.pre_validate(&members(&[("S1", f64::INFINITY), ("S2", -10.0)]));
        assert!(!infinite.is_valid);
    }

    #[test]
    fn test_post_validate_rules() {
        let validator = PoolValidator::new();

        let worse = vec![PoolAllocation { ship_id: "D".into(), cb_before: -100.0, cb_after: -200.0 }];
        let result = validator.post_validate(&worse);
        assert!(!result.is_valid);
        assert!(result.errors[0].contains("cannot exit worse"));

        let negative = vec![PoolAllocation { ship_id: "S".into(), cb_before: 100.0, cb_after: -1.0 }];
        let result = validator.post_validate(&negative);
        assert!(!result.is_valid);
        assert!(result.errors[0].contains("cannot exit negative"));

        let both = [worse, negative].concat();
        assert_eq!(validator.post_validate(&both).errors.len(), 2);

        let fine = vec![
            PoolAllocation { ship_id: "S".into(), cb_before: 100.0, cb_after: 0.0 },
            PoolAllocation { ship_id: "D".into(), cb_before: -100.0, cb_after: 0.0 },
        ];
        assert!(validator.post_validate(&fine).is_valid);
    }

    #[test]
    fn test_create_pool_scenario() {
        let store = store_with_ships(2024, &[("TESTSHIP002", -8000.0), ("TESTSHIP003", 10000.0)]);
        let service = PoolService::new(&store, &store);

        let pool = service
            .create_pool(&CreatePoolRequest {
                year: 2024,
                members: members(&[("TESTSHIP002", -8000.0), ("TESTSHIP003", 10000.0)]),
            })
            .unwrap();

        assert_eq!(pool.year, 2024);
        assert_eq!(pool.members.len(), 2);
        assert!(pool.members.iter().all(|m| m.cb_after >= 0.0));
        assert_eq!(pool.total_before(), 2000.0);
        assert_eq!(pool.total_after(), 2000.0);
        assert_eq!(pool.member("TESTSHIP003").unwrap().cb_after, 2000.0);

        assert_eq!(service.find_by_id(&pool.id).unwrap(), Some(pool.clone()));
        assert_eq!(service.find_by_year(2024).unwrap().len(), 1);
    }

    #[test]
    fn test_create_pool_uses_caller_cb_not_stored() {
        // stored values differ from what the caller asserts
        let store = store_with_ships(2024, &[("A", -1.0), ("B", 1.0)]);
        let service = PoolService::new(&store, &store);

        let pool = service
            .create_pool(&CreatePoolRequest {
                year: 2024,
                members: members(&[("A", 5000.0), ("B", -2000.0)]),
            })
            .unwrap();

        assert_eq!(pool.member("A").unwrap().cb_before, 5000.0);
        assert_eq!(pool.member("A").unwrap().cb_after, 3000.0);
        assert_eq!(pool.member("B").unwrap().cb_after, 0.0);
    }

    #[test]
    fn test_create_pool_rejects_negative_total() {
        let store = store_with_ships(2024, &[("A", 1000.0), ("B", -5000.0)]);
        let service = PoolService::new(&store, &store);

        let err = service
            .create_pool(&CreatePoolRequest {
                year: 2024,
                members: members(&[("A", 1000.0), ("B", -5000.0)]),
            })
            .unwrap_err();

        assert!(matches!(err, ComplianceError::ValidationFailed { .. }));
        assert!(err.to_string().contains("Total CB"));
        assert!(service.find_by_year(2024).unwrap().is_empty());
    }

    #[test]
    fn test_create_pool_joins_all_pre_validation_errors() {
        let store = InMemoryStore::new();
        let service = PoolService::new(&store, &store);

        let err = service
            .create_pool(&CreatePoolRequest {
                year: 2024,
                members: members(&[("A", -10.0)]),
            })
            .unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("at least 2 members, Total CB (-10.00)"));
    }

    #[test]
    fn test_create_pool_rejects_nan_member_before_storing() {
        let store = store_with_ships(2024, &[("A", 1000.0), ("B", -500.0)]);
        let service = PoolService::new(&store, &store);

        let err = service
            .create_pool(&CreatePoolRequest {
                year: 2024,
                members: members(&[("A", 1000.0), ("B", f64::NAN)]),
            })
            .unwrap_err();

        assert_eq!(err.class(), crate::error::ErrorClass::BadRequest);
        assert!(err.to_string().contains("CB for B (NaN)"));
        assert!(service.find_by_year(2024).unwrap().is_empty());
    }

    #[test]
    fn test_create_pool_requires_compliance_records() {
        let store = store_with_ships(2024, &[("A", 1000.0)]);
        let service = PoolService::new(&store, &store);

        let err = service
            .create_pool(&CreatePoolRequest {
                year: 2024,
                members: members(&[("A", 1000.0), ("MISSING", -500.0)]),
            })
            .unwrap_err();

        assert!(matches!(err, ComplianceError::NotFoundComplianceRecord { .. }));
        assert!(err.to_string().contains("MISSING"));
        assert!(service.find_by_year(2024).unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn prop_allocation_conserves_total(cbs in prop::collection::vec(-1_000_000i64..1_000_000, 0..12)) {
            let input: Vec<PoolMemberInput> = cbs
                .iter()
                .enumerate()
                .map(|(i, cb)| PoolMemberInput::new(&format!("S{}", i), *cb as f64))
                .collect();

            let result = PoolValidator::new().allocate(&input);

            prop_assert_eq!(result.len(), input.len());
            let before: f64 = input.iter().map(|m| m.cb_before).sum();
            let after_sum: f64 = result.iter().map(|a| a.cb_after).sum();
            prop_assert!((before - after_sum).abs() < 1e-6);
        }

        #[test]
        fn prop_valid_pools_pass_fairness(cbs in prop::collection::vec(-1_000_000i64..1_000_000, 2..12)) {
            let input: Vec<PoolMemberInput> = cbs
                .iter()
                .enumerate()
                .map(|(i, cb)| PoolMemberInput::new(&format!("S{}", i), *cb as f64))
                .collect();
            let validator = PoolValidator::new();

            prop_assume!(validator.pre_validate(&input).is_valid);
            let result = validator.allocate(&input);

            prop_assert!(validator.post_validate(&result).is_valid);
            prop_assert!(result.iter().all(|a| a.cb_after >= 0.0));
        }
    }
}
