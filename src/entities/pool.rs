// 🤝 Pool - ships sharing compliance balance for one year
//
// A pool is created together with all of its members and never changes
// afterwards. Members belong to exactly one pool.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    pub id: String,
    pub year: i32,
    pub created_at: DateTime<Utc>,
    pub members: Vec<PoolMember>,
}

impl Pool {
    /// Build a pool and its members with fresh identities
    pub fn from_new(pool: NewPool) -> Self {
        let id = super::new_id();
        let members = pool
            .members
            .into_iter()
            .map(|m| PoolMember {
                id: super::new_id(),
                pool_id: id.clone(),
                ship_id: m.ship_id,
                cb_before: m.cb_before,
                cb_after: m.cb_after,
            })
            .collect();

        Pool {
            id,
            year: pool.year,
            created_at: Utc::now(),
            members,
        }
    }

    pub fn total_before(&self) -> f64 {
        self.members.iter().map(|m| m.cb_before).sum()
    }

    pub fn total_after(&self) -> f64 {
        self.members.iter().map(|m| m.cb_after).sum()
    }

    pub fn member(&self, ship_id: &str) -> Option<&PoolMember> {
        self.members.iter().find(|m| m.ship_id == ship_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolMember {
    pub id: String,
    pub pool_id: String,
    pub ship_id: String,

    /// CB asserted by the caller at pool creation
    pub cb_before: f64,

    /// CB after redistribution
    pub cb_after: f64,
}

/// Caller-supplied member of a pool request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolMemberInput {
    pub ship_id: String,
    pub cb_before: f64,
}

impl PoolMemberInput {
    pub fn new(ship_id: &str, cb_before: f64) -> Self {
        PoolMemberInput {
            ship_id: ship_id.to_string(),
            cb_before,
        }
    }
}

/// One member after allocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolAllocation {
    pub ship_id: String,
    pub cb_before: f64,
    pub cb_after: f64,
}

/// Payload for atomic pool + members insert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPool {
    pub year: i32,
    pub members: Vec<PoolAllocation>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl PoolValidationResult {
    pub fn from_errors(errors: Vec<String>) -> Self {
        PoolValidationResult {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}
