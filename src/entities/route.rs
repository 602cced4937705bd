// 🚢 Route - voyage-level emissions data
//
// At most one route carries is_baseline = true. The store enforces this in
// set_baseline; nothing else flips the flag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: String,

    /// Business key, e.g. "R001"
    pub route_id: String,

    pub vessel_type: String,
    pub fuel_type: String,
    pub year: i32,

    /// gCO2e/MJ
    pub ghg_intensity: f64,

    /// Tonnes
    pub fuel_consumption: f64,

    /// km
    pub distance: f64,

    /// Tonnes CO2e
    pub total_emissions: f64,

    pub is_baseline: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Route {
    pub fn from_new(route: NewRoute) -> Self {
        let now = Utc::now();

        Route {
            id: super::new_id(),
            route_id: route.route_id,
            vessel_type: route.vessel_type,
            fuel_type: route.fuel_type,
            year: route.year,
            ghg_intensity: route.ghg_intensity,
            fuel_consumption: route.fuel_consumption,
            distance: route.distance,
            total_emissions: route.total_emissions,
            is_baseline: route.is_baseline,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update in place
    pub fn apply(&mut self, update: &RouteUpdate) {
        if let Some(v) = &update.vessel_type {
            self.vessel_type = v.clone();
        }
        if let Some(f) = &update.fuel_type {
            self.fuel_type = f.clone();
        }
        if let Some(y) = update.year {
            self.year = y;
        }
        if let Some(g) = update.ghg_intensity {
            self.ghg_intensity = g;
        }
        if let Some(c) = update.fuel_consumption {
            self.fuel_consumption = c;
        }
        if let Some(d) = update.distance {
            self.distance = d;
        }
        if let Some(e) = update.total_emissions {
            self.total_emissions = e;
        }
        self.updated_at = Utc::now();
    }
}

/// Route row as read from CSV or a create request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRoute {
    pub route_id: String,
    pub vessel_type: String,
    pub fuel_type: String,
    pub year: i32,
    pub ghg_intensity: f64,
    pub fuel_consumption: f64,
    pub distance: f64,
    pub total_emissions: f64,
    #[serde(default)]
    pub is_baseline: bool,
}

/// Partial update; the baseline flag is only changed through set_baseline
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteUpdate {
    pub vessel_type: Option<String>,
    pub fuel_type: Option<String>,
    pub year: Option<i32>,
    pub ghg_intensity: Option<f64>,
    pub fuel_consumption: Option<f64>,
    pub distance: Option<f64>,
    pub total_emissions: Option<f64>,
}

/// Exact-match filters; None matches everything
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteFilters {
    pub vessel_type: Option<String>,
    pub fuel_type: Option<String>,
    pub year: Option<i32>,
}

impl RouteFilters {
    pub fn matches(&self, route: &Route) -> bool {
        self.vessel_type.as_deref().map_or(true, |v| route.vessel_type == v)
            && self.fuel_type.as_deref().map_or(true, |f| route.fuel_type == f)
            && self.year.map_or(true, |y| route.year == y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteComparison {
    pub baseline: Route,
    pub comparison: Route,
    pub percent_diff: f64,
    pub compliant: bool,
}
