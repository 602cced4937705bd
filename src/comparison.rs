// 📊 Route Comparison - every route against the baseline route
//
// percent_diff = ((route.ghg / baseline.ghg) - 1) × 100
// compliant    = route.ghg <= target_intensity(route.year)
//
// Results follow the order the route store returns; nothing is re-sorted.

use crate::calculator::{is_compliant, percent_diff, target_intensity};
use crate::entities::{Route, RouteComparison, RouteFilters};
use crate::error::{ComplianceError, ComplianceResult, StoreError};
use crate::repository::RouteRepository;
use tracing::{info, warn};

// ============================================================================
// ROUTE SERVICE
// ============================================================================

pub struct RouteService<'a> {
    routes: &'a dyn RouteRepository,
}

impl<'a> RouteService<'a> {
    pub fn new(routes: &'a dyn RouteRepository) -> Self {
        RouteService { routes }
    }

    pub fn get_routes(&self, filters: &RouteFilters) -> ComplianceResult<Vec<Route>> {
        Ok(self.routes.find_all(filters)?)
    }

    /// Make `route_id` the only baseline route
    pub fn set_baseline(&self, route_id: &str) -> ComplianceResult<Route> {
        if self.routes.find_by_route_id(route_id)?.is_none() {
            warn!(route_id, "baseline change rejected: route not found");
            return Err(ComplianceError::RouteNotFound(route_id.to_string()));
        }

        // a concurrent delete between the lookup and the switch still maps to RouteNotFound
        let route = self.routes.set_baseline(route_id).map_err(|e| match e {
            StoreError::NotFound(_) => ComplianceError::RouteNotFound(route_id.to_string()),
            other => ComplianceError::Storage(other),
        })?;

        info!(route_id, ghg_intensity = route.ghg_intensity, "baseline route set");
        Ok(route)
    }
}

// ============================================================================
// COMPARISON ENGINE
// ============================================================================

pub struct ComparisonEngine<'a> {
    routes: &'a dyn RouteRepository,
}

impl<'a> ComparisonEngine<'a> {
    pub fn new(routes: &'a dyn RouteRepository) -> Self {
        ComparisonEngine { routes }
    }

    pub fn compute(&self, filters: &RouteFilters) -> ComplianceResult<Vec<RouteComparison>> {
        let baseline = self.routes.find_baseline()?.ok_or_else(|| {
            warn!("comparison requested with no baseline route");
            ComplianceError::NoBaseline
        })?;

        let comparisons = self
            .routes
            .find_all(filters)?
            .into_iter()
            .filter(|r| r.route_id != baseline.route_id)
            .map(|route| compare(&baseline, route))
            .collect();

        Ok(comparisons)
    }
}

/// Compare one route against the baseline
pub fn compare(baseline: &Route, route: Route) -> RouteComparison {
    let target = target_intensity(route.year);

    RouteComparison {
        baseline: baseline.clone(),
        percent_diff: percent_diff(route.ghg_intensity, baseline.ghg_intensity),
        compliant: is_compliant(route.ghg_intensity, target),
        comparison: route,
    }
}
