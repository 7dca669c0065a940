use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};

use aerohold_core::{CatalogWriter, StoreResult};
use aerohold_shared::{Route, RouteId};
use aerohold_store::app_config::GeneratorConfig;

/// What one generator run wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeneratedInventory {
    pub airports: usize,
    pub routes: usize,
    pub flights: usize,
    pub tickets: u64,
    pub travelers: u64,
}

struct FlightPlan {
    route_id: RouteId,
    capacity: u32,
    base_price: f64,
}

/// Builds a synthetic network: about sqrt(flight_count) airports, every
/// ordered airport pair as a route, flights and travelers spread over the
/// routes round-robin.
///
/// Airports and routes are only ever topped up. Flights, tickets and
/// travelers are replaced on every run.
pub struct DataGenerator {
    writer: Arc<dyn CatalogWriter>,
    config: GeneratorConfig,
}

/// Distance-based fare: 100 per step between the two airport ids.
pub fn route_base_price(route: &Route) -> f64 {
    let [from, to] = &route.airports;
    ((from.id - to.id).abs() * 100) as f64
}

impl DataGenerator {
    pub fn new(writer: Arc<dyn CatalogWriter>, config: GeneratorConfig) -> Self {
        Self { writer, config }
    }

    pub async fn generate(&self) -> StoreResult<GeneratedInventory> {
        let mut summary = GeneratedInventory::default();

        let airport_ids = self.top_up_airports().await?;
        summary.airports = airport_ids.len();

        let pairs: Vec<_> = airport_ids
            .iter()
            .flat_map(|from| airport_ids.iter().map(move |to| (*from, *to)))
            .filter(|(from, to)| from != to)
            .collect();
        self.writer.insert_routes(&pairs).await?;

        let mut routes = Vec::new();
        for route_id in self.writer.get_route_ids().await? {
            if let Some(route) = self.writer.get_route_by_id(route_id).await? {
                routes.push(route);
            }
        }
        summary.routes = routes.len();
        if routes.is_empty() {
            warn!("No routes to place flights on, inventory left as is");
            return Ok(summary);
        }

        self.writer.clear_inventory().await?;

        for plan in self.plan_flights(&routes) {
            self.writer.insert_flight(plan.route_id, plan.capacity, plan.base_price).await?;
            summary.flights += 1;
            summary.tickets += u64::from(plan.capacity);
        }

        let travelers: Vec<(String, RouteId)> = (0..self.config.traveler_count as usize)
            .map(|i| (format!("traveler-{}", i), routes[i % routes.len()].id))
            .collect();
        summary.travelers = self.writer.insert_travelers(&travelers).await?;

        info!(
            "Generated {} airports, {} routes, {} flights with {} tickets, {} travelers",
            summary.airports, summary.routes, summary.flights, summary.tickets, summary.travelers
        );
        Ok(summary)
    }

    async fn top_up_airports(&self) -> StoreResult<Vec<i64>> {
        let target = f64::from(self.config.flight_count).sqrt().ceil() as usize;
        let mut ids = self.writer.get_airport_ids().await?;

        if ids.len() < target {
            let names: Vec<String> = (ids.len()..target).map(|n| format!("AirPort-{}", n)).collect();
            ids.extend(self.writer.insert_airports(&names).await?);
            ids.sort_unstable();
        }
        Ok(ids)
    }

    fn plan_flights(&self, routes: &[Route]) -> Vec<FlightPlan> {
        let low = self.config.min_capacity.min(self.config.max_capacity);
        let high = self.config.min_capacity.max(self.config.max_capacity);
        let mut rng = rand::thread_rng();

        (0..self.config.flight_count as usize)
            .map(|i| {
                let route = &routes[i % routes.len()];
                FlightPlan {
                    route_id: route.id,
                    capacity: rng.gen_range(low..=high),
                    base_price: route_base_price(route),
                }
            })
            .collect()
    }
}
