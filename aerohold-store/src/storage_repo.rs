use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;

use aerohold_core::{CatalogWriter, Storage, StoreError, StoreResult};
use aerohold_shared::{
    Airport, AirportId, Flight, FlightId, Route, RouteId, Ticket, TicketId, Traveler, TravelerId,
};

/// `Storage` over the Postgres schema in `migrations/`.
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct RouteRow {
    id: i64,
    from_id: i64,
    from_name: String,
    to_id: i64,
    to_name: String,
}

#[derive(sqlx::FromRow)]
struct FlightRow {
    id: i64,
    route_id: i64,
    capacity: i32,
    base_price: f64,
}

#[derive(sqlx::FromRow)]
struct TravelerRow {
    id: i64,
    name: String,
    route_id: Option<i64>,
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    id: i64,
    flight_id: i64,
    traveler_id: Option<i64>,
    price: f64,
}

impl From<RouteRow> for Route {
    fn from(row: RouteRow) -> Self {
        Route {
            id: row.id,
            airports: [
                Airport { id: row.from_id, name: row.from_name },
                Airport { id: row.to_id, name: row.to_name },
            ],
        }
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn get_traveler_by_id(&self, id: TravelerId) -> StoreResult<Option<Traveler>> {
        let row = sqlx::query_as::<_, TravelerRow>("SELECT id, name, route_id FROM traveler WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let route = match row.route_id {
            Some(route_id) => self.get_route_by_id(route_id).await?,
            None => None,
        };

        Ok(Some(Traveler { id: row.id, name: row.name, route }))
    }

    async fn get_route_by_id(&self, id: RouteId) -> StoreResult<Option<Route>> {
        let row = sqlx::query_as::<_, RouteRow>(
            r#"
            SELECT
                r.id,
                fa.id AS from_id, fa.name AS from_name,
                ta.id AS to_id, ta.name AS to_name
            FROM route r
            JOIN airport fa ON fa.id = r.from_airport_id
            JOIN airport ta ON ta.id = r.to_airport_id
            WHERE r.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(row.map(Route::from))
    }

    async fn get_airport_by_id(&self, id: AirportId) -> StoreResult<Option<Airport>> {
        let row: Option<(i64, String)> = sqlx::query_as("SELECT id, name FROM airport WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        Ok(row.map(|(id, name)| Airport { id, name }))
    }

    async fn get_flight_by_id(&self, id: FlightId) -> StoreResult<Option<Flight>> {
        let row = sqlx::query_as::<_, FlightRow>(
            "SELECT id, route_id, capacity, base_price::float8 AS base_price FROM flight WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        let Some(row) = row else {
            return Ok(None);
        };

        // A flight whose route is gone is treated as missing.
        let Some(route) = self.get_route_by_id(row.route_id).await? else {
            return Ok(None);
        };

        Ok(Some(Flight {
            id: row.id,
            capacity: u32::try_from(row.capacity).unwrap_or(0),
            base_price: row.base_price,
            route,
            booked: None,
            current_ticket_price: None,
        }))
    }

    async fn get_ticket_by_id(&self, id: TicketId) -> StoreResult<Option<Ticket>> {
        let row = sqlx::query_as::<_, TicketRow>(
            "SELECT id, flight_id, traveler_id, price::float8 AS price FROM ticket WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let Some(flight) = self.get_flight_by_id(row.flight_id).await? else {
            return Ok(None);
        };

        let traveler = match row.traveler_id {
            Some(traveler_id) => self.get_traveler_by_id(traveler_id).await?,
            None => None,
        };

        Ok(Some(Ticket { id: row.id, flight, traveler, price: row.price }))
    }

    async fn get_route_ids(&self) -> StoreResult<Vec<RouteId>> {
        sqlx::query_scalar::<_, i64>("SELECT id FROM route ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::backend)
    }

    async fn get_flight_ids_by_route_id(&self, route_id: RouteId) -> StoreResult<Vec<FlightId>> {
        sqlx::query_scalar::<_, i64>("SELECT id FROM flight WHERE route_id = $1 ORDER BY id")
            .bind(route_id)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::backend)
    }

    async fn get_unbooked_ticket_ids(&self, flight_id: FlightId) -> StoreResult<Vec<TicketId>> {
        sqlx::query_scalar::<_, i64>(
            "SELECT id FROM ticket WHERE flight_id = $1 AND traveler_id IS NULL ORDER BY id",
        )
        .bind(flight_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)
    }

    async fn pay_ticket_order(
        &self,
        traveler_id: TravelerId,
        ticket_id: TicketId,
        price: f64,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE ticket SET traveler_id = $1, price = $2::numeric WHERE id = $3")
            .bind(traveler_id)
            .bind(price)
            .bind(ticket_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        info!("Ticket {} sold to traveler {} at {}", ticket_id, traveler_id, price);
        Ok(())
    }

    async fn cancel_ticket_order(&self, ticket_id: TicketId) -> StoreResult<()> {
        sqlx::query("UPDATE ticket SET traveler_id = NULL, price = 0 WHERE id = $1")
            .bind(ticket_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        info!("Ticket {} order cancelled", ticket_id);
        Ok(())
    }
}

#[async_trait]
impl CatalogWriter for PgStorage {
    async fn get_airport_ids(&self) -> StoreResult<Vec<AirportId>> {
        sqlx::query_scalar::<_, i64>("SELECT id FROM airport ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::backend)
    }

    async fn insert_airports(&self, names: &[String]) -> StoreResult<Vec<AirportId>> {
        sqlx::query_scalar::<_, i64>("INSERT INTO airport (name) SELECT * FROM UNNEST($1::text[]) RETURNING id")
            .bind(names)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::backend)
    }

    async fn insert_routes(&self, pairs: &[(AirportId, AirportId)]) -> StoreResult<u64> {
        let (from, to): (Vec<i64>, Vec<i64>) = pairs.iter().copied().unzip();

        let result = sqlx::query(
            r#"
            INSERT INTO route (from_airport_id, to_airport_id)
            SELECT * FROM UNNEST($1::int8[], $2::int8[])
            ON CONFLICT (from_airport_id, to_airport_id) DO NOTHING
            "#,
        )
        .bind(from)
        .bind(to)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(result.rows_affected())
    }

    async fn clear_inventory(&self) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;

        // Tickets reference both flights and travelers.
        for table in ["ticket", "flight", "traveler"] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await
                .map_err(StoreError::backend)?;
        }

        tx.commit().await.map_err(StoreError::backend)?;
        info!("Cleared tickets, flights and travelers");
        Ok(())
    }

    async fn insert_flight(&self, route_id: RouteId, capacity: u32, base_price: f64) -> StoreResult<FlightId> {
        let capacity = i32::try_from(capacity).map_err(StoreError::backend)?;
        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;

        let flight_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO flight (route_id, capacity, base_price) VALUES ($1, $2, $3::numeric) RETURNING id",
        )
        .bind(route_id)
        .bind(capacity)
        .bind(base_price)
        .fetch_one(&mut *tx)
        .await
        .map_err(StoreError::backend)?;

        sqlx::query("INSERT INTO ticket (flight_id, price) SELECT $1, 0 FROM generate_series(1, $2)")
            .bind(flight_id)
            .bind(capacity)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::backend)?;

        tx.commit().await.map_err(StoreError::backend)?;
        Ok(flight_id)
    }

    async fn insert_travelers(&self, travelers: &[(String, RouteId)]) -> StoreResult<u64> {
        let (names, route_ids): (Vec<String>, Vec<i64>) = travelers.iter().cloned().unzip();

        let result = sqlx::query("INSERT INTO traveler (name, route_id) SELECT * FROM UNNEST($1::text[], $2::int8[])")
            .bind(names)
            .bind(route_ids)
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        Ok(result.rows_affected())
    }
}
