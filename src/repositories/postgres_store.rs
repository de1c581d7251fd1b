use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::debug;
use uuid::Uuid;

use super::{FleetStore, FleetTransaction, MileageUpdate};
use crate::models::{
    Driver, DriverStatus, ResourceKind, ResourceRef, ResourceStatus, Trip, TripFilter, TripStatus,
    TripStatusChange, Truck, TruckStatus,
};
use crate::utils::errors::{classify_db_error, AppResult};

const TRIP_COLUMNS: &str = "id, truck_id, driver_id, client_id, origin, destination, distance, \
     estimated_cost, actual_cost, revenue, fuel_cost, maintenance_cost, other_expenses, status, \
     start_date, end_date, created_at, updated_at";

/// Almacén PostgreSQL. Cada unidad de trabajo es una transacción; el
/// compare-and-swap es un `UPDATE ... WHERE status = $expected` que toma el
/// bloqueo de fila hasta el commit, acotado por `lock_timeout`.
#[derive(Clone)]
pub struct PgFleetStore {
    pool: PgPool,
    lock_timeout_ms: u64,
}

impl PgFleetStore {
    pub fn new(pool: PgPool, lock_timeout_ms: u64) -> Self {
        Self { pool, lock_timeout_ms }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn push_trip_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &TripFilter) {
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status);
    }
    if let Some(driver_id) = filter.driver_id {
        builder.push(" AND driver_id = ").push_bind(driver_id);
    }
    if let Some(truck_id) = filter.truck_id {
        builder.push(" AND truck_id = ").push_bind(truck_id);
    }
    if let Some(client_id) = filter.client_id {
        builder.push(" AND client_id = ").push_bind(client_id);
    }
}

#[async_trait]
impl FleetStore for PgFleetStore {
    async fn begin(&self) -> AppResult<Box<dyn FleetTransaction>> {
        let mut tx = self.pool.begin().await.map_err(classify_db_error)?;

        // SET no admite parámetros; el valor es un entero de configuración
        sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout_ms))
            .execute(&mut *tx)
            .await
            .map_err(classify_db_error)?;

        Ok(Box::new(PgFleetTransaction { tx }))
    }

    async fn get_trip(&self, id: Uuid) -> AppResult<Option<Trip>> {
        let trip = sqlx::query_as::<_, Trip>(&format!("SELECT {} FROM trips WHERE id = $1", TRIP_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify_db_error)?;

        Ok(trip)
    }

    async fn list_trips(&self, filter: &TripFilter) -> AppResult<Vec<Trip>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM trips WHERE TRUE", TRIP_COLUMNS));
        push_trip_filter(&mut builder, filter);
        builder.push(" ORDER BY created_at DESC");

        let trips = builder
            .build_query_as::<Trip>()
            .fetch_all(&self.pool)
            .await
            .map_err(classify_db_error)?;

        Ok(trips)
    }

    async fn get_truck(&self, id: Uuid) -> AppResult<Option<Truck>> {
        let truck = sqlx::query_as::<_, Truck>("SELECT * FROM trucks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify_db_error)?;

        Ok(truck)
    }

    async fn get_driver(&self, id: Uuid) -> AppResult<Option<Driver>> {
        let driver = sqlx::query_as::<_, Driver>("SELECT * FROM drivers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify_db_error)?;

        Ok(driver)
    }

    async fn list_trucks(&self, status: Option<TruckStatus>) -> AppResult<Vec<Truck>> {
        let trucks = sqlx::query_as::<_, Truck>(
            "SELECT * FROM trucks WHERE ($1::truck_status IS NULL OR status = $1) ORDER BY created_at DESC",
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await
        .map_err(classify_db_error)?;

        Ok(trucks)
    }

    async fn list_drivers(&self, status: Option<DriverStatus>) -> AppResult<Vec<Driver>> {
        let drivers = sqlx::query_as::<_, Driver>(
            "SELECT * FROM drivers WHERE ($1::driver_status IS NULL OR status = $1) ORDER BY created_at DESC",
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await
        .map_err(classify_db_error)?;

        Ok(drivers)
    }

    async fn count_open_trips(&self, filter: &TripFilter) -> AppResult<i64> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM trips WHERE status IN ('PLANNED', 'IN_PROGRESS')",
        );
        push_trip_filter(&mut builder, filter);

        let (count,): (i64,) = builder
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(classify_db_error)?;

        Ok(count)
    }

    async fn update_mileage(&self, truck_id: Uuid, mileage: Decimal) -> AppResult<Option<MileageUpdate>> {
        let updated = sqlx::query_as::<_, Truck>(
            r#"
            UPDATE trucks
            SET total_mileage = $2, updated_at = $3
            WHERE id = $1 AND total_mileage <= $2
            RETURNING *
            "#,
        )
        .bind(truck_id)
        .bind(mileage)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(classify_db_error)?;

        if let Some(truck) = updated {
            return Ok(Some(MileageUpdate::Applied(truck)));
        }

        // Ninguna fila: o no existe o el valor es menor al registrado
        Ok(self
            .get_truck(truck_id)
            .await?
            .map(|truck| MileageUpdate::Rejected {
                current: truck.total_mileage,
            }))
    }
}

pub struct PgFleetTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl FleetTransaction for PgFleetTransaction {
    async fn resource_status(&mut self, resource: ResourceRef) -> AppResult<Option<ResourceStatus>> {
        let status = match resource.kind {
            ResourceKind::Truck => sqlx::query_scalar::<_, TruckStatus>("SELECT status FROM trucks WHERE id = $1")
                .bind(resource.id)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(classify_db_error)?
                .map(ResourceStatus::Truck),
            ResourceKind::Driver => sqlx::query_scalar::<_, DriverStatus>("SELECT status FROM drivers WHERE id = $1")
                .bind(resource.id)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(classify_db_error)?
                .map(ResourceStatus::Driver),
        };

        Ok(status)
    }

    async fn cas_resource_status(
        &mut self,
        resource: ResourceRef,
        expected: ResourceStatus,
        new: ResourceStatus,
    ) -> AppResult<bool> {
        let now = Utc::now();
        let result = match (expected, new) {
            (ResourceStatus::Truck(expected), ResourceStatus::Truck(new)) => {
                sqlx::query("UPDATE trucks SET status = $3, updated_at = $4 WHERE id = $1 AND status = $2")
                    .bind(resource.id)
                    .bind(expected)
                    .bind(new)
                    .bind(now)
                    .execute(&mut *self.tx)
                    .await
            }
            (ResourceStatus::Driver(expected), ResourceStatus::Driver(new)) => {
                sqlx::query("UPDATE drivers SET status = $3, updated_at = $4 WHERE id = $1 AND status = $2")
                    .bind(resource.id)
                    .bind(expected)
                    .bind(new)
                    .bind(now)
                    .execute(&mut *self.tx)
                    .await
            }
            // Tipos mezclados: la precondición nunca puede cumplirse
            _ => return Ok(false),
        }
        .map_err(classify_db_error)?;

        debug!(
            "🔁 CAS {} {} -> {}: {} fila(s)",
            resource,
            expected,
            new,
            result.rows_affected()
        );
        Ok(result.rows_affected() == 1)
    }

    async fn client_exists(&mut self, client_id: Uuid) -> AppResult<bool> {
        let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM clients WHERE id = $1)")
            .bind(client_id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(classify_db_error)?;

        Ok(exists)
    }

    async fn insert_trip(&mut self, trip: &Trip) -> AppResult<()> {
        sqlx::query(&format!(
            "INSERT INTO trips ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
            TRIP_COLUMNS
        ))
        .bind(trip.id)
        .bind(trip.truck_id)
        .bind(trip.driver_id)
        .bind(trip.client_id)
        .bind(&trip.origin)
        .bind(&trip.destination)
        .bind(trip.distance)
        .bind(trip.estimated_cost)
        .bind(trip.actual_cost)
        .bind(trip.revenue)
        .bind(trip.fuel_cost)
        .bind(trip.maintenance_cost)
        .bind(trip.other_expenses)
        .bind(trip.status)
        .bind(trip.start_date)
        .bind(trip.end_date)
        .bind(trip.created_at)
        .bind(trip.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(classify_db_error)?;

        Ok(())
    }

    async fn get_trip(&mut self, id: Uuid) -> AppResult<Option<Trip>> {
        // FOR UPDATE: la transición concurrente del mismo viaje espera aquí
        let trip = sqlx::query_as::<_, Trip>(&format!(
            "SELECT {} FROM trips WHERE id = $1 FOR UPDATE",
            TRIP_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(classify_db_error)?;

        Ok(trip)
    }

    async fn update_trip_status(
        &mut self,
        id: Uuid,
        expected: TripStatus,
        change: &TripStatusChange,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE trips
            SET status = $3, start_date = $4, end_date = $5, updated_at = $6
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(change.status)
        .bind(change.start_date)
        .bind(change.end_date)
        .bind(change.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(classify_db_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_trip_details(&mut self, trip: &Trip, expected: TripStatus) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE trips
            SET origin = $3, destination = $4, distance = $5, estimated_cost = $6,
                actual_cost = $7, revenue = $8, fuel_cost = $9, maintenance_cost = $10,
                other_expenses = $11, updated_at = $12
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(trip.id)
        .bind(expected)
        .bind(&trip.origin)
        .bind(&trip.destination)
        .bind(trip.distance)
        .bind(trip.estimated_cost)
        .bind(trip.actual_cost)
        .bind(trip.revenue)
        .bind(trip.fuel_cost)
        .bind(trip.maintenance_cost)
        .bind(trip.other_expenses)
        .bind(trip.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(classify_db_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_trip(&mut self, id: Uuid, expected: TripStatus) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM trips WHERE id = $1 AND status = $2")
            .bind(id)
            .bind(expected)
            .execute(&mut *self.tx)
            .await
            .map_err(classify_db_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await.map_err(classify_db_error)
    }
}
