//! Consultas de solo lectura sobre viajes y recursos

use std::sync::Arc;

use uuid::Uuid;

use crate::models::{Driver, DriverStatus, Trip, TripFilter, TripStatus, Truck, TruckStatus};
use crate::repositories::FleetStore;
use crate::utils::errors::{not_found_error, AppResult, EntityKind};

pub struct TripQueryService {
    store: Arc<dyn FleetStore>,
}

impl TripQueryService {
    pub fn new(store: Arc<dyn FleetStore>) -> Self {
        Self { store }
    }

    pub async fn get_trip(&self, trip_id: Uuid) -> AppResult<Trip> {
        self.store
            .get_trip(trip_id)
            .await?
            .ok_or_else(|| not_found_error(EntityKind::Trip, trip_id))
    }

    pub async fn list_trips(&self, filter: &TripFilter) -> AppResult<Vec<Trip>> {
        self.store.list_trips(filter).await
    }

    pub async fn trips_by_driver(&self, driver_id: Uuid) -> AppResult<Vec<Trip>> {
        self.store.list_trips(&TripFilter::by_driver(driver_id)).await
    }

    pub async fn trips_by_truck(&self, truck_id: Uuid) -> AppResult<Vec<Trip>> {
        self.store.list_trips(&TripFilter::by_truck(truck_id)).await
    }

    pub async fn trips_by_status(&self, status: TripStatus) -> AppResult<Vec<Trip>> {
        self.store.list_trips(&TripFilter::by_status(status)).await
    }

    /// Viajes en curso (IN_PROGRESS)
    pub async fn active_trips(&self) -> AppResult<Vec<Trip>> {
        self.trips_by_status(TripStatus::InProgress).await
    }

    pub async fn available_trucks(&self) -> AppResult<Vec<Truck>> {
        let mut trucks = self.store.list_trucks(Some(TruckStatus::Available)).await?;
        // Filas heredadas con ACTIVE también están disponibles
        trucks.extend(self.store.list_trucks(Some(TruckStatus::Active)).await?);
        trucks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(trucks)
    }

    pub async fn available_drivers(&self) -> AppResult<Vec<Driver>> {
        self.store.list_drivers(Some(DriverStatus::Active)).await
    }
}
