//! Almacén en memoria
//!
//! Implementación de `FleetStore` para tests y despliegues de un solo
//! proceso. Las unidades de trabajo son optimistas: acumulan sus cambios con
//! la precondición que observaron y los validan todos juntos al confirmar.
//!
//! Ningún cerrojo abarca la comprobación y la reserva de un recurso. El
//! único punto de serialización es la confirmación: valida y aplica los
//! cambios bajo la escritura del `RwLock`, sin esperas de E/S dentro. Eso
//! ordena también las confirmaciones de viajes sin relación entre sí, un
//! coste aceptable en un solo proceso; `PgFleetStore` bloquea por fila.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use rust_decimal::Decimal;
use tracing::{debug, error};
use uuid::Uuid;

use super::{FleetStore, FleetTransaction, MileageUpdate};
use crate::models::{
    Client, Driver, DriverStatus, ResourceKind, ResourceRef, ResourceStatus, Trip, TripFilter,
    TripStatus, TripStatusChange, Truck, TruckStatus,
};
use crate::utils::errors::{conflict_error, AppError, AppResult};

#[derive(Debug, Default)]
struct FleetState {
    trucks: HashMap<Uuid, Truck>,
    drivers: HashMap<Uuid, Driver>,
    clients: HashMap<Uuid, Client>,
    trips: HashMap<Uuid, Trip>,
}

impl FleetState {
    fn resource_status(&self, resource: ResourceRef) -> Option<ResourceStatus> {
        match resource.kind {
            ResourceKind::Truck => self
                .trucks
                .get(&resource.id)
                .map(|t| ResourceStatus::Truck(t.status)),
            ResourceKind::Driver => self
                .drivers
                .get(&resource.id)
                .map(|d| ResourceStatus::Driver(d.status)),
        }
    }

    fn set_resource_status(&mut self, resource: ResourceRef, status: ResourceStatus) {
        let now = Utc::now();
        match status {
            ResourceStatus::Truck(s) => {
                if let Some(truck) = self.trucks.get_mut(&resource.id) {
                    truck.status = s;
                    truck.updated_at = now;
                }
            }
            ResourceStatus::Driver(s) => {
                if let Some(driver) = self.drivers.get_mut(&resource.id) {
                    driver.status = s;
                    driver.updated_at = now;
                }
            }
        }
    }
}

/// Almacén de flota en memoria, clonable y compartido
#[derive(Debug, Clone, Default)]
pub struct MemoryFleetStore {
    state: Arc<RwLock<FleetState>>,
}

impl MemoryFleetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra un camión (alta de flota, fuera del núcleo)
    pub async fn insert_truck(&self, truck: Truck) {
        self.state.write().await.trucks.insert(truck.id, truck);
    }

    pub async fn insert_driver(&self, driver: Driver) {
        self.state.write().await.drivers.insert(driver.id, driver);
    }

    pub async fn insert_client(&self, client: Client) {
        self.state.write().await.clients.insert(client.id, client);
    }

    /// Escribe un estado sin pasar por el registro. Solo para reproducir
    /// datos corruptos o importados fuera de este servicio.
    pub async fn overwrite_resource_status(&self, resource: ResourceRef, status: ResourceStatus) {
        self.state.write().await.set_resource_status(resource, status);
    }

    /// Inserta un viaje sin tocar sus recursos (importaciones externas)
    pub async fn overwrite_trip(&self, trip: Trip) {
        self.state.write().await.trips.insert(trip.id, trip);
    }
}

#[async_trait]
impl FleetStore for MemoryFleetStore {
    async fn begin(&self) -> AppResult<Box<dyn FleetTransaction>> {
        Ok(Box::new(MemoryFleetTransaction {
            state: Arc::clone(&self.state),
            ops: Vec::new(),
            resources: HashMap::new(),
            trips: HashMap::new(),
        }))
    }

    async fn get_trip(&self, id: Uuid) -> AppResult<Option<Trip>> {
        Ok(self.state.read().await.trips.get(&id).cloned())
    }

    async fn list_trips(&self, filter: &TripFilter) -> AppResult<Vec<Trip>> {
        let state = self.state.read().await;
        let mut trips: Vec<Trip> = state
            .trips
            .values()
            .filter(|trip| filter.matches(trip))
            .cloned()
            .collect();
        trips.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(trips)
    }

    async fn get_truck(&self, id: Uuid) -> AppResult<Option<Truck>> {
        Ok(self.state.read().await.trucks.get(&id).cloned())
    }

    async fn get_driver(&self, id: Uuid) -> AppResult<Option<Driver>> {
        Ok(self.state.read().await.drivers.get(&id).cloned())
    }

    async fn list_trucks(&self, status: Option<TruckStatus>) -> AppResult<Vec<Truck>> {
        let state = self.state.read().await;
        let mut trucks: Vec<Truck> = state
            .trucks
            .values()
            .filter(|t| status.map_or(true, |s| t.status == s))
            .cloned()
            .collect();
        trucks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(trucks)
    }

    async fn list_drivers(&self, status: Option<DriverStatus>) -> AppResult<Vec<Driver>> {
        let state = self.state.read().await;
        let mut drivers: Vec<Driver> = state
            .drivers
            .values()
            .filter(|d| status.map_or(true, |s| d.status == s))
            .cloned()
            .collect();
        drivers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(drivers)
    }

    async fn count_open_trips(&self, filter: &TripFilter) -> AppResult<i64> {
        let state = self.state.read().await;
        let count = state
            .trips
            .values()
            .filter(|trip| trip.status.is_open() && filter.matches(trip))
            .count();
        Ok(count as i64)
    }

    async fn update_mileage(&self, truck_id: Uuid, mileage: Decimal) -> AppResult<Option<MileageUpdate>> {
        let mut state = self.state.write().await;
        let Some(truck) = state.trucks.get_mut(&truck_id) else {
            return Ok(None);
        };
        if mileage < truck.total_mileage {
            return Ok(Some(MileageUpdate::Rejected {
                current: truck.total_mileage,
            }));
        }
        truck.total_mileage = mileage;
        truck.updated_at = Utc::now();
        Ok(Some(MileageUpdate::Applied(truck.clone())))
    }
}

/// Cambio pendiente junto con la precondición observada
#[derive(Debug)]
enum PendingOp {
    ResourceCas {
        resource: ResourceRef,
        expected: ResourceStatus,
        new: ResourceStatus,
    },
    InsertTrip(Trip),
    TripStatus {
        id: Uuid,
        expected: TripStatus,
        change: TripStatusChange,
    },
    TripDetails {
        trip: Trip,
        expected: TripStatus,
    },
    DeleteTrip {
        id: Uuid,
        expected: TripStatus,
    },
}

pub struct MemoryFleetTransaction {
    state: Arc<RwLock<FleetState>>,
    ops: Vec<PendingOp>,
    // Vista local de las escrituras propias
    resources: HashMap<ResourceRef, ResourceStatus>,
    trips: HashMap<Uuid, Option<Trip>>,
}

impl MemoryFleetTransaction {
    async fn current_resource(&self, resource: ResourceRef) -> Option<ResourceStatus> {
        if let Some(status) = self.resources.get(&resource) {
            return Some(*status);
        }
        self.state.read().await.resource_status(resource)
    }

    async fn current_trip(&self, id: Uuid) -> Option<Trip> {
        if let Some(trip) = self.trips.get(&id) {
            return trip.clone();
        }
        self.state.read().await.trips.get(&id).cloned()
    }
}

/// Viaje abierto que ya usa el camión o el conductor de `trip`, visto desde
/// el estado confirmado más los cambios previos de la unidad
fn open_trip_sharing_resource(
    trip: &Trip,
    inserted: &[&Trip],
    overlay: &HashMap<Uuid, Option<TripStatus>>,
    state: &FleetState,
) -> Option<Uuid> {
    let shares = |other: &Trip| other.truck_id == trip.truck_id || other.driver_id == trip.driver_id;
    let is_open = |other: &Trip| {
        overlay
            .get(&other.id)
            .copied()
            .unwrap_or(Some(other.status))
            .map_or(false, |status| status.is_open())
    };

    state
        .trips
        .values()
        .chain(inserted.iter().copied())
        .find(|other| other.id != trip.id && shares(*other) && is_open(*other))
        .map(|other| other.id)
}

/// Comprueba cada precondición contra el estado confirmado más los cambios
/// anteriores de la misma unidad.
fn validate(ops: &[PendingOp], state: &FleetState) -> AppResult<()> {
    let mut resources: HashMap<ResourceRef, ResourceStatus> = HashMap::new();
    let mut trips: HashMap<Uuid, Option<TripStatus>> = HashMap::new();
    let mut inserted: Vec<&Trip> = Vec::new();

    for op in ops {
        match op {
            PendingOp::ResourceCas { resource, expected, new } => {
                let current = resources
                    .get(resource)
                    .copied()
                    .or_else(|| state.resource_status(*resource));
                if current != Some(*expected) {
                    return Err(conflict_error(format!(
                        "{} changed concurrently (expected {})",
                        resource, expected
                    )));
                }
                resources.insert(*resource, *new);
            }
            PendingOp::InsertTrip(trip) => {
                let exists = trips
                    .get(&trip.id)
                    .copied()
                    .unwrap_or_else(|| state.trips.get(&trip.id).map(|t| t.status));
                if exists.is_some() {
                    return Err(conflict_error(format!("trip {} already exists", trip.id)));
                }
                if trip.status.is_open() {
                    if let Some(other) = open_trip_sharing_resource(trip, &inserted, &trips, state) {
                        let fault = format!(
                            "trip {} would share truck or driver with open trip {}",
                            trip.id, other
                        );
                        error!("🚨 Fallo de consistencia: {}", fault);
                        return Err(AppError::ConsistencyFault(fault));
                    }
                }
                trips.insert(trip.id, Some(trip.status));
                inserted.push(trip);
            }
            PendingOp::TripStatus { id, expected, change } => {
                let current = trips
                    .get(id)
                    .copied()
                    .unwrap_or_else(|| state.trips.get(id).map(|t| t.status));
                if current != Some(*expected) {
                    return Err(conflict_error(format!("trip {} changed concurrently", id)));
                }
                trips.insert(*id, Some(change.status));
            }
            PendingOp::TripDetails { trip, expected } => {
                let current = trips
                    .get(&trip.id)
                    .copied()
                    .unwrap_or_else(|| state.trips.get(&trip.id).map(|t| t.status));
                if current != Some(*expected) {
                    return Err(conflict_error(format!("trip {} changed concurrently", trip.id)));
                }
            }
            PendingOp::DeleteTrip { id, expected } => {
                let current = trips
                    .get(id)
                    .copied()
                    .unwrap_or_else(|| state.trips.get(id).map(|t| t.status));
                if current != Some(*expected) {
                    return Err(conflict_error(format!("trip {} changed concurrently", id)));
                }
                trips.insert(*id, None);
            }
        }
    }
    Ok(())
}

#[async_trait]
impl FleetTransaction for MemoryFleetTransaction {
    async fn resource_status(&mut self, resource: ResourceRef) -> AppResult<Option<ResourceStatus>> {
        Ok(self.current_resource(resource).await)
    }

    async fn cas_resource_status(
        &mut self,
        resource: ResourceRef,
        expected: ResourceStatus,
        new: ResourceStatus,
    ) -> AppResult<bool> {
        if self.current_resource(resource).await != Some(expected) {
            return Ok(false);
        }
        self.resources.insert(resource, new);
        self.ops.push(PendingOp::ResourceCas { resource, expected, new });
        Ok(true)
    }

    async fn client_exists(&mut self, client_id: Uuid) -> AppResult<bool> {
        Ok(self.state.read().await.clients.contains_key(&client_id))
    }

    async fn insert_trip(&mut self, trip: &Trip) -> AppResult<()> {
        if self.current_trip(trip.id).await.is_some() {
            return Err(conflict_error(format!("trip {} already exists", trip.id)));
        }
        self.trips.insert(trip.id, Some(trip.clone()));
        self.ops.push(PendingOp::InsertTrip(trip.clone()));
        Ok(())
    }

    async fn get_trip(&mut self, id: Uuid) -> AppResult<Option<Trip>> {
        Ok(self.current_trip(id).await)
    }

    async fn update_trip_status(
        &mut self,
        id: Uuid,
        expected: TripStatus,
        change: &TripStatusChange,
    ) -> AppResult<bool> {
        let Some(mut trip) = self.current_trip(id).await else {
            return Ok(false);
        };
        if trip.status != expected {
            return Ok(false);
        }
        change.apply(&mut trip);
        self.trips.insert(id, Some(trip));
        self.ops.push(PendingOp::TripStatus {
            id,
            expected,
            change: change.clone(),
        });
        Ok(true)
    }

    async fn update_trip_details(&mut self, trip: &Trip, expected: TripStatus) -> AppResult<bool> {
        match self.current_trip(trip.id).await {
            Some(current) if current.status == expected => {}
            _ => return Ok(false),
        }
        self.trips.insert(trip.id, Some(trip.clone()));
        self.ops.push(PendingOp::TripDetails {
            trip: trip.clone(),
            expected,
        });
        Ok(true)
    }

    async fn delete_trip(&mut self, id: Uuid, expected: TripStatus) -> AppResult<bool> {
        match self.current_trip(id).await {
            Some(current) if current.status == expected => {}
            _ => return Ok(false),
        }
        self.trips.insert(id, None);
        self.ops.push(PendingOp::DeleteTrip { id, expected });
        Ok(true)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryFleetTransaction { state: shared, ops, .. } = *self;
        let mut state = shared.write().await;
        validate(&ops, &state)?;

        let op_count = ops.len();
        for op in ops {
            match op {
                PendingOp::ResourceCas { resource, new, .. } => {
                    state.set_resource_status(resource, new);
                }
                PendingOp::InsertTrip(trip) => {
                    state.trips.insert(trip.id, trip);
                }
                PendingOp::TripStatus { id, change, .. } => {
                    if let Some(trip) = state.trips.get_mut(&id) {
                        change.apply(trip);
                    }
                }
                PendingOp::TripDetails { trip, .. } => {
                    state.trips.insert(trip.id, trip);
                }
                PendingOp::DeleteTrip { id, .. } => {
                    state.trips.remove(&id);
                }
            }
        }
        debug!("💾 Unidad de trabajo confirmada ({} cambios)", op_count);
        Ok(())
    }
}
