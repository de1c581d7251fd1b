//! Coordinador de asignación
//!
//! Une cada creación, transición o eliminación de viaje con los cambios de
//! estado de sus recursos en una sola unidad de trabajo. Si algo falla antes
//! del commit la unidad se descarta entera, así que ningún recurso queda
//! comprometido sin un viaje abierto que lo respalde. Esto incluye el caso en
//! que el futuro se cancela a mitad de camino: soltar la transacción la
//! revierte.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::dto::trip_dto::{CreateTripRequest, UpdateTripDetailsRequest};
use crate::models::{Availability, ResourceKind, ResourceRef, Trip, TripFilter, TripStatus};
use crate::repositories::{FleetStore, FleetTransaction};
use crate::services::resource_registry::ResourceRegistry;
use crate::services::trip_state_machine::{ensure_mutable, plan_deletion, plan_transition};
use crate::utils::errors::{conflict_error, not_found_error, AppError, AppResult, EntityKind};

pub struct AllocationCoordinator {
    store: Arc<dyn FleetStore>,
    registry: Arc<ResourceRegistry>,
    max_attempts: u32,
}

impl AllocationCoordinator {
    pub fn new(store: Arc<dyn FleetStore>, registry: Arc<ResourceRegistry>, max_attempts: u32) -> Self {
        Self {
            store,
            registry,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Ejecuta `attempt` de nuevo desde cero mientras falle por `Conflict`,
    /// como máximo `max_attempts` veces.
    async fn retry_on_conflict<T, F, Fut>(&self, operation: &str, mut attempt: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut tries = 1;
        loop {
            match attempt().await {
                Err(e) if e.is_conflict() && tries < self.max_attempts => {
                    warn!("🔁 {}: conflicto ({}), reintento {}/{}", operation, e, tries, self.max_attempts - 1);
                    tries += 1;
                }
                other => return other,
            }
        }
    }

    /// Crea un viaje PLANNED reservando su camión y su conductor
    pub async fn create_trip(&self, request: CreateTripRequest) -> AppResult<Trip> {
        request.validate()?;

        let result = self
            .retry_on_conflict("create_trip", || self.try_create_trip(&request))
            .await;

        match result {
            Ok(trip) => {
                info!(
                    "🚚 Viaje {} creado: camión {} conductor {} ({} → {})",
                    trip.id, trip.truck_id, trip.driver_id, trip.origin, trip.destination
                );
                Ok(trip)
            }
            Err(e) if e.is_conflict() => {
                warn!("⚠️ create_trip: reintentos agotados para camión {}", request.truck_id);
                Err(self.contention_exhausted(&request).await)
            }
            Err(e) => Err(e),
        }
    }

    async fn try_create_trip(&self, request: &CreateTripRequest) -> AppResult<Trip> {
        let mut tx = self.store.begin().await?;

        if !tx.client_exists(request.client_id).await? {
            return Err(not_found_error(EntityKind::Client, request.client_id));
        }

        self.registry
            .reserve_in(tx.as_mut(), ResourceRef::truck(request.truck_id))
            .await?;
        self.registry
            .reserve_in(tx.as_mut(), ResourceRef::driver(request.driver_id))
            .await?;

        let trip = request.to_planned_trip(Utc::now());
        tx.insert_trip(&trip).await?;
        tx.commit().await?;

        Ok(trip)
    }

    /// Traduce un conflicto persistente en `ResourceUnavailable` indicando,
    /// si se puede, el recurso que se llevó la carrera.
    async fn contention_exhausted(&self, request: &CreateTripRequest) -> AppError {
        for resource in [
            ResourceRef::truck(request.truck_id),
            ResourceRef::driver(request.driver_id),
        ] {
            match self.registry.status(resource).await {
                Ok(status) if status.availability() != Availability::Available => {
                    return AppError::ResourceUnavailable {
                        kind: resource.kind,
                        id: resource.id,
                        status: status.to_string(),
                    };
                }
                Ok(_) => {}
                Err(e) => warn!("⚠️ No se pudo leer el estado de {} tras la contención: {}", resource, e),
            }
        }

        AppError::ResourceUnavailable {
            kind: ResourceKind::Truck,
            id: request.truck_id,
            status: "CONTENDED".to_string(),
        }
    }

    /// Aplica una transición de estado y sus efectos sobre los recursos
    pub async fn transition(&self, trip_id: Uuid, target: TripStatus) -> AppResult<Trip> {
        let trip = self
            .retry_on_conflict("transition", || self.try_transition(trip_id, target))
            .await?;

        info!("🔄 Viaje {} → {}", trip.id, trip.status);
        Ok(trip)
    }

    async fn try_transition(&self, trip_id: Uuid, target: TripStatus) -> AppResult<Trip> {
        let mut tx = self.store.begin().await?;

        let mut trip = tx
            .get_trip(trip_id)
            .await?
            .ok_or_else(|| not_found_error(EntityKind::Trip, trip_id))?;

        let plan = plan_transition(&trip, target, Utc::now())?;

        if !tx.update_trip_status(trip_id, plan.from, &plan.change).await? {
            return Err(conflict_error(format!("trip {} changed during transition", trip_id)));
        }
        if plan.releases_resources {
            self.release_trip_resources(tx.as_mut(), &trip).await?;
        }
        tx.commit().await?;

        plan.change.apply(&mut trip);
        Ok(trip)
    }

    pub async fn start_trip(&self, trip_id: Uuid) -> AppResult<Trip> {
        self.transition(trip_id, TripStatus::InProgress).await
    }

    pub async fn complete_trip(&self, trip_id: Uuid) -> AppResult<Trip> {
        self.transition(trip_id, TripStatus::Completed).await
    }

    pub async fn cancel_trip(&self, trip_id: Uuid) -> AppResult<Trip> {
        self.transition(trip_id, TripStatus::Cancelled).await
    }

    /// Elimina un viaje; si estaba planificado libera sus recursos
    pub async fn delete_trip(&self, trip_id: Uuid) -> AppResult<()> {
        self.retry_on_conflict("delete_trip", || self.try_delete_trip(trip_id))
            .await?;

        info!("🗑️ Viaje {} eliminado", trip_id);
        Ok(())
    }

    async fn try_delete_trip(&self, trip_id: Uuid) -> AppResult<()> {
        let mut tx = self.store.begin().await?;

        let trip = tx
            .get_trip(trip_id)
            .await?
            .ok_or_else(|| not_found_error(EntityKind::Trip, trip_id))?;

        let plan = plan_deletion(&trip)?;

        if !tx.delete_trip(trip_id, plan.expected).await? {
            return Err(conflict_error(format!("trip {} changed during deletion", trip_id)));
        }
        if plan.releases_resources {
            self.release_trip_resources(tx.as_mut(), &trip).await?;
        }
        tx.commit().await
    }

    /// Modifica los datos de un viaje que aún no es terminal
    pub async fn update_trip_details(&self, trip_id: Uuid, update: UpdateTripDetailsRequest) -> AppResult<Trip> {
        update.validate()?;

        self.retry_on_conflict("update_trip_details", || self.try_update_details(trip_id, &update))
            .await
    }

    async fn try_update_details(&self, trip_id: Uuid, update: &UpdateTripDetailsRequest) -> AppResult<Trip> {
        let mut tx = self.store.begin().await?;

        let mut trip = tx
            .get_trip(trip_id)
            .await?
            .ok_or_else(|| not_found_error(EntityKind::Trip, trip_id))?;

        ensure_mutable(&trip)?;

        update.apply(&mut trip);
        trip.updated_at = Utc::now();

        if !tx.update_trip_details(&trip, trip.status).await? {
            return Err(conflict_error(format!("trip {} changed during update", trip_id)));
        }
        tx.commit().await?;

        Ok(trip)
    }

    /// Libera camión y conductor. Si alguno no está comprometido el viaje
    /// abierto no tenía respaldo: es un fallo de consistencia que se registra
    /// y se devuelve sin corregir nada.
    async fn release_trip_resources(&self, tx: &mut dyn FleetTransaction, trip: &Trip) -> AppResult<()> {
        for resource in [ResourceRef::truck(trip.truck_id), ResourceRef::driver(trip.driver_id)] {
            match self.registry.release_in(&mut *tx, resource).await {
                Ok(()) => {}
                Err(AppError::InvalidState { status, .. }) => {
                    let fault = format!(
                        "open trip {} ({}) references {} which is {} instead of engaged",
                        trip.id, trip.status, resource, status
                    );
                    error!("🚨 Fallo de consistencia: {}", fault);
                    return Err(AppError::ConsistencyFault(fault));
                }
                Err(AppError::NotFound { .. }) => {
                    let fault = format!("open trip {} references missing {}", trip.id, resource);
                    error!("🚨 Fallo de consistencia: {}", fault);
                    return Err(AppError::ConsistencyFault(fault));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    async fn ensure_no_open_trips(&self, entity: EntityKind, id: Uuid, filter: TripFilter) -> AppResult<()> {
        let open_trips = self.store.count_open_trips(&filter).await?;
        if open_trips > 0 {
            return Err(AppError::ResourceInUse {
                entity,
                id,
                open_trips,
            });
        }
        Ok(())
    }

    /// Un camión con viajes abiertos no se puede dar de baja
    pub async fn ensure_truck_deletable(&self, truck_id: Uuid) -> AppResult<()> {
        self.ensure_no_open_trips(EntityKind::Truck, truck_id, TripFilter::by_truck(truck_id))
            .await
    }

    pub async fn ensure_driver_deletable(&self, driver_id: Uuid) -> AppResult<()> {
        self.ensure_no_open_trips(EntityKind::Driver, driver_id, TripFilter::by_driver(driver_id))
            .await
    }

    pub async fn ensure_client_deletable(&self, client_id: Uuid) -> AppResult<()> {
        self.ensure_no_open_trips(EntityKind::Client, client_id, TripFilter::by_client(client_id))
            .await
    }
}
