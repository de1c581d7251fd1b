//! Registro de recursos
//!
//! Lleva la disponibilidad de cada camión y conductor. `reserve` y `release`
//! son compare-and-swap sobre el estado almacenado: dos reservas concurrentes
//! del mismo recurso nunca pueden confirmarse ambas.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{Availability, ResourceRef, ResourceStatus, Truck};
use crate::repositories::{FleetStore, FleetTransaction, MileageUpdate};
use crate::utils::errors::{conflict_error, not_found_error, validation_error, AppError, AppResult, EntityKind};

pub struct ResourceRegistry {
    store: Arc<dyn FleetStore>,
}

impl ResourceRegistry {
    pub fn new(store: Arc<dyn FleetStore>) -> Self {
        Self { store }
    }

    /// Reserva el recurso dentro de la unidad de trabajo del llamador.
    /// Devuelve el estado previo para poder registrarlo.
    pub async fn reserve_in(
        &self,
        tx: &mut dyn FleetTransaction,
        resource: ResourceRef,
    ) -> AppResult<ResourceStatus> {
        let current = tx
            .resource_status(resource)
            .await?
            .ok_or_else(|| not_found_error(resource.kind.into(), resource.id))?;

        if current.availability() != Availability::Available {
            debug!("⛔ {} no disponible ({})", resource, current);
            return Err(AppError::ResourceUnavailable {
                kind: resource.kind,
                id: resource.id,
                status: current.to_string(),
            });
        }

        let engaged = ResourceStatus::engaged(resource.kind);
        if !tx.cas_resource_status(resource, current, engaged).await? {
            warn!("⚠️ Carrera al reservar {}", resource);
            return Err(conflict_error(format!("{} changed while reserving", resource)));
        }

        Ok(current)
    }

    /// Libera el recurso dentro de la unidad de trabajo del llamador
    pub async fn release_in(&self, tx: &mut dyn FleetTransaction, resource: ResourceRef) -> AppResult<()> {
        let current = tx
            .resource_status(resource)
            .await?
            .ok_or_else(|| not_found_error(resource.kind.into(), resource.id))?;

        if current.availability() != Availability::Engaged {
            return Err(AppError::InvalidState {
                kind: resource.kind,
                id: resource.id,
                status: current.to_string(),
            });
        }

        let released = ResourceStatus::released(resource.kind);
        if !tx.cas_resource_status(resource, current, released).await? {
            warn!("⚠️ Carrera al liberar {}", resource);
            return Err(conflict_error(format!("{} changed while releasing", resource)));
        }

        Ok(())
    }

    /// Reserva el recurso en su propia unidad de trabajo
    pub async fn reserve(&self, resource: ResourceRef) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        let previous = self.reserve_in(tx.as_mut(), resource).await?;
        tx.commit().await?;

        info!("🔒 {} reservado (antes {})", resource, previous);
        Ok(())
    }

    /// Libera el recurso en su propia unidad de trabajo
    pub async fn release(&self, resource: ResourceRef) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        self.release_in(tx.as_mut(), resource).await?;
        tx.commit().await?;

        info!("🔓 {} liberado", resource);
        Ok(())
    }

    /// Estado confirmado del recurso
    pub async fn status(&self, resource: ResourceRef) -> AppResult<ResourceStatus> {
        let mut tx = self.store.begin().await?;
        // Solo lectura: la transacción se descarta sin commit
        tx.resource_status(resource)
            .await?
            .ok_or_else(|| not_found_error(resource.kind.into(), resource.id))
    }

    pub async fn availability(&self, resource: ResourceRef) -> AppResult<Availability> {
        Ok(self.status(resource).await?.availability())
    }

    /// Actualización de odómetro; el kilometraje nunca retrocede
    pub async fn record_mileage(&self, truck_id: Uuid, mileage: Decimal) -> AppResult<Truck> {
        if mileage.is_sign_negative() && !mileage.is_zero() {
            return Err(validation_error("total_mileage", "non_negative"));
        }

        match self.store.update_mileage(truck_id, mileage).await? {
            Some(MileageUpdate::Applied(truck)) => {
                info!("🛣️ Camión {} odómetro = {}", truck_id, truck.total_mileage);
                Ok(truck)
            }
            Some(MileageUpdate::Rejected { current }) => {
                warn!(
                    "⚠️ Odómetro rechazado para {}: {} < {}",
                    truck_id, mileage, current
                );
                Err(validation_error("total_mileage", "mileage_decreased"))
            }
            None => Err(not_found_error(EntityKind::Truck, truck_id)),
        }
    }
}
