//! Repositorios
//!
//! Interfaz de persistencia transaccional del núcleo de asignación. Todo
//! cambio de estado pasa por una unidad de trabajo (`FleetTransaction`)
//! que se confirma entera o no se aplica: soltar la transacción sin
//! `commit` descarta todos sus cambios.

pub mod memory_store;
pub mod postgres_store;

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{
    Driver, DriverStatus, ResourceRef, ResourceStatus, Trip, TripFilter, TripStatus,
    TripStatusChange, Truck, TruckStatus,
};
use crate::utils::errors::AppResult;

pub use memory_store::MemoryFleetStore;
pub use postgres_store::PgFleetStore;

/// Lecturas confirmadas y apertura de unidades de trabajo
#[async_trait]
pub trait FleetStore: Send + Sync {
    /// Abre una unidad de trabajo nueva
    async fn begin(&self) -> AppResult<Box<dyn FleetTransaction>>;

    async fn get_trip(&self, id: Uuid) -> AppResult<Option<Trip>>;

    /// Viajes que cumplen el filtro, más recientes primero
    async fn list_trips(&self, filter: &TripFilter) -> AppResult<Vec<Trip>>;

    async fn get_truck(&self, id: Uuid) -> AppResult<Option<Truck>>;

    async fn get_driver(&self, id: Uuid) -> AppResult<Option<Driver>>;

    async fn list_trucks(&self, status: Option<TruckStatus>) -> AppResult<Vec<Truck>>;

    async fn list_drivers(&self, status: Option<DriverStatus>) -> AppResult<Vec<Driver>>;

    /// Número de viajes PLANNED o IN_PROGRESS que cumplen el filtro
    async fn count_open_trips(&self, filter: &TripFilter) -> AppResult<i64>;

    /// Actualiza el odómetro si el nuevo valor no es menor que el actual.
    /// Devuelve `None` si el camión no existe.
    async fn update_mileage(&self, truck_id: Uuid, mileage: Decimal) -> AppResult<Option<MileageUpdate>>;
}

/// Resultado de una actualización de odómetro
#[derive(Debug, Clone, PartialEq)]
pub enum MileageUpdate {
    Applied(Truck),
    /// El valor pedido es menor que el registrado
    Rejected { current: Decimal },
}

/// Unidad de trabajo atómica
#[async_trait]
pub trait FleetTransaction: Send {
    async fn resource_status(&mut self, resource: ResourceRef) -> AppResult<Option<ResourceStatus>>;

    /// Compare-and-swap sobre el estado del recurso. Devuelve `false` si el
    /// estado almacenado ya no es `expected`.
    async fn cas_resource_status(
        &mut self,
        resource: ResourceRef,
        expected: ResourceStatus,
        new: ResourceStatus,
    ) -> AppResult<bool>;

    async fn client_exists(&mut self, client_id: Uuid) -> AppResult<bool>;

    async fn insert_trip(&mut self, trip: &Trip) -> AppResult<()>;

    async fn get_trip(&mut self, id: Uuid) -> AppResult<Option<Trip>>;

    /// Cambia el estado del viaje solo si sigue en `expected`
    async fn update_trip_status(
        &mut self,
        id: Uuid,
        expected: TripStatus,
        change: &TripStatusChange,
    ) -> AppResult<bool>;

    /// Reescribe los campos de detalle del viaje solo si sigue en `expected`
    async fn update_trip_details(&mut self, trip: &Trip, expected: TripStatus) -> AppResult<bool>;

    /// Elimina el viaje solo si sigue en `expected`
    async fn delete_trip(&mut self, id: Uuid, expected: TripStatus) -> AppResult<bool>;

    /// Confirma todos los cambios. Un `Conflict` indica que otra unidad
    /// confirmó antes un cambio incompatible.
    async fn commit(self: Box<Self>) -> AppResult<()>;
}
