//! Recursos asignables (camiones y conductores)
//!
//! Los estados concretos de cada tabla se colapsan en una disponibilidad
//! común: disponible, comprometido o fuera de servicio.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::driver::DriverStatus;
use super::truck::TruckStatus;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Truck,
    Driver,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Truck => f.write_str("Truck"),
            ResourceKind::Driver => f.write_str("Driver"),
        }
    }
}

/// Disponibilidad colapsada de un recurso
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    Engaged,
    OutOfService,
}

/// Referencia a un recurso por tipo e id
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub id: Uuid,
}

impl ResourceRef {
    pub fn truck(id: Uuid) -> Self {
        Self { kind: ResourceKind::Truck, id }
    }

    pub fn driver(id: Uuid) -> Self {
        Self { kind: ResourceKind::Driver, id }
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// Estado persistido de un recurso, tal como lo guarda su tabla
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "status", rename_all = "lowercase")]
pub enum ResourceStatus {
    Truck(TruckStatus),
    Driver(DriverStatus),
}

impl ResourceStatus {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceStatus::Truck(_) => ResourceKind::Truck,
            ResourceStatus::Driver(_) => ResourceKind::Driver,
        }
    }

    pub fn availability(&self) -> Availability {
        match self {
            ResourceStatus::Truck(status) => status.availability(),
            ResourceStatus::Driver(status) => status.availability(),
        }
    }

    /// Estado que representa "comprometido" para este tipo de recurso
    pub fn engaged(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Truck => ResourceStatus::Truck(TruckStatus::InUse),
            ResourceKind::Driver => ResourceStatus::Driver(DriverStatus::Busy),
        }
    }

    /// Estado al que vuelve un recurso liberado
    pub fn released(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Truck => ResourceStatus::Truck(TruckStatus::Available),
            ResourceKind::Driver => ResourceStatus::Driver(DriverStatus::Active),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::Truck(status) => status.as_str(),
            ResourceStatus::Driver(status) => status.as_str(),
        }
    }
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
