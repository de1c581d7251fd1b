//! Modelo de Truck
//!
//! Mapea la tabla `trucks`. El estado solo lo modifica el coordinador de
//! asignación; el kilometraje solo lo modifica la actualización de odómetro.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

use super::resource::Availability;

/// Estado del camión - mapea al ENUM truck_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "truck_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TruckStatus {
    Available,
    InUse,
    Maintenance,
    Inactive,
    /// Valor heredado: se lee como disponible, nunca se escribe
    Active,
}

impl TruckStatus {
    pub fn availability(&self) -> Availability {
        match self {
            TruckStatus::Available | TruckStatus::Active => Availability::Available,
            TruckStatus::InUse => Availability::Engaged,
            TruckStatus::Maintenance | TruckStatus::Inactive => Availability::OutOfService,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TruckStatus::Available => "AVAILABLE",
            TruckStatus::InUse => "IN_USE",
            TruckStatus::Maintenance => "MAINTENANCE",
            TruckStatus::Inactive => "INACTIVE",
            TruckStatus::Active => "ACTIVE",
        }
    }
}

impl std::fmt::Display for TruckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Truck principal - mapea exactamente a la tabla trucks
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Truck {
    pub id: Uuid,
    pub license_plate: String,
    pub model: String,
    pub year: i32,
    pub status: TruckStatus,
    pub total_mileage: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Truck {
    /// Camión nuevo en estado AVAILABLE y sin kilometraje
    pub fn new(license_plate: impl Into<String>, model: impl Into<String>, year: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            license_plate: license_plate.into(),
            model: model.into(),
            year,
            status: TruckStatus::Available,
            total_mileage: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: TruckStatus) -> Self {
        self.status = status;
        self
    }
}
