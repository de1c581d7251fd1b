//! Modelo de Trip
//!
//! El viaje es el agregado central: referencia por id a exactamente un
//! camión, un conductor y un cliente. Su estado solo cambia a través de la
//! máquina de estados de viajes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Estado del viaje - mapea al ENUM trip_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "trip_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub const ALL: [TripStatus; 4] = [
        TripStatus::Planned,
        TripStatus::InProgress,
        TripStatus::Completed,
        TripStatus::Cancelled,
    ];

    /// COMPLETED y CANCELLED congelan el viaje
    pub fn is_terminal(&self) -> bool {
        matches!(self, TripStatus::Completed | TripStatus::Cancelled)
    }

    /// Un viaje abierto mantiene comprometidos su camión y su conductor
    pub fn is_open(&self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Planned => "PLANNED",
            TripStatus::InProgress => "IN_PROGRESS",
            TripStatus::Completed => "COMPLETED",
            TripStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for TripStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trip principal - mapea exactamente a la tabla trips
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Trip {
    pub id: Uuid,
    pub truck_id: Uuid,
    pub driver_id: Uuid,
    pub client_id: Uuid,
    pub origin: String,
    pub destination: String,
    pub distance: Decimal,
    pub estimated_cost: Option<Decimal>,
    pub actual_cost: Option<Decimal>,
    pub revenue: Decimal,
    pub fuel_cost: Decimal,
    pub maintenance_cost: Decimal,
    pub other_expenses: Decimal,
    pub status: TripStatus,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Cambio de estado con sus marcas de tiempo, tal como se persiste
#[derive(Debug, Clone, PartialEq)]
pub struct TripStatusChange {
    pub status: TripStatus,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl TripStatusChange {
    pub fn apply(&self, trip: &mut Trip) {
        trip.status = self.status;
        trip.start_date = self.start_date;
        trip.end_date = self.end_date;
        trip.updated_at = self.updated_at;
    }
}

/// Filtros para búsqueda de viajes
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TripFilter {
    pub status: Option<TripStatus>,
    pub driver_id: Option<Uuid>,
    pub truck_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
}

impl TripFilter {
    pub fn by_driver(driver_id: Uuid) -> Self {
        Self { driver_id: Some(driver_id), ..Default::default() }
    }

    pub fn by_truck(truck_id: Uuid) -> Self {
        Self { truck_id: Some(truck_id), ..Default::default() }
    }

    pub fn by_client(client_id: Uuid) -> Self {
        Self { client_id: Some(client_id), ..Default::default() }
    }

    pub fn by_status(status: TripStatus) -> Self {
        Self { status: Some(status), ..Default::default() }
    }

    pub fn matches(&self, trip: &Trip) -> bool {
        self.status.map_or(true, |s| trip.status == s)
            && self.driver_id.map_or(true, |id| trip.driver_id == id)
            && self.truck_id.map_or(true, |id| trip.truck_id == id)
            && self.client_id.map_or(true, |id| trip.client_id == id)
    }
}
