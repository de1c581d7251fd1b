use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::trip::{Trip, TripStatus};
use crate::utils::validation::{validate_non_negative, validate_not_blank};

// Request para crear un viaje: el camión y el conductor se asignan al crearlo
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[validate(schema(function = "validate_optional_costs", skip_on_field_errors = false))]
pub struct CreateTripRequest {
    pub truck_id: Uuid,
    pub driver_id: Uuid,
    pub client_id: Uuid,

    #[validate(length(min = 1, max = 255), custom = "validate_not_blank")]
    pub origin: String,

    #[validate(length(min = 1, max = 255), custom = "validate_not_blank")]
    pub destination: String,

    #[validate(custom = "validate_non_negative")]
    pub distance: Decimal,

    pub estimated_cost: Option<Decimal>,
    pub actual_cost: Option<Decimal>,

    #[validate(custom = "validate_non_negative")]
    pub revenue: Decimal,

    #[serde(default)]
    #[validate(custom = "validate_non_negative")]
    pub fuel_cost: Decimal,

    #[serde(default)]
    #[validate(custom = "validate_non_negative")]
    pub maintenance_cost: Decimal,

    #[serde(default)]
    #[validate(custom = "validate_non_negative")]
    pub other_expenses: Decimal,

    /// Fecha de inicio planificada; si falta se fija al arrancar el viaje
    pub start_date: Option<DateTime<Utc>>,
}

fn validate_optional_costs(request: &CreateTripRequest) -> Result<(), ValidationError> {
    for cost in [request.estimated_cost, request.actual_cost].into_iter().flatten() {
        validate_non_negative(&cost)?;
    }
    Ok(())
}

impl CreateTripRequest {
    pub fn new(
        truck_id: Uuid,
        driver_id: Uuid,
        client_id: Uuid,
        origin: impl Into<String>,
        destination: impl Into<String>,
        distance: Decimal,
    ) -> Self {
        Self {
            truck_id,
            driver_id,
            client_id,
            origin: origin.into(),
            destination: destination.into(),
            distance,
            estimated_cost: None,
            actual_cost: None,
            revenue: Decimal::ZERO,
            fuel_cost: Decimal::ZERO,
            maintenance_cost: Decimal::ZERO,
            other_expenses: Decimal::ZERO,
            start_date: None,
        }
    }

    /// Construye el registro del viaje en estado PLANNED
    pub fn to_planned_trip(&self, now: DateTime<Utc>) -> Trip {
        Trip {
            id: Uuid::new_v4(),
            truck_id: self.truck_id,
            driver_id: self.driver_id,
            client_id: self.client_id,
            origin: self.origin.trim().to_string(),
            destination: self.destination.trim().to_string(),
            distance: self.distance,
            estimated_cost: self.estimated_cost,
            actual_cost: self.actual_cost,
            revenue: self.revenue,
            fuel_cost: self.fuel_cost,
            maintenance_cost: self.maintenance_cost,
            other_expenses: self.other_expenses,
            status: TripStatus::Planned,
            start_date: self.start_date,
            end_date: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// Request para actualizar los datos de un viaje (no su estado)
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[validate(schema(function = "validate_detail_amounts", skip_on_field_errors = false))]
pub struct UpdateTripDetailsRequest {
    #[validate(length(min = 1, max = 255), custom = "validate_not_blank")]
    pub origin: Option<String>,

    #[validate(length(min = 1, max = 255), custom = "validate_not_blank")]
    pub destination: Option<String>,

    pub distance: Option<Decimal>,
    pub estimated_cost: Option<Decimal>,
    pub actual_cost: Option<Decimal>,
    pub revenue: Option<Decimal>,
    pub fuel_cost: Option<Decimal>,
    pub maintenance_cost: Option<Decimal>,
    pub other_expenses: Option<Decimal>,
}

fn validate_detail_amounts(request: &UpdateTripDetailsRequest) -> Result<(), ValidationError> {
    let amounts = [
        request.distance,
        request.estimated_cost,
        request.actual_cost,
        request.revenue,
        request.fuel_cost,
        request.maintenance_cost,
        request.other_expenses,
    ];
    for amount in amounts.into_iter().flatten() {
        validate_non_negative(&amount)?;
    }
    Ok(())
}

impl UpdateTripDetailsRequest {
    pub fn apply(&self, trip: &mut Trip) {
        if let Some(origin) = &self.origin {
            trip.origin = origin.trim().to_string();
        }
        if let Some(destination) = &self.destination {
            trip.destination = destination.trim().to_string();
        }
        if let Some(distance) = self.distance {
            trip.distance = distance;
        }
        if self.estimated_cost.is_some() {
            trip.estimated_cost = self.estimated_cost;
        }
        if self.actual_cost.is_some() {
            trip.actual_cost = self.actual_cost;
        }
        if let Some(revenue) = self.revenue {
            trip.revenue = revenue;
        }
        if let Some(fuel_cost) = self.fuel_cost {
            trip.fuel_cost = fuel_cost;
        }
        if let Some(maintenance_cost) = self.maintenance_cost {
            trip.maintenance_cost = maintenance_cost;
        }
        if let Some(other_expenses) = self.other_expenses {
            trip.other_expenses = other_expenses;
        }
    }
}
