//! DTOs
//!
//! Requests validados que entran al coordinador de asignación.

pub mod trip_dto;

pub use trip_dto::{CreateTripRequest, UpdateTripDetailsRequest};
