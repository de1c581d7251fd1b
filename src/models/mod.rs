//! Modelos de datos
//!
//! Este módulo contiene los modelos de la flota: camiones, conductores,
//! clientes y los viajes que los vinculan.

pub mod client;
pub mod driver;
pub mod resource;
pub mod trip;
pub mod truck;

pub use client::Client;
pub use driver::{Driver, DriverStatus};
pub use resource::{Availability, ResourceKind, ResourceRef, ResourceStatus};
pub use trip::{Trip, TripFilter, TripStatus, TripStatusChange};
pub use truck::{Truck, TruckStatus};
