//! Núcleo de ciclo de vida de viajes y asignación de recursos de la flota.
//!
//! Asigna un camión y un conductor a cada viaje, impide que ninguno de los
//! dos quede reservado dos veces y conduce los viajes por sus estados,
//! manteniendo la disponibilidad de los recursos coherente con los viajes
//! abiertos incluso con peticiones concurrentes.

pub mod config;
pub mod database;
pub mod dto;
pub mod models;
pub mod repositories;
pub mod services;
pub mod state;
pub mod utils;
