//! Utilidades
//!
//! Manejo de errores y validación.

pub mod errors;
pub mod validation;

pub use errors::{AppError, AppResult};
