//! Sistema de manejo de errores
//!
//! Este módulo define todos los tipos de errores del núcleo de asignación
//! y su conversión a respuestas HTTP apropiadas para la capa externa.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::resource::ResourceKind;
use crate::models::trip::TripStatus;

/// Tipo de entidad referenciada en un error de búsqueda
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Truck,
    Driver,
    Client,
    Trip,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Truck => "Truck",
            EntityKind::Driver => "Driver",
            EntityKind::Client => "Client",
            EntityKind::Trip => "Trip",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ResourceKind> for EntityKind {
    fn from(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Truck => EntityKind::Truck,
            ResourceKind::Driver => EntityKind::Driver,
        }
    }
}

/// Errores principales de la aplicación
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{entity} with id '{id}' not found")]
    NotFound { entity: EntityKind, id: Uuid },

    #[error("{kind} {id} is not available (status {status})")]
    ResourceUnavailable {
        kind: ResourceKind,
        id: Uuid,
        status: String,
    },

    #[error("{kind} {id} is not engaged (status {status})")]
    InvalidState {
        kind: ResourceKind,
        id: Uuid,
        status: String,
    },

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: TripStatus, to: TripStatus },

    #[error("Trip {0} is {1} and can no longer be modified")]
    TripFinalized(Uuid, TripStatus),

    #[error("Cannot delete trip {0}: it is in progress")]
    TripActive(Uuid),

    #[error("{entity} {id} is referenced by {open_trips} open trip(s)")]
    ResourceInUse {
        entity: EntityKind,
        id: Uuid,
        open_trips: i64,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Consistency fault: {0}")]
    ConsistencyFault(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AppError {
    /// Código estable expuesto a los clientes de la API
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound { .. } => "NOT_FOUND",
            AppError::ResourceUnavailable { .. } => "RESOURCE_UNAVAILABLE",
            AppError::InvalidState { .. } => "INVALID_STATE",
            AppError::InvalidTransition { .. } => "INVALID_TRANSITION",
            AppError::TripFinalized(..) => "TRIP_FINALIZED",
            AppError::TripActive(_) => "TRIP_ACTIVE",
            AppError::ResourceInUse { .. } => "RESOURCE_IN_USE",
            AppError::Conflict(_) => "CONFLICT",
            AppError::ConsistencyFault(_) => "CONSISTENCY_FAULT",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Database(_) => "DB_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::ResourceUnavailable { .. }
            | AppError::InvalidState { .. }
            | AppError::TripFinalized(..)
            | AppError::TripActive(_)
            | AppError::ResourceInUse { .. }
            | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InvalidTransition { .. } | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::ConsistencyFault(_)
            | AppError::Database(_)
            | AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Indica si el error proviene de una carrera y la operación puede reintentarse
    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }
}

/// Respuesta de error para la API
#[derive(Debug, serde::Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code().to_string();

        let (message, details) = match &self {
            AppError::Database(e) => {
                tracing::error!("❌ Database error: {}", e);
                (
                    "An error occurred while accessing the database".to_string(),
                    Some(json!({ "sql_error": e.to_string() })),
                )
            }
            AppError::Validation(e) => {
                tracing::warn!("⚠️ Validation error: {}", e);
                ("The provided data is invalid".to_string(), Some(json!(e)))
            }
            AppError::InvalidTransition { from, to } => (
                self.to_string(),
                Some(json!({ "from": from, "to": to })),
            ),
            AppError::ConsistencyFault(msg) => {
                tracing::error!("🚨 Consistency fault: {}", msg);
                (
                    "Fleet state is inconsistent and requires manual reconciliation".to_string(),
                    Some(json!({ "fault": msg })),
                )
            }
            AppError::Configuration(msg) => {
                tracing::error!("❌ Configuration error: {}", msg);
                ("An unexpected error occurred".to_string(), None)
            }
            other => {
                tracing::debug!("↩️ {}: {}", other.code(), other);
                (other.to_string(), None)
            }
        };

        let body = ErrorResponse {
            error: status
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
            message,
            details,
            code,
        };

        (status, Json(body)).into_response()
    }
}

/// Resultado tipado para operaciones que pueden fallar
pub type AppResult<T> = Result<T, AppError>;

/// Función helper para crear errores de recurso no encontrado
pub fn not_found_error(entity: EntityKind, id: Uuid) -> AppError {
    AppError::NotFound { entity, id }
}

/// Función helper para crear errores de conflicto de concurrencia
pub fn conflict_error(message: impl Into<String>) -> AppError {
    AppError::Conflict(message.into())
}

/// Función helper para crear errores de validación sobre un campo
pub fn validation_error(field: &'static str, code: &'static str) -> AppError {
    let mut errors = validator::ValidationErrors::new();
    errors.add(field, validator::ValidationError::new(code));
    AppError::Validation(errors)
}

/// Índices parciales que impiden dos viajes abiertos sobre el mismo recurso
pub const OPEN_TRIP_TRUCK_INDEX: &str = "uq_trips_open_truck";
pub const OPEN_TRIP_DRIVER_INDEX: &str = "uq_trips_open_driver";

/// Clasifica un error de sqlx: las carreras detectadas por PostgreSQL se
/// convierten en `Conflict` para que el coordinador pueda reintentar. Una
/// violación de los índices de viajes abiertos no es una carrera: con las
/// filas del camión y del conductor bloqueadas solo ocurre si un recurso
/// figura libre mientras un viaje abierto lo referencia.
pub fn classify_db_error(error: sqlx::Error) -> AppError {
    let Some(db) = error.as_database_error() else {
        return AppError::Database(error);
    };
    let code = db.code().map(|code| code.into_owned()).unwrap_or_default();
    let constraint = db.constraint().map(str::to_string);

    classify_sqlstate(&code, constraint.as_deref(), error)
}

fn classify_sqlstate(code: &str, constraint: Option<&str>, error: sqlx::Error) -> AppError {
    match (code, constraint) {
        // serialization_failure, deadlock_detected, lock_not_available
        ("40001" | "40P01" | "55P03", _) => AppError::Conflict(error.to_string()),
        ("23505", Some(index)) if index == OPEN_TRIP_TRUCK_INDEX || index == OPEN_TRIP_DRIVER_INDEX => {
            let fault = format!("open trip index {} violated: {}", index, error);
            tracing::error!("🚨 Fallo de consistencia: {}", fault);
            AppError::ConsistencyFault(fault)
        }
        _ => AppError::Database(error),
    }
}
