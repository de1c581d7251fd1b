//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno y los parámetros del
//! coordinador de asignación.

use std::env;
use std::str::FromStr;

use crate::utils::errors::{AppError, AppResult};

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub log_level: String,
    /// Intentos completos de una asignación ante conflictos (1 = sin reintento)
    pub allocation_max_attempts: u32,
    /// Espera máxima por un bloqueo de fila en PostgreSQL
    pub resource_lock_timeout_ms: u64,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            log_level: "info".to_string(),
            allocation_max_attempts: 2,
            resource_lock_timeout_ms: 2_000,
        }
    }
}

/// Lee una variable opcional y la convierte, o usa el valor por defecto
pub(crate) fn parse_var<T: FromStr>(name: &str, default: T) -> AppResult<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Configuration(format!("{} must be a valid number, got '{}'", name, raw))),
        Err(_) => Ok(default),
    }
}

impl EnvironmentConfig {
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();

        let config = Self {
            environment: env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            allocation_max_attempts: parse_var("ALLOCATION_MAX_ATTEMPTS", defaults.allocation_max_attempts)?,
            resource_lock_timeout_ms: parse_var("RESOURCE_LOCK_TIMEOUT_MS", defaults.resource_lock_timeout_ms)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Rechaza valores que desactivarían los reintentos o la espera acotada de bloqueos
    pub fn validate(&self) -> AppResult<()> {
        if self.allocation_max_attempts == 0 {
            return Err(AppError::Configuration(
                "ALLOCATION_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        // En PostgreSQL lock_timeout = 0 significa esperar sin límite
        if self.resource_lock_timeout_ms == 0 {
            return Err(AppError::Configuration(
                "RESOURCE_LOCK_TIMEOUT_MS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Verificar si estamos en modo desarrollo
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Verificar si estamos en modo producción
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Nivel de log para tracing; valores desconocidos caen a INFO
    pub fn tracing_level(&self) -> tracing::Level {
        tracing::Level::from_str(&self.log_level).unwrap_or(tracing::Level::INFO)
    }
}
