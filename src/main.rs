use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use tracing::{error, info};

use fleet_dispatch::config::{DatabaseConfig, EnvironmentConfig};
use fleet_dispatch::database::DatabaseConnection;
use fleet_dispatch::repositories::{FleetStore, PgFleetStore};
use fleet_dispatch::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    let config = EnvironmentConfig::from_env()?;

    // Configurar logging
    tracing_subscriber::fmt()
        .with_max_level(config.tracing_level())
        .init();

    info!("🚚 Fleet Dispatch - Asignación de viajes");
    info!("========================================");
    info!(
        "⚙️ Entorno: {} | intentos de asignación: {} | lock_timeout: {}ms",
        config.environment, config.allocation_max_attempts, config.resource_lock_timeout_ms
    );

    // Inicializar base de datos
    let db_config = DatabaseConfig::from_env()?;
    let db_connection = match DatabaseConnection::connect(&db_config).await {
        Ok(conn) => conn,
        Err(e) => {
            error!("❌ Error conectando a la base de datos: {}", e);
            return Err(anyhow::anyhow!("Error de base de datos: {}", e));
        }
    };

    let store: Arc<dyn FleetStore> = Arc::new(PgFleetStore::new(
        db_connection.pool().clone(),
        config.resource_lock_timeout_ms,
    ));
    let app_state = AppState::new(store, config);

    // Auditoría de consistencia: solo informa, nunca corrige
    info!("🔍 Auditando consistencia de camiones, conductores y viajes...");
    let report = app_state.auditor.audit_confirmed().await?;

    if report.is_consistent() {
        info!("👋 Auditoría terminada sin fallos");
        return Ok(());
    }

    error!(
        "🚨 {} fallo(s) de consistencia; se requiere reconciliación manual",
        report.faults.len()
    );
    info!("{}", serde_json::to_string_pretty(&report)?);
    std::process::exit(2);
}
