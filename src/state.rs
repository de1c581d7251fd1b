//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación: el almacén de
//! flota y los servicios del núcleo, construidos una sola vez e inyectados
//! donde se necesiten.

use std::sync::Arc;

use crate::config::environment::EnvironmentConfig;
use crate::repositories::FleetStore;
use crate::services::allocation_coordinator::AllocationCoordinator;
use crate::services::consistency_audit::ConsistencyAuditor;
use crate::services::resource_registry::ResourceRegistry;
use crate::services::trip_query_service::TripQueryService;

#[derive(Clone)]
pub struct AppState {
    pub config: EnvironmentConfig,
    pub store: Arc<dyn FleetStore>,
    pub registry: Arc<ResourceRegistry>,
    pub coordinator: Arc<AllocationCoordinator>,
    pub queries: Arc<TripQueryService>,
    pub auditor: Arc<ConsistencyAuditor>,
}

impl AppState {
    pub fn new(store: Arc<dyn FleetStore>, config: EnvironmentConfig) -> Self {
        let registry = Arc::new(ResourceRegistry::new(Arc::clone(&store)));
        let coordinator = Arc::new(AllocationCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            config.allocation_max_attempts,
        ));

        Self {
            queries: Arc::new(TripQueryService::new(Arc::clone(&store))),
            auditor: Arc::new(ConsistencyAuditor::new(Arc::clone(&store))),
            registry,
            coordinator,
            store,
            config,
        }
    }
}
