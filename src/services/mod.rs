//! Servicios del núcleo
//!
//! Registro de recursos, máquina de estados de viajes, coordinador de
//! asignación, consultas y auditoría de consistencia.

pub mod allocation_coordinator;
pub mod consistency_audit;
pub mod resource_registry;
pub mod trip_query_service;
pub mod trip_state_machine;

pub use allocation_coordinator::AllocationCoordinator;
pub use consistency_audit::{AuditReport, ConsistencyAuditor, ConsistencyFault};
pub use resource_registry::ResourceRegistry;
pub use trip_query_service::TripQueryService;
