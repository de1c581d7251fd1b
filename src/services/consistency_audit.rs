//! Auditoría de consistencia
//!
//! Comprueba que cada camión IN_USE y cada conductor BUSY tenga exactamente
//! un viaje abierto, y viceversa. Solo informa: los fallos se registran para
//! reconciliación manual y nunca se corrigen automáticamente.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::models::{Availability, ResourceRef, ResourceStatus, Trip, TripFilter};
use crate::repositories::FleetStore;
use crate::utils::errors::AppResult;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "fault", rename_all = "snake_case")]
pub enum ConsistencyFault {
    /// Recurso comprometido sin ningún viaje abierto
    EngagedWithoutTrip { resource: ResourceRef },
    /// Viaje abierto cuyo recurso no está comprometido
    OpenTripOnUnengaged {
        trip_id: Uuid,
        resource: ResourceRef,
        status: ResourceStatus,
    },
    /// Más de un viaje abierto sobre el mismo recurso
    MultipleOpenTrips { resource: ResourceRef, trips: Vec<Uuid> },
    /// Viaje abierto que referencia un recurso inexistente
    MissingResource { trip_id: Uuid, resource: ResourceRef },
}

impl std::fmt::Display for ConsistencyFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsistencyFault::EngagedWithoutTrip { resource } => {
                write!(f, "{} is engaged but no open trip references it", resource)
            }
            ConsistencyFault::OpenTripOnUnengaged { trip_id, resource, status } => {
                write!(f, "open trip {} references {} which is {}", trip_id, resource, status)
            }
            ConsistencyFault::MultipleOpenTrips { resource, trips } => {
                write!(f, "{} is referenced by {} open trips", resource, trips.len())
            }
            ConsistencyFault::MissingResource { trip_id, resource } => {
                write!(f, "open trip {} references missing {}", trip_id, resource)
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditReport {
    pub trucks_checked: usize,
    pub drivers_checked: usize,
    pub open_trips: usize,
    pub faults: Vec<ConsistencyFault>,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.faults.is_empty()
    }
}

pub struct ConsistencyAuditor {
    store: Arc<dyn FleetStore>,
}

impl ConsistencyAuditor {
    pub fn new(store: Arc<dyn FleetStore>) -> Self {
        Self { store }
    }

    /// Una pasada sobre el estado confirmado
    pub async fn audit(&self) -> AppResult<AuditReport> {
        let trucks = self.store.list_trucks(None).await?;
        let drivers = self.store.list_drivers(None).await?;
        let open_trips: Vec<Trip> = self
            .store
            .list_trips(&TripFilter::default())
            .await?
            .into_iter()
            .filter(|trip| trip.status.is_open())
            .collect();

        let mut statuses: HashMap<ResourceRef, ResourceStatus> = HashMap::new();
        for truck in &trucks {
            statuses.insert(ResourceRef::truck(truck.id), ResourceStatus::Truck(truck.status));
        }
        for driver in &drivers {
            statuses.insert(ResourceRef::driver(driver.id), ResourceStatus::Driver(driver.status));
        }

        let mut references: HashMap<ResourceRef, Vec<Uuid>> = HashMap::new();
        for trip in &open_trips {
            for resource in [ResourceRef::truck(trip.truck_id), ResourceRef::driver(trip.driver_id)] {
                references.entry(resource).or_default().push(trip.id);
            }
        }

        let mut faults = Vec::new();

        for (resource, status) in &statuses {
            if status.availability() == Availability::Engaged && !references.contains_key(resource) {
                faults.push(ConsistencyFault::EngagedWithoutTrip { resource: *resource });
            }
        }

        for (resource, trips) in &references {
            match statuses.get(resource) {
                None => {
                    for trip_id in trips {
                        faults.push(ConsistencyFault::MissingResource {
                            trip_id: *trip_id,
                            resource: *resource,
                        });
                    }
                }
                Some(status) if status.availability() != Availability::Engaged => {
                    for trip_id in trips {
                        faults.push(ConsistencyFault::OpenTripOnUnengaged {
                            trip_id: *trip_id,
                            resource: *resource,
                            status: *status,
                        });
                    }
                }
                Some(_) => {}
            }
            if trips.len() > 1 {
                let mut trips = trips.clone();
                trips.sort();
                faults.push(ConsistencyFault::MultipleOpenTrips {
                    resource: *resource,
                    trips,
                });
            }
        }

        Ok(AuditReport {
            trucks_checked: trucks.len(),
            drivers_checked: drivers.len(),
            open_trips: open_trips.len(),
            faults,
        })
    }

    /// Las lecturas de una pasada no forman una instantánea única; con
    /// tráfico concurrente solo se informan los fallos vistos en dos pasadas
    /// consecutivas.
    pub async fn audit_confirmed(&self) -> AppResult<AuditReport> {
        let first = self.audit().await?;
        if first.is_consistent() {
            info!(
                "✅ Flota consistente: {} camiones, {} conductores, {} viajes abiertos",
                first.trucks_checked, first.drivers_checked, first.open_trips
            );
            return Ok(first);
        }

        let seen: HashSet<ConsistencyFault> = first.faults.into_iter().collect();
        let mut second = self.audit().await?;
        second.faults.retain(|fault| seen.contains(fault));

        for fault in &second.faults {
            error!("🚨 Fallo de consistencia (requiere reconciliación manual): {}", fault);
        }
        Ok(second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Driver, DriverStatus, TripStatus, Truck, TruckStatus};
    use crate::repositories::MemoryFleetStore;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn open_trip(truck: &Truck, driver: &Driver) -> Trip {
        let now = Utc::now();
        Trip {
            id: Uuid::new_v4(),
            truck_id: truck.id,
            driver_id: driver.id,
            client_id: Uuid::new_v4(),
            origin: "Dijon".into(),
            destination: "Metz".into(),
            distance: Decimal::new(250, 0),
            estimated_cost: None,
            actual_cost: None,
            revenue: Decimal::ZERO,
            fuel_cost: Decimal::ZERO,
            maintenance_cost: Decimal::ZERO,
            other_expenses: Decimal::ZERO,
            status: TripStatus::InProgress,
            start_date: Some(now),
            end_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_consistent_fleet_has_no_faults() {
        let store = MemoryFleetStore::new();
        let truck = Truck::new("ZZ-1", "DAF XF", 2023).with_status(TruckStatus::InUse);
        let driver = Driver::new("Eva", "eva@fleet.io", "+33 7", "DL-9").with_status(DriverStatus::Busy);
        store.insert_truck(truck.clone()).await;
        store.insert_driver(driver.clone()).await;
        store.overwrite_trip(open_trip(&truck, &driver)).await;

        let report = ConsistencyAuditor::new(Arc::new(store)).audit_confirmed().await.unwrap();
        assert!(report.is_consistent());
        assert_eq!(report.open_trips, 1);
    }

    #[tokio::test]
    async fn test_detects_orphaned_and_unbacked_resources() {
        let store = MemoryFleetStore::new();
        let orphan = Truck::new("ZZ-2", "DAF XF", 2023).with_status(TruckStatus::InUse);
        let truck = Truck::new("ZZ-3", "DAF XF", 2023);
        let driver = Driver::new("Eva", "eva@fleet.io", "+33 7", "DL-9").with_status(DriverStatus::Busy);
        store.insert_truck(orphan.clone()).await;
        store.insert_truck(truck.clone()).await;
        store.insert_driver(driver.clone()).await;
        let trip = open_trip(&truck, &driver);
        store.overwrite_trip(trip.clone()).await;

        let report = ConsistencyAuditor::new(Arc::new(store)).audit().await.unwrap();
        assert!(report.faults.contains(&ConsistencyFault::EngagedWithoutTrip {
            resource: ResourceRef::truck(orphan.id)
        }));
        assert!(report.faults.contains(&ConsistencyFault::OpenTripOnUnengaged {
            trip_id: trip.id,
            resource: ResourceRef::truck(truck.id),
            status: ResourceStatus::Truck(TruckStatus::Available),
        }));
        assert_eq!(report.faults.len(), 2);
    }

    #[tokio::test]
    async fn test_detects_double_booking() {
        let store = MemoryFleetStore::new();
        let truck = Truck::new("ZZ-4", "DAF XF", 2023).with_status(TruckStatus::InUse);
        let first = Driver::new("Eva", "eva@fleet.io", "+33 7", "DL-9").with_status(DriverStatus::Busy);
        let second = Driver::new("Leo", "leo@fleet.io", "+33 8", "DL-10").with_status(DriverStatus::Busy);
        store.insert_truck(truck.clone()).await;
        store.insert_driver(first.clone()).await;
        store.insert_driver(second.clone()).await;
        store.overwrite_trip(open_trip(&truck, &first)).await;
        store.overwrite_trip(open_trip(&truck, &second)).await;

        let report = ConsistencyAuditor::new(Arc::new(store)).audit_confirmed().await.unwrap();
        assert_eq!(report.faults.len(), 1);
        assert!(matches!(
            &report.faults[0],
            ConsistencyFault::MultipleOpenTrips { trips, .. } if trips.len() == 2
        ));
    }
}
