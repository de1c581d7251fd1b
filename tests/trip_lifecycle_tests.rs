mod common;

use common::{fleet, Fleet};
use fleet_dispatch::models::{
    DriverStatus, ResourceKind, ResourceRef, ResourceStatus, TripFilter, TripStatus, TruckStatus,
};
use fleet_dispatch::repositories::FleetStore;
use fleet_dispatch::utils::errors::{AppError, EntityKind};

#[tokio::test]
async fn test_full_lifecycle_scenario() {
    let f = fleet(1).await;
    let coordinator = &f.state.coordinator;

    let trip = coordinator.create_trip(f.request(0, 0)).await.unwrap();
    assert_eq!(trip.status, TripStatus::Planned);
    assert_eq!(f.truck_status(0).await, TruckStatus::InUse);
    assert_eq!(f.driver_status(0).await, DriverStatus::Busy);
    f.assert_invariant().await;

    // Segunda asignación antes de completar
    let err = coordinator.create_trip(f.request(0, 0)).await.unwrap_err();
    assert!(matches!(err, AppError::ResourceUnavailable { kind: ResourceKind::Truck, .. }));

    let started = coordinator.transition(trip.id, TripStatus::InProgress).await.unwrap();
    assert_eq!(started.status, TripStatus::InProgress);
    assert!(started.start_date.is_some());
    assert_eq!(f.truck_status(0).await, TruckStatus::InUse);
    assert_eq!(f.driver_status(0).await, DriverStatus::Busy);
    f.assert_invariant().await;

    let err = coordinator.create_trip(f.request(0, 0)).await.unwrap_err();
    assert!(matches!(err, AppError::ResourceUnavailable { .. }));

    let completed = coordinator.transition(trip.id, TripStatus::Completed).await.unwrap();
    assert_eq!(completed.status, TripStatus::Completed);
    assert!(completed.end_date.is_some());
    assert_eq!(completed.start_date, started.start_date);
    assert_eq!(f.truck_status(0).await, TruckStatus::Available);
    assert_eq!(f.driver_status(0).await, DriverStatus::Active);
    f.assert_invariant().await;

    // Los recursos vuelven a estar libres para otro viaje
    let next = coordinator.create_trip(f.request(0, 0)).await.unwrap();
    assert_eq!(next.status, TripStatus::Planned);
    f.assert_invariant().await;
}

#[tokio::test]
async fn test_illegal_transitions_leave_state_unchanged() {
    let f = fleet(1).await;
    let coordinator = &f.state.coordinator;
    let trip = coordinator.create_trip(f.request(0, 0)).await.unwrap();

    let err = coordinator.transition(trip.id, TripStatus::Completed).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::InvalidTransition {
            from: TripStatus::Planned,
            to: TripStatus::Completed
        }
    ));
    assert_eq!(f.state.queries.get_trip(trip.id).await.unwrap().status, TripStatus::Planned);
    assert_eq!(f.truck_status(0).await, TruckStatus::InUse);

    coordinator.cancel_trip(trip.id).await.unwrap();
    for target in TripStatus::ALL {
        let err = coordinator.transition(trip.id, target).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidTransition {
                from: TripStatus::Cancelled,
                ..
            }
        ));
    }
    f.assert_invariant().await;
}

#[tokio::test]
async fn test_cancel_releases_from_planned_and_in_progress() {
    let f = fleet(2).await;
    let coordinator = &f.state.coordinator;

    let planned = coordinator.create_trip(f.request(0, 0)).await.unwrap();
    let running = coordinator.create_trip(f.request(1, 1)).await.unwrap();
    coordinator.start_trip(running.id).await.unwrap();

    let cancelled = coordinator.cancel_trip(planned.id).await.unwrap();
    assert_eq!(cancelled.status, TripStatus::Cancelled);
    assert!(cancelled.end_date.is_none());
    coordinator.cancel_trip(running.id).await.unwrap();

    for i in 0..2 {
        assert_eq!(f.truck_status(i).await, TruckStatus::Available);
        assert_eq!(f.driver_status(i).await, DriverStatus::Active);
    }
    f.assert_invariant().await;
}

#[tokio::test]
async fn test_delete_planned_trip_releases_resources() {
    let f = fleet(1).await;
    let coordinator = &f.state.coordinator;
    let trip = coordinator.create_trip(f.request(0, 0)).await.unwrap();

    coordinator.delete_trip(trip.id).await.unwrap();

    assert!(f.store.get_trip(trip.id).await.unwrap().is_none());
    assert_eq!(f.truck_status(0).await, TruckStatus::Available);
    assert_eq!(f.driver_status(0).await, DriverStatus::Active);
    f.assert_invariant().await;
}

#[tokio::test]
async fn test_delete_in_progress_trip_fails_without_side_effects() {
    let f = fleet(1).await;
    let coordinator = &f.state.coordinator;
    let trip = coordinator.create_trip(f.request(0, 0)).await.unwrap();
    let started = coordinator.start_trip(trip.id).await.unwrap();

    let err = coordinator.delete_trip(trip.id).await.unwrap_err();
    assert!(matches!(err, AppError::TripActive(id) if id == trip.id));

    assert_eq!(f.state.queries.get_trip(trip.id).await.unwrap(), started);
    assert_eq!(f.truck_status(0).await, TruckStatus::InUse);
    assert_eq!(f.driver_status(0).await, DriverStatus::Busy);
    f.assert_invariant().await;
}

#[tokio::test]
async fn test_delete_terminal_trip_keeps_resources_untouched() {
    let f = fleet(2).await;
    let coordinator = &f.state.coordinator;
    let old = coordinator.create_trip(f.request(0, 0)).await.unwrap();
    coordinator.start_trip(old.id).await.unwrap();
    coordinator.complete_trip(old.id).await.unwrap();

    // El camión ya está en otro viaje; borrar el histórico no lo libera
    let current = coordinator.create_trip(f.request(0, 1)).await.unwrap();
    coordinator.delete_trip(old.id).await.unwrap();

    assert_eq!(f.truck_status(0).await, TruckStatus::InUse);
    assert_eq!(f.state.queries.get_trip(current.id).await.unwrap().status, TripStatus::Planned);
    f.assert_invariant().await;
}

#[tokio::test]
async fn test_not_found_errors() {
    let f = fleet(1).await;
    let coordinator = &f.state.coordinator;

    let mut req = f.request(0, 0);
    req.truck_id = Fleet::unknown_id();
    assert!(matches!(
        coordinator.create_trip(req).await,
        Err(AppError::NotFound { entity: EntityKind::Truck, .. })
    ));

    let mut req = f.request(0, 0);
    req.driver_id = Fleet::unknown_id();
    assert!(matches!(
        coordinator.create_trip(req).await,
        Err(AppError::NotFound { entity: EntityKind::Driver, .. })
    ));
    // La reserva del camión se descartó con la unidad de trabajo
    assert_eq!(f.truck_status(0).await, TruckStatus::Available);

    let missing = Fleet::unknown_id();
    assert!(matches!(
        coordinator.transition(missing, TripStatus::InProgress).await,
        Err(AppError::NotFound { entity: EntityKind::Trip, .. })
    ));
    assert!(matches!(
        coordinator.delete_trip(missing).await,
        Err(AppError::NotFound { entity: EntityKind::Trip, .. })
    ));
    f.assert_invariant().await;
}

#[tokio::test]
async fn test_abandoned_unit_of_work_leaves_no_reservation() {
    let f = fleet(1).await;
    let truck = ResourceRef::truck(f.trucks[0].id);
    let driver = ResourceRef::driver(f.drivers[0].id);

    {
        let mut tx = f.store.begin().await.unwrap();
        f.state.registry.reserve_in(tx.as_mut(), truck).await.unwrap();
        f.state.registry.reserve_in(tx.as_mut(), driver).await.unwrap();
        // El manejador falla antes de crear el viaje: la transacción se suelta
    }

    assert_eq!(f.truck_status(0).await, TruckStatus::Available);
    assert_eq!(f.driver_status(0).await, DriverStatus::Active);
    f.assert_invariant().await;
}

#[tokio::test]
async fn test_query_facade() {
    let f = fleet(3).await;
    let coordinator = &f.state.coordinator;
    let queries = &f.state.queries;

    let a = coordinator.create_trip(f.request(0, 0)).await.unwrap();
    let b = coordinator.create_trip(f.request(1, 1)).await.unwrap();
    coordinator.start_trip(b.id).await.unwrap();

    let by_driver = queries.trips_by_driver(f.drivers[0].id).await.unwrap();
    assert_eq!(by_driver.len(), 1);
    assert_eq!(by_driver[0].id, a.id);

    let by_truck = queries.trips_by_truck(f.trucks[1].id).await.unwrap();
    assert_eq!(by_truck.len(), 1);
    assert_eq!(by_truck[0].id, b.id);

    let active = queries.active_trips().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, b.id);

    assert_eq!(queries.trips_by_status(TripStatus::Planned).await.unwrap().len(), 1);

    let free_trucks = queries.available_trucks().await.unwrap();
    assert_eq!(free_trucks.len(), 1);
    assert_eq!(free_trucks[0].id, f.trucks[2].id);
    assert_eq!(queries.available_drivers().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_available_truck_with_open_trip_is_never_double_booked() {
    let f = fleet(2).await;
    let coordinator = &f.state.coordinator;
    let first = coordinator.create_trip(f.request(0, 0)).await.unwrap();

    // Estado corrupto: el camión figura libre aunque su viaje sigue abierto
    f.store
        .overwrite_resource_status(
            ResourceRef::truck(f.trucks[0].id),
            ResourceStatus::Truck(TruckStatus::Available),
        )
        .await;

    let err = coordinator.create_trip(f.request(0, 1)).await.unwrap_err();
    assert!(matches!(err, AppError::ConsistencyFault(_)), "got {:?}", err);

    let open = f
        .store
        .count_open_trips(&TripFilter::by_truck(f.trucks[0].id))
        .await
        .unwrap();
    assert_eq!(open, 1);
    assert_eq!(f.state.queries.trips_by_truck(f.trucks[0].id).await.unwrap()[0].id, first.id);
    // La unidad fallida no dejó nada comprometido
    assert_eq!(f.truck_status(0).await, TruckStatus::Available);
    assert_eq!(f.driver_status(1).await, DriverStatus::Active);
}
