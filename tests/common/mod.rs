#![allow(dead_code)]

use std::sync::Arc;

use fleet_dispatch::config::EnvironmentConfig;
use fleet_dispatch::dto::CreateTripRequest;
use fleet_dispatch::models::{Client, Driver, DriverStatus, TripFilter, Truck, TruckStatus};
use fleet_dispatch::repositories::{FleetStore, MemoryFleetStore};
use fleet_dispatch::state::AppState;
use rust_decimal::Decimal;
use uuid::Uuid;

pub struct Fleet {
    pub store: MemoryFleetStore,
    pub state: AppState,
    pub trucks: Vec<Truck>,
    pub drivers: Vec<Driver>,
    pub client: Client,
}

/// Flota en memoria con `size` camiones disponibles y `size` conductores activos
pub async fn fleet(size: usize) -> Fleet {
    let store = MemoryFleetStore::new();
    let mut trucks = Vec::new();
    let mut drivers = Vec::new();

    for i in 0..size {
        let truck = Truck::new(format!("FL-{:03}-AA", i), "Volvo FH16", 2021);
        let driver = Driver::new(
            format!("Driver {}", i),
            format!("driver{}@fleet.io", i),
            "+33 6 00 00 00 00",
            format!("DL-{:05}", i),
        );
        store.insert_truck(truck.clone()).await;
        store.insert_driver(driver.clone()).await;
        trucks.push(truck);
        drivers.push(driver);
    }

    let client = Client::new("Transports Dupont", "contact@dupont.fr", "+33 1 00", "12 quai de Seine");
    store.insert_client(client.clone()).await;

    let shared: Arc<dyn FleetStore> = Arc::new(store.clone());
    let state = AppState::new(shared, EnvironmentConfig::default());

    Fleet {
        store,
        state,
        trucks,
        drivers,
        client,
    }
}

impl Fleet {
    pub fn request(&self, truck: usize, driver: usize) -> CreateTripRequest {
        CreateTripRequest::new(
            self.trucks[truck].id,
            self.drivers[driver].id,
            self.client.id,
            "Paris",
            "Lyon",
            Decimal::new(46_500, 2),
        )
    }

    pub async fn truck_status(&self, truck: usize) -> TruckStatus {
        self.store
            .get_truck(self.trucks[truck].id)
            .await
            .unwrap()
            .unwrap()
            .status
    }

    pub async fn driver_status(&self, driver: usize) -> DriverStatus {
        self.store
            .get_driver(self.drivers[driver].id)
            .await
            .unwrap()
            .unwrap()
            .status
    }

    /// truck IN_USE ⇔ exactamente un viaje abierto; igual para conductor BUSY
    pub async fn assert_invariant(&self) {
        for truck in &self.trucks {
            let open = self
                .store
                .count_open_trips(&TripFilter::by_truck(truck.id))
                .await
                .unwrap();
            let status = self.store.get_truck(truck.id).await.unwrap().unwrap().status;
            assert_eq!(
                status == TruckStatus::InUse,
                open == 1,
                "truck {} is {} with {} open trips",
                truck.license_plate,
                status,
                open
            );
            assert!(open <= 1);
        }
        for driver in &self.drivers {
            let open = self
                .store
                .count_open_trips(&TripFilter::by_driver(driver.id))
                .await
                .unwrap();
            let status = self.store.get_driver(driver.id).await.unwrap().unwrap().status;
            assert_eq!(
                status == DriverStatus::Busy,
                open == 1,
                "driver {} is {} with {} open trips",
                driver.name,
                status,
                open
            );
            assert!(open <= 1);
        }

        let report = self.state.auditor.audit().await.unwrap();
        assert!(report.is_consistent(), "audit faults: {:?}", report.faults);
    }

    pub fn unknown_id() -> Uuid {
        Uuid::new_v4()
    }
}
