//! Máquina de estados de viajes
//!
//! PLANNED → IN_PROGRESS → COMPLETED, y cancelación desde PLANNED o
//! IN_PROGRESS. COMPLETED y CANCELLED son terminales. Este módulo no toca
//! la persistencia: solo decide si un cambio es legal y qué efectos conlleva.

use chrono::{DateTime, Utc};

use crate::models::{Trip, TripStatus, TripStatusChange};
use crate::utils::errors::{AppError, AppResult};

/// Transiciones legales (origen, destino)
pub const LEGAL_TRANSITIONS: [(TripStatus, TripStatus); 4] = [
    (TripStatus::Planned, TripStatus::InProgress),
    (TripStatus::Planned, TripStatus::Cancelled),
    (TripStatus::InProgress, TripStatus::Completed),
    (TripStatus::InProgress, TripStatus::Cancelled),
];

pub fn is_legal(from: TripStatus, to: TripStatus) -> bool {
    LEGAL_TRANSITIONS.contains(&(from, to))
}

/// Efectos de una transición validada
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionPlan {
    pub from: TripStatus,
    pub change: TripStatusChange,
    /// El camión y el conductor vuelven a estar disponibles
    pub releases_resources: bool,
}

/// Valida la transición y calcula el nuevo estado con sus marcas de tiempo
pub fn plan_transition(trip: &Trip, target: TripStatus, now: DateTime<Utc>) -> AppResult<TransitionPlan> {
    let from = trip.status;
    if !is_legal(from, target) {
        return Err(AppError::InvalidTransition { from, to: target });
    }

    let mut change = TripStatusChange {
        status: target,
        start_date: trip.start_date,
        end_date: trip.end_date,
        updated_at: now,
    };

    let releases_resources = match target {
        TripStatus::InProgress => {
            change.start_date = Some(trip.start_date.unwrap_or(now));
            false
        }
        TripStatus::Completed => {
            change.end_date = Some(now);
            true
        }
        TripStatus::Cancelled => true,
        TripStatus::Planned => false,
    };

    Ok(TransitionPlan {
        from,
        change,
        releases_resources,
    })
}

/// Rechaza cualquier modificación de un viaje terminal
pub fn ensure_mutable(trip: &Trip) -> AppResult<()> {
    if trip.status.is_terminal() {
        return Err(AppError::TripFinalized(trip.id, trip.status));
    }
    Ok(())
}

/// Efectos de eliminar un viaje
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletionPlan {
    pub expected: TripStatus,
    pub releases_resources: bool,
}

/// Un viaje en curso no se puede eliminar; uno planificado libera sus recursos
pub fn plan_deletion(trip: &Trip) -> AppResult<DeletionPlan> {
    match trip.status {
        TripStatus::InProgress => Err(AppError::TripActive(trip.id)),
        TripStatus::Planned => Ok(DeletionPlan {
            expected: TripStatus::Planned,
            releases_resources: true,
        }),
        status => Ok(DeletionPlan {
            expected: status,
            releases_resources: false,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::trip_dto::CreateTripRequest;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn trip_in(status: TripStatus) -> Trip {
        let mut trip = CreateTripRequest::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Bordeaux",
            "Toulouse",
            Decimal::new(245, 0),
        )
        .to_planned_trip(Utc::now());
        trip.status = status;
        trip
    }

    #[test]
    fn test_transition_table_is_complete() {
        for from in TripStatus::ALL {
            for to in TripStatus::ALL {
                let result = plan_transition(&trip_in(from), to, Utc::now());
                if LEGAL_TRANSITIONS.contains(&(from, to)) {
                    assert!(result.is_ok(), "{} -> {} should be legal", from, to);
                } else {
                    match result {
                        Err(AppError::InvalidTransition { from: f, to: t }) => {
                            assert_eq!((f, t), (from, to));
                        }
                        other => panic!("{} -> {} gave {:?}", from, to, other),
                    }
                }
            }
        }
    }

    #[test]
    fn test_start_sets_start_date_only_if_absent() {
        let now = Utc::now();
        let plan = plan_transition(&trip_in(TripStatus::Planned), TripStatus::InProgress, now).unwrap();
        assert_eq!(plan.change.start_date, Some(now));
        assert!(!plan.releases_resources);

        let planned_start = now - Duration::hours(3);
        let mut trip = trip_in(TripStatus::Planned);
        trip.start_date = Some(planned_start);
        let plan = plan_transition(&trip, TripStatus::InProgress, now).unwrap();
        assert_eq!(plan.change.start_date, Some(planned_start));
    }

    #[test]
    fn test_complete_sets_end_date_and_releases() {
        let now = Utc::now();
        let plan = plan_transition(&trip_in(TripStatus::InProgress), TripStatus::Completed, now).unwrap();
        assert_eq!(plan.change.end_date, Some(now));
        assert!(plan.releases_resources);
    }

    #[test]
    fn test_cancel_releases_from_both_open_states() {
        for from in [TripStatus::Planned, TripStatus::InProgress] {
            let plan = plan_transition(&trip_in(from), TripStatus::Cancelled, Utc::now()).unwrap();
            assert!(plan.releases_resources);
            assert_eq!(plan.from, from);
        }
    }

    #[test]
    fn test_terminal_trips_are_frozen() {
        assert!(ensure_mutable(&trip_in(TripStatus::Planned)).is_ok());
        assert!(matches!(
            ensure_mutable(&trip_in(TripStatus::Completed)),
            Err(AppError::TripFinalized(_, TripStatus::Completed))
        ));
        assert!(matches!(
            ensure_mutable(&trip_in(TripStatus::Cancelled)),
            Err(AppError::TripFinalized(_, TripStatus::Cancelled))
        ));
    }

    #[test]
    fn test_deletion_rules() {
        assert!(matches!(
            plan_deletion(&trip_in(TripStatus::InProgress)),
            Err(AppError::TripActive(_))
        ));
        assert!(plan_deletion(&trip_in(TripStatus::Planned)).unwrap().releases_resources);
        assert!(!plan_deletion(&trip_in(TripStatus::Completed)).unwrap().releases_resources);
        assert!(!plan_deletion(&trip_in(TripStatus::Cancelled)).unwrap().releases_resources);
    }
}
