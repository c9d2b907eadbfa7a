use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::location::Coordinate;
use crate::models::trip::TripStatus;

/// Real-time notification published on the event channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TripEvent {
    StatusChanged {
        trip_id: Uuid,
        from: TripStatus,
        to: TripStatus,
        at: DateTime<Utc>,
    },
    CheckpointReached {
        trip_id: Uuid,
        point_id: Uuid,
        order: u32,
        at: DateTime<Utc>,
    },
    EmergencyTerminated {
        trip_id: Uuid,
        driver_id: Uuid,
        reason: String,
        at: DateTime<Utc>,
    },
    DriverMoved {
        driver_id: Uuid,
        coordinate: Coordinate,
        heading: Option<f64>,
        at: DateTime<Utc>,
    },
}

impl TripEvent {
    pub fn trip_id(&self) -> Option<Uuid> {
        match self {
            TripEvent::StatusChanged { trip_id, .. }
            | TripEvent::CheckpointReached { trip_id, .. }
            | TripEvent::EmergencyTerminated { trip_id, .. } => Some(*trip_id),
            TripEvent::DriverMoved { .. } => None,
        }
    }

    pub fn driver_id(&self) -> Option<Uuid> {
        match self {
            TripEvent::EmergencyTerminated { driver_id, .. }
            | TripEvent::DriverMoved { driver_id, .. } => Some(*driver_id),
            _ => None,
        }
    }
}
