use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::location::Coordinate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripStatus {
    Scheduled,
    Active,
    Completed,
    Cancelled,
    Failed,
    EmergencyTerminated,
}

impl TripStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TripStatus::Completed
                | TripStatus::Cancelled
                | TripStatus::Failed
                | TripStatus::EmergencyTerminated
        )
    }

    pub fn can_transition_to(self, next: TripStatus) -> bool {
        matches!(
            (self, next),
            (TripStatus::Scheduled, TripStatus::Active)
                | (TripStatus::Scheduled, TripStatus::Cancelled)
                | (TripStatus::Active, TripStatus::Completed)
                | (TripStatus::Active, TripStatus::EmergencyTerminated)
                | (TripStatus::Active, TripStatus::Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TripStatus::Scheduled => "SCHEDULED",
            TripStatus::Active => "ACTIVE",
            TripStatus::Completed => "COMPLETED",
            TripStatus::Cancelled => "CANCELLED",
            TripStatus::Failed => "FAILED",
            TripStatus::EmergencyTerminated => "EMERGENCY_TERMINATED",
        }
    }
}

impl std::fmt::Display for TripStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A checkpoint. `order` is the authoritative sequence, never the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripPoint {
    pub id: Uuid,
    pub name: String,
    pub coordinate: Coordinate,
    pub order: u32,
    pub is_final_point: bool,
    pub reached_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTrip {
    pub id: Uuid,
    pub name: String,
    pub trip_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub status: TripStatus,
    pub assigned_captain_id: Uuid,
    pub company_id: Uuid,
    /// Minor currency units.
    pub price: i64,
    pub emergency_terminated_at: Option<DateTime<Utc>>,
    pub emergency_terminated_by: Option<Uuid>,
    pub points: Vec<TripPoint>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped by the store on every committed change.
    pub version: u64,
}

impl ScheduledTrip {
    /// Scheduled start, with `trip_date` and `scheduled_time` read as UTC.
    pub fn scheduled_at(&self) -> DateTime<Utc> {
        self.trip_date.and_time(self.scheduled_time).and_utc()
    }

    pub fn point(&self, point_id: Uuid) -> Option<&TripPoint> {
        self.points.iter().find(|p| p.id == point_id)
    }

    pub fn point_mut(&mut self, point_id: Uuid) -> Option<&mut TripPoint> {
        self.points.iter_mut().find(|p| p.id == point_id)
    }

    pub fn start_point(&self) -> Option<&TripPoint> {
        self.points.iter().min_by_key(|p| p.order)
    }

    /// Lowest-order point that has not been reached yet.
    pub fn next_unreached(&self) -> Option<&TripPoint> {
        self.points
            .iter()
            .filter(|p| p.reached_at.is_none())
            .min_by_key(|p| p.order)
    }

    /// Latest `reached_at` among points ordered before `order`.
    pub fn last_reached_before(&self, order: u32) -> Option<DateTime<Utc>> {
        self.points
            .iter()
            .filter(|p| p.order < order)
            .filter_map(|p| p.reached_at)
            .max()
    }

    /// Checks the checkpoint invariants a trip must satisfy when it is created.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name cannot be empty".to_string());
        }
        if self.price < 0 {
            return Err("price must be >= 0".to_string());
        }
        if self.points.len() < 2 {
            return Err("a trip needs at least two points".to_string());
        }

        let mut orders: Vec<u32> = self.points.iter().map(|p| p.order).collect();
        orders.sort_unstable();
        for (expected, order) in orders.iter().enumerate() {
            if *order as usize != expected {
                return Err(format!(
                    "point orders must be unique and contiguous from 0, found {order} at position {expected}"
                ));
            }
        }

        let finals: Vec<&TripPoint> = self.points.iter().filter(|p| p.is_final_point).collect();
        let max_order = orders.last().copied().unwrap_or_default();
        match finals.as_slice() {
            [only] if only.order == max_order => {}
            [only] => {
                return Err(format!(
                    "final point has order {} but the highest order is {max_order}",
                    only.order
                ));
            }
            _ => return Err(format!("expected exactly one final point, found {}", finals.len())),
        }

        if let Some(bad) = self.points.iter().find(|p| !p.coordinate.is_valid()) {
            return Err(format!("point {} has an invalid coordinate", bad.order));
        }
        if self.points.iter().any(|p| p.reached_at.is_some()) {
            return Err("points cannot be created as already reached".to_string());
        }

        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::three_point_trip;
    use super::TripStatus;

    #[test]
    fn terminal_states_have_no_outgoing_transitions() {
        let all = [
            TripStatus::Scheduled,
            TripStatus::Active,
            TripStatus::Completed,
            TripStatus::Cancelled,
            TripStatus::Failed,
            TripStatus::EmergencyTerminated,
        ];
        for from in all.iter().filter(|s| s.is_terminal()) {
            assert!(all.iter().all(|to| !from.can_transition_to(*to)));
        }
    }

    #[test]
    fn valid_trip_passes_validation() {
        assert!(three_point_trip().validate().is_ok());
    }

    #[test]
    fn gap_in_orders_is_rejected() {
        let mut trip = three_point_trip();
        trip.points[1].order = 5;
        trip.points[2].order = 6;
        assert!(trip.validate().is_err());
    }

    #[test]
    fn final_point_must_have_highest_order() {
        let mut trip = three_point_trip();
        trip.points[2].is_final_point = false;
        trip.points[1].is_final_point = true;
        assert!(trip.validate().is_err());
    }

    #[test]
    fn scheduled_at_combines_date_and_time() {
        let trip = three_point_trip();
        assert_eq!(trip.scheduled_at().to_rfc3339(), "2026-03-14T09:00:00+00:00");
    }

    #[test]
    fn next_unreached_uses_order_not_position() {
        let mut trip = three_point_trip();
        trip.points.reverse();
        assert_eq!(trip.next_unreached().map(|p| p.order), Some(0));
    }
}
