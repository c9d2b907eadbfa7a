use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use crate::geo::{heading_from_movement, smooth_angle};
use crate::models::location::Coordinate;

/// Last accepted position and smoothed heading of one driver.
#[derive(Debug, Clone, Serialize)]
pub struct DriverTrack {
    pub driver_id: Uuid,
    /// Position the next heading is measured from. Only moves once the
    /// driver has travelled at least the minimum-movement distance.
    pub anchor: Coordinate,
    pub last_position: Coordinate,
    pub last_seen_at: DateTime<Utc>,
    pub heading: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingUpdate {
    pub heading: Option<f64>,
    /// False when the sample was older than the last one seen for the driver.
    pub accepted: bool,
}

/// Per-driver heading state. The dashmap entry lock is the per-driver lock.
#[derive(Default)]
pub struct HeadingTracker {
    tracks: DashMap<Uuid, DriverTrack>,
}

impl HeadingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(
        &self,
        driver_id: Uuid,
        position: Coordinate,
        at: DateTime<Utc>,
        min_movement_m: f64,
        smoothing: f64,
    ) -> HeadingUpdate {
        let mut track = self.tracks.entry(driver_id).or_insert_with(|| DriverTrack {
            driver_id,
            anchor: position,
            last_position: position,
            last_seen_at: at,
            heading: None,
        });

        if at < track.last_seen_at {
            return HeadingUpdate {
                heading: track.heading,
                accepted: false,
            };
        }

        track.last_position = position;
        track.last_seen_at = at;

        if let Some(raw) = heading_from_movement(&track.anchor, &position, min_movement_m) {
            track.heading = Some(match track.heading {
                Some(previous) => smooth_angle(previous, raw, smoothing),
                None => raw,
            });
            track.anchor = position;
        }

        HeadingUpdate {
            heading: track.heading,
            accepted: true,
        }
    }

    pub fn track(&self, driver_id: Uuid) -> Option<DriverTrack> {
        self.tracks.get(&driver_id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
