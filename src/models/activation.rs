use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ActivationReason {
    Ready,
    NotEligible,
    OutsideWindow,
    TooFarFromStart,
}

impl ActivationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivationReason::Ready => "ready",
            ActivationReason::NotEligible => "not-eligible",
            ActivationReason::OutsideWindow => "outside-window",
            ActivationReason::TooFarFromStart => "too-far-from-start",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationDecision {
    pub can_activate: bool,
    pub reason: ActivationReason,
}

/// Latest activation evaluation for a trip. Overwritten, never appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripActivationCheck {
    pub trip_id: Uuid,
    pub can_activate: bool,
    pub evaluated_at: DateTime<Utc>,
    pub reason: ActivationReason,
}

/// Per-trip entry of a location update response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationCheckResult {
    pub trip_id: Uuid,
    pub can_activate: bool,
    pub reason: ActivationReason,
}
