use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyUsage {
    pub trip_id: Uuid,
    pub driver_id: Uuid,
    pub triggered_at: DateTime<Utc>,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    EmergencyForfeit,
    EmergencyPartialPayout,
}

/// Append-only accounting record. `amount` is signed, in minor currency units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub driver_id: Uuid,
    pub amount: i64,
    pub kind: LedgerKind,
    pub created_at: DateTime<Utc>,
}
