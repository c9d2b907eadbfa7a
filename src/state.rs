use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use crate::config::{Config, EngineSettings};
use crate::engine::emergency::{ForfeiturePolicy, RatioForfeiture};
use crate::engine::heading::HeadingTracker;
use crate::engine::locks::TripLocks;
use crate::models::event::TripEvent;
use crate::models::location::LocationSample;
use crate::observability::metrics::Metrics;
use crate::store::{MemoryStore, TripStore};

pub struct AppState {
    pub store: Arc<dyn TripStore>,
    pub locks: TripLocks,
    pub headings: HeadingTracker,
    pub settings: EngineSettings,
    pub forfeiture: Arc<dyn ForfeiturePolicy>,
    pub sample_tx: mpsc::Sender<LocationSample>,
    pub events_tx: broadcast::Sender<TripEvent>,
    pub metrics: Metrics,
}

impl AppState {
    /// In-memory state with default tuning and full forfeiture on emergencies.
    pub fn new(
        sample_queue_size: usize,
        event_buffer_size: usize,
    ) -> (Self, mpsc::Receiver<LocationSample>) {
        Self::with_parts(
            Arc::new(MemoryStore::new()),
            EngineSettings::default(),
            Arc::new(RatioForfeiture { ratio: 1.0 }),
            sample_queue_size,
            event_buffer_size,
        )
    }

    pub fn from_config(config: &Config) -> (Self, mpsc::Receiver<LocationSample>) {
        Self::with_parts(
            Arc::new(MemoryStore::new()),
            config.engine.clone(),
            Arc::new(RatioForfeiture {
                ratio: config.emergency_forfeit_ratio,
            }),
            config.sample_queue_size,
            config.event_buffer_size,
        )
    }

    pub fn with_parts(
        store: Arc<dyn TripStore>,
        settings: EngineSettings,
        forfeiture: Arc<dyn ForfeiturePolicy>,
        sample_queue_size: usize,
        event_buffer_size: usize,
    ) -> (Self, mpsc::Receiver<LocationSample>) {
        let (sample_tx, sample_rx) = mpsc::channel(sample_queue_size);
        let (events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        (
            Self {
                store,
                locks: TripLocks::new(),
                headings: HeadingTracker::new(),
                settings,
                forfeiture,
                sample_tx,
                events_tx,
                metrics: Metrics::new(),
            },
            sample_rx,
        )
    }
}
