use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub location_samples_total: IntCounterVec,
    pub sample_latency_seconds: HistogramVec,
    pub trip_transitions_total: IntCounterVec,
    pub checkpoints_reached_total: IntCounter,
    pub emergency_terminations_total: IntCounterVec,
    pub samples_in_queue: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let location_samples_total = IntCounterVec::new(
            Opts::new("location_samples_total", "Location samples by outcome"),
            &["outcome"],
        )
        .expect("valid location_samples_total metric");

        let sample_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "sample_latency_seconds",
                "Latency of location sample processing in seconds",
            ),
            &["outcome"],
        )
        .expect("valid sample_latency_seconds metric");

        let trip_transitions_total = IntCounterVec::new(
            Opts::new("trip_transitions_total", "Trip status transitions by target status"),
            &["to"],
        )
        .expect("valid trip_transitions_total metric");

        let checkpoints_reached_total =
            IntCounter::new("checkpoints_reached_total", "Checkpoints marked as reached")
                .expect("valid checkpoints_reached_total metric");

        let emergency_terminations_total = IntCounterVec::new(
            Opts::new(
                "emergency_terminations_total",
                "Emergency termination requests by outcome",
            ),
            &["outcome"],
        )
        .expect("valid emergency_terminations_total metric");

        let samples_in_queue =
            IntGauge::new("samples_in_queue", "Location samples waiting in the ingest queue")
                .expect("valid samples_in_queue metric");

        registry
            .register(Box::new(location_samples_total.clone()))
            .expect("register location_samples_total");
        registry
            .register(Box::new(sample_latency_seconds.clone()))
            .expect("register sample_latency_seconds");
        registry
            .register(Box::new(trip_transitions_total.clone()))
            .expect("register trip_transitions_total");
        registry
            .register(Box::new(checkpoints_reached_total.clone()))
            .expect("register checkpoints_reached_total");
        registry
            .register(Box::new(emergency_terminations_total.clone()))
            .expect("register emergency_terminations_total");
        registry
            .register(Box::new(samples_in_queue.clone()))
            .expect("register samples_in_queue");

        Self {
            registry,
            location_samples_total,
            sample_latency_seconds,
            trip_transitions_total,
            checkpoints_reached_total,
            emergency_terminations_total,
            samples_in_queue,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
