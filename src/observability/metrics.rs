use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub order_transitions_total: IntCounterVec,
    pub transition_latency_seconds: HistogramVec,
    pub qr_scans_total: IntCounterVec,
    pub photo_uploads_total: IntCounterVec,
    pub active_sessions: IntGauge,
    pub feed_notifications_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let order_transitions_total = IntCounterVec::new(
            Opts::new(
                "order_transitions_total",
                "Order status transition attempts by target status and outcome",
            ),
            &["target", "outcome"],
        )
        .expect("valid order_transitions_total metric");

        let transition_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "transition_latency_seconds",
                "Time from request to committed status change in seconds",
            ),
            &["target"],
        )
        .expect("valid transition_latency_seconds metric");

        let qr_scans_total = IntCounterVec::new(
            Opts::new("qr_scans_total", "QR scans by outcome"),
            &["outcome"],
        )
        .expect("valid qr_scans_total metric");

        let photo_uploads_total = IntCounterVec::new(
            Opts::new("photo_uploads_total", "Photo evidence handling by outcome"),
            &["outcome"],
        )
        .expect("valid photo_uploads_total metric");

        let active_sessions = IntGauge::new("active_sessions", "Signed-in driver sessions")
            .expect("valid active_sessions metric");

        let feed_notifications_total = IntCounter::new(
            "feed_notifications_total",
            "Change notifications pushed to websocket clients",
        )
        .expect("valid feed_notifications_total metric");

        registry
            .register(Box::new(order_transitions_total.clone()))
            .expect("register order_transitions_total");
        registry
            .register(Box::new(transition_latency_seconds.clone()))
            .expect("register transition_latency_seconds");
        registry
            .register(Box::new(qr_scans_total.clone()))
            .expect("register qr_scans_total");
        registry
            .register(Box::new(photo_uploads_total.clone()))
            .expect("register photo_uploads_total");
        registry
            .register(Box::new(active_sessions.clone()))
            .expect("register active_sessions");
        registry
            .register(Box::new(feed_notifications_total.clone()))
            .expect("register feed_notifications_total");

        Self {
            registry,
            order_transitions_total,
            transition_latency_seconds,
            qr_scans_total,
            photo_uploads_total,
            active_sessions,
            feed_notifications_total,
        }
    }

    pub fn record_transition(&self, target: &str, outcome: &str) {
        self.order_transitions_total
            .with_label_values(&[target, outcome])
            .inc();
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
