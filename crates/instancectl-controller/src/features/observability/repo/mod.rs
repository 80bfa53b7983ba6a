use prometheus::{
    opts, Encoder, Gauge, HistogramOpts, HistogramVec, IntCounterVec, Registry, TextEncoder,
};

pub struct ObservabilityRepository {
    registry: Registry,
    operation_total: IntCounterVec,
    operation_latency_seconds: HistogramVec,
    active_operations: Gauge,
}

impl ObservabilityRepository {
    pub fn new() -> Result<Self, String> {
        let registry = Registry::new();

        let operation_total = IntCounterVec::new(
            opts!(
                "instancectl_operation_total",
                "Lifecycle operations handled, by action and outcome"
            ),
            &["action", "outcome"],
        )
        .map_err(|e| e.to_string())?;
        let operation_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "instancectl_operation_latency_seconds",
                "Wall-clock duration of lifecycle operations (seconds)",
            )
            .buckets(vec![0.05, 0.25, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
            &["action"],
        )
        .map_err(|e| e.to_string())?;
        let active_operations = Gauge::with_opts(opts!(
            "instancectl_active_operations",
            "Lifecycle operations currently in flight"
        ))
        .map_err(|e| e.to_string())?;

        registry
            .register(Box::new(operation_total.clone()))
            .map_err(|e| e.to_string())?;
        registry
            .register(Box::new(operation_latency_seconds.clone()))
            .map_err(|e| e.to_string())?;
        registry
            .register(Box::new(active_operations.clone()))
            .map_err(|e| e.to_string())?;

        Ok(Self {
            registry,
            operation_total,
            operation_latency_seconds,
            active_operations,
        })
    }

    pub fn observe_operation(&self, action: &str, outcome: &str, seconds: f64) {
        self.operation_total
            .with_label_values(&[action, outcome])
            .inc();
        self.operation_latency_seconds
            .with_label_values(&[action])
            .observe(seconds);
    }

    pub fn inc_active_operations(&self) {
        self.active_operations.inc();
    }

    pub fn dec_active_operations(&self) {
        self.active_operations.dec();
    }

    pub fn operation_count(&self, action: &str, outcome: &str) -> u64 {
        self.operation_total
            .with_label_values(&[action, outcome])
            .get()
    }

    pub fn render_metrics(&self) -> Result<String, String> {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        encoder
            .encode(&families, &mut buffer)
            .map_err(|e| e.to_string())?;
        String::from_utf8(buffer).map_err(|e| e.to_string())
    }
}
