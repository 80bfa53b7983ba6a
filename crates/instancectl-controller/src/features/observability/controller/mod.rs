use crate::features::observability::repo::ObservabilityRepository;
use crate::features::observability::service::ObservabilityService;
use std::sync::Arc;

/// Owns the metrics registry for one controller process.
///
/// Constructed explicitly and handed to whoever records metrics.
pub struct ObservabilityController {
    service: ObservabilityService,
}

impl ObservabilityController {
    pub fn new(service: ObservabilityService) -> Self {
        Self { service }
    }

    pub fn try_default() -> Result<Self, String> {
        let repo = Arc::new(ObservabilityRepository::new()?);
        Ok(Self::new(ObservabilityService::new(repo)))
    }

    pub fn record_operation(&self, action: &str, outcome: &str, seconds: f64) {
        self.service.record_operation(action, outcome, seconds);
    }

    pub fn operation_started(&self) {
        self.service.operation_started();
    }

    pub fn operation_finished(&self) {
        self.service.operation_finished();
    }

    pub fn operation_count(&self, action: &str, outcome: &str) -> u64 {
        self.service.operation_count(action, outcome)
    }

    pub fn render_metrics(&self) -> Result<String, String> {
        self.service.render_metrics()
    }
}
