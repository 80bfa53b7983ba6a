use crate::features::observability::repo::ObservabilityRepository;
use std::sync::Arc;

pub struct ObservabilityService {
    repo: Arc<ObservabilityRepository>,
}

impl ObservabilityService {
    pub fn new(repo: Arc<ObservabilityRepository>) -> Self {
        Self { repo }
    }

    pub fn record_operation(&self, action: &str, outcome: &str, seconds: f64) {
        self.repo.observe_operation(action, outcome, seconds);
    }

    pub fn operation_started(&self) {
        self.repo.inc_active_operations();
    }

    pub fn operation_finished(&self) {
        self.repo.dec_active_operations();
    }

    pub fn operation_count(&self, action: &str, outcome: &str) -> u64 {
        self.repo.operation_count(action, outcome)
    }

    pub fn render_metrics(&self) -> Result<String, String> {
        self.repo.render_metrics()
    }
}
