use super::{ComputeProvider, ProviderError};
use crate::shared::config::SeedInstance;
use crate::shared::types::{InstanceDescription, InstanceState, StateChange};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct SimulatedInstance {
    state: InstanceState,
    instance_class: Option<String>,
    settles_at: Option<Instant>,
}

impl SimulatedInstance {
    /// Finish an in-flight transition once its delay has elapsed.
    fn settle(&mut self, now: Instant) {
        let Some(at) = self.settles_at else {
            return;
        };
        if now < at {
            return;
        }
        self.state = match self.state {
            InstanceState::Stopping => InstanceState::Stopped,
            InstanceState::Pending => InstanceState::Running,
            InstanceState::ShuttingDown => InstanceState::Terminated,
            other => other,
        };
        self.settles_at = None;
    }
}

/// Simulated compute provider.
///
/// Transitions (stopping, pending) complete after a fixed delay and are
/// observed lazily on the next call, the way a real control API reports them.
#[derive(Clone)]
pub struct InMemoryComputeProvider {
    instances: Arc<Mutex<HashMap<String, SimulatedInstance>>>,
    transition_delay: Duration,
}

impl InMemoryComputeProvider {
    pub fn new(transition_delay: Duration) -> Self {
        Self {
            instances: Arc::new(Mutex::new(HashMap::new())),
            transition_delay,
        }
    }

    pub fn with_seeds(
        transition_delay: Duration,
        seeds: &[SeedInstance],
    ) -> Result<Self, ProviderError> {
        let provider = Self::new(transition_delay);
        for seed in seeds {
            provider.insert(
                &seed.instance_id,
                seed.state,
                seed.instance_class.as_deref(),
            )?;
        }
        Ok(provider)
    }

    /// Add or replace an instance. Transitional states settle after the
    /// configured delay.
    pub fn insert(
        &self,
        instance_id: &str,
        state: InstanceState,
        instance_class: Option<&str>,
    ) -> Result<(), ProviderError> {
        let settles_at = matches!(
            state,
            InstanceState::Stopping | InstanceState::Pending | InstanceState::ShuttingDown
        )
        .then(|| Instant::now() + self.transition_delay);

        self.lock()?.insert(
            instance_id.to_string(),
            SimulatedInstance {
                state,
                instance_class: instance_class.map(ToString::to_string),
                settles_at,
            },
        );
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, SimulatedInstance>>, ProviderError> {
        self.instances
            .lock()
            .map_err(|_| ProviderError::Api("Lock poisoned".to_string()))
    }

    /// Look up an instance with its pending transition applied.
    fn settled<'a>(
        instances: &'a mut HashMap<String, SimulatedInstance>,
        instance_id: &str,
    ) -> Result<&'a mut SimulatedInstance, ProviderError> {
        let instance = instances
            .get_mut(instance_id)
            .ok_or_else(|| ProviderError::NotFound(instance_id.to_string()))?;
        instance.settle(Instant::now());
        Ok(instance)
    }
}

#[async_trait]
impl ComputeProvider for InMemoryComputeProvider {
    async fn start_instance(
        &self,
        instance_id: &str,
    ) -> Result<Option<StateChange>, ProviderError> {
        let mut instances = self.lock()?;
        let instance = Self::settled(&mut instances, instance_id)?;
        let previous = instance.state;

        match previous {
            InstanceState::Running | InstanceState::Pending => {}
            InstanceState::Stopped => {
                instance.state = InstanceState::Pending;
                instance.settles_at = Some(Instant::now() + self.transition_delay);
            }
            state => {
                return Err(ProviderError::IncorrectState {
                    instance_id: instance_id.to_string(),
                    state,
                })
            }
        }

        Ok(Some(StateChange::new(previous, instance.state)))
    }

    async fn stop_instance(&self, instance_id: &str) -> Result<Option<StateChange>, ProviderError> {
        let mut instances = self.lock()?;
        let instance = Self::settled(&mut instances, instance_id)?;
        let previous = instance.state;

        match previous {
            InstanceState::Stopped | InstanceState::Stopping => {}
            InstanceState::Running | InstanceState::Pending => {
                instance.state = InstanceState::Stopping;
                instance.settles_at = Some(Instant::now() + self.transition_delay);
            }
            state => {
                return Err(ProviderError::IncorrectState {
                    instance_id: instance_id.to_string(),
                    state,
                })
            }
        }

        Ok(Some(StateChange::new(previous, instance.state)))
    }

    async fn describe_instance(
        &self,
        instance_id: &str,
    ) -> Result<Option<InstanceDescription>, ProviderError> {
        let mut instances = self.lock()?;
        match Self::settled(&mut instances, instance_id) {
            Ok(instance) => Ok(Some(InstanceDescription {
                instance_id: instance_id.to_string(),
                state: instance.state,
                instance_class: instance.instance_class.clone(),
            })),
            Err(ProviderError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn modify_instance_class(
        &self,
        instance_id: &str,
        instance_class: &str,
    ) -> Result<(), ProviderError> {
        let mut instances = self.lock()?;
        let instance = Self::settled(&mut instances, instance_id)?;

        if instance.state != InstanceState::Stopped {
            return Err(ProviderError::IncorrectState {
                instance_id: instance_id.to_string(),
                state: instance.state,
            });
        }

        instance.instance_class = Some(instance_class.to_string());
        Ok(())
    }
}
