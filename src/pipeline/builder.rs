use std::sync::Arc;

use crate::{
    config::Config,
    enrollment::EnrollmentProcessor,
    events::Bus,
    store::{EnrollmentStore, MemoryStore},
    subscribers::{Subscribe, SubscriberSet},
};

use super::Pipeline;

/// Builder for constructing a [`Pipeline`] with optional collaborators.
pub struct PipelineBuilder {
    cfg: Config,
    store: Option<Arc<dyn EnrollmentStore>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    bus: Option<Bus>,
}

impl PipelineBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            store: None,
            subscribers: Vec::new(),
            bus: None,
        }
    }

    /// Sets the store the critical section runs against.
    ///
    /// Several pipelines may share one store; course scopes still serialize
    /// across them. Defaults to a fresh [`MemoryStore`].
    pub fn with_store(mut self, store: Arc<dyn EnrollmentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (queueing, outcomes, limit moves)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Publishes onto an existing bus instead of creating one.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Builds the pipeline and spawns its drain loop and fan-out listener.
    ///
    /// Must be called inside a tokio runtime.
    pub fn build(self) -> Arc<Pipeline> {
        let bus = self
            .bus
            .unwrap_or_else(|| Bus::new(self.cfg.bus_capacity_clamped()));
        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));

        let pipeline = Arc::new(Pipeline::new_internal(
            self.cfg,
            bus,
            EnrollmentProcessor::new(store),
        ));
        pipeline.subscriber_listener(subs);
        tokio::spawn(Arc::clone(&pipeline).drain_loop());
        pipeline
    }
}
