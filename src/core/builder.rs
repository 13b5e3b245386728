use std::sync::Arc;

use crate::{
    core::SupervisorConfig,
    core::SupervisorHandle,
    events::Bus,
    modules::{FactoryRegistry, ModuleFactory, ModuleRef},
    subscribers::{Subscribe, SubscriberSet},
};
use super::supervisor::Supervisor;

/// Builder for constructing a [`Supervisor`].
pub struct SupervisorBuilder {
    cfg: SupervisorConfig,
    factory: Option<Arc<dyn ModuleFactory>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: SupervisorConfig) -> Self {
        Self {
            cfg,
            factory: None,
            subscribers: Vec::new(),
        }
    }

    /// Sets the factory used to build modules from descriptors.
    ///
    /// Without one, every descriptor fails with a factory error.
    pub fn with_factory<F: ModuleFactory>(mut self, factory: F) -> Self {
        self.factory = Some(Arc::new(factory));
        self
    }

    /// Sets a closure factory: `(handle, module_type, id, queue_size)`.
    pub fn with_factory_fn<F>(self, factory: F) -> Self
    where
        F: Fn(SupervisorHandle, &str, &str, usize) -> anyhow::Result<ModuleRef>
            + Send
            + Sync
            + 'static,
    {
        self.with_factory(factory)
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive lifecycle and escalation events through dedicated
    /// workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the supervisor and starts forwarding bus events to subscribers.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Arc<Supervisor> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        let factory = self
            .factory
            .unwrap_or_else(|| Arc::new(FactoryRegistry::new()));

        let sup = Supervisor::new_internal(self.cfg, bus, subs, factory);
        sup.subscriber_listener();
        sup
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, EventKind};
    use crate::modules::ModuleDescriptor;
    use crate::SupervisorError;
    use std::sync::Mutex;
    use std::time::Duration;

    struct Recorder(Mutex<Vec<EventKind>>);

    #[async_trait::async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, ev: &Event) {
            self.0.lock().unwrap().push(ev.kind);
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    #[tokio::test]
    async fn default_factory_rejects_every_type() {
        let sup = SupervisorBuilder::new(SupervisorConfig::default()).build();
        let err = sup
            .load(vec![ModuleDescriptor::new("a", "anything")])
            .await
            .unwrap_err();
        assert!(matches!(err, SupervisorError::Factory { .. }));
        assert!(err.to_string().contains("creation of module a failed"));
    }

    #[tokio::test]
    async fn subscribers_receive_bus_events() {
        let rec = Arc::new(Recorder(Mutex::new(Vec::new())));
        let sup = SupervisorBuilder::new(SupervisorConfig::default())
            .with_subscribers(vec![rec.clone()])
            .build();

        sup.escalate(None, "boom");
        tokio::time::timeout(Duration::from_secs(1), async {
            while rec.0.lock().unwrap().is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(rec.0.lock().unwrap().as_slice(), &[EventKind::FatalEscalation]);
    }
}
