//! # Supervisor: module registry, parallel lifecycle, routing and escalation.
//!
//! The [`Supervisor`] owns the module registry, the event bus and a
//! [`SubscriberSet`]. It builds modules through an injected
//! [`ModuleFactory`], starts and stops them in parallel on a [`WorkerPool`],
//! routes calls between them by id and turns restart/terminate failures into a
//! [`FatalEscalation`].
//!
//! ## Key responsibilities
//! - load descriptors: factory → `configure` → register (last write wins)
//! - fan out start/stop, one job per module, collecting an aggregate error
//! - route `call_module` only to started modules
//! - restart/terminate with a deadline watchdog; report fatal escalations once
//! - graceful shutdown on OS signals within [`SupervisorConfig::grace`]
//!
//! ## High-level architecture
//! ```text
//! ModulesConfig ──► load(): factory(handle, type, id, queue) ─► configure(params) ─► registry[id]
//!
//! start()/stop():  ops guard held for the whole call
//!   registry entries ──► WorkerPool(len) ──► entry.start()/stop()   (one job per module)
//!                                                 │
//!                              failures ──► SupervisorError::Aggregate([..], [..])
//!
//! restart_module(id):   ─► watchdog(timeout): still not started? ─► escalate
//!                       └► spawn: entry.stop() ─► entry.start()   (any error ─► escalate)
//!
//! terminate(module):    ─► watchdog(timeout): still started? ─► escalate
//!                       └► spawn: stop() all ─► escalate (always)
//!
//! escalate(): first one wins ─► Bus(FatalEscalation) ─► ctx cancelled ─► run() returns Fatal
//!
//! Event flow:
//!   ModuleEntry / Supervisor ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit(&Event)
//!
//! Shutdown path (run):
//!   wait_for_signal() ─► Bus(ShutdownRequested) ─► ctx.cancel()
//!                     ─► stop started modules within grace:
//!                          ├─ in time  → Bus(AllStoppedWithin)
//!                          └─ exceeded → Bus(GraceExceeded), RuntimeError::GraceExceeded
//! ```
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use modvisor::{FactoryRegistry, Module, ModuleRef, Payload, Supervisor, SupervisorConfig};
//!
//! struct Echo(String);
//!
//! #[async_trait::async_trait]
//! impl Module for Echo {
//!     fn id(&self) -> &str { &self.0 }
//!     fn module_type(&self) -> &str { "echo" }
//!     async fn start(&self) -> anyhow::Result<()> { Ok(()) }
//!     async fn stop(&self) -> anyhow::Result<()> { Ok(()) }
//!     async fn handle_message(&self, _kind: i32, _payload: Payload) -> anyhow::Result<()> { Ok(()) }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let factories = FactoryRegistry::new()
//!         .register("echo", |_sup, id, _queue| Ok(Arc::new(Echo(id.to_string())) as ModuleRef));
//!     let sup = Supervisor::builder(SupervisorConfig::default())
//!         .with_factory(factories)
//!         .build();
//!
//!     sup.load_json(r#"{"modules":[{"id":"echo-1","type":"echo"}]}"#).await?;
//!     sup.start().await?;
//!     if let Err(err) = sup.run().await {
//!         std::process::exit(err.exit_code());
//!     }
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::core::{shutdown, SupervisorBuilder, SupervisorConfig, SupervisorHandle};
use crate::error::{panic_message, FatalEscalation, RuntimeError, SupervisorError};
use crate::events::{Bus, Event, EventKind};
use crate::modules::entry::ModuleEntry;
use crate::modules::{ModuleDescriptor, ModuleFactory, ModuleRef, ModulesConfig, Payload};
use crate::pool::WorkerPool;
use crate::subscribers::SubscriberSet;
use crate::tasks::sleep_with_cancel;

#[derive(Clone, Copy, Debug)]
enum Transition {
    Start,
    Stop,
}

impl Transition {
    fn action(self) -> &'static str {
        match self {
            Transition::Start => "start",
            Transition::Stop => "stop",
        }
    }
}

/// Owns the module registry and orchestrates lifecycle, routing and escalation.
///
/// Always handled as `Arc<Supervisor>` (see [`Supervisor::builder`]); modules
/// get a [`SupervisorHandle`] instead.
pub struct Supervisor {
    cfg: SupervisorConfig,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    factory: Arc<dyn ModuleFactory>,
    registry: RwLock<HashMap<String, Arc<ModuleEntry>>>,
    /// Serializes load/start/stop.
    ops: tokio::sync::Mutex<()>,
    /// Process-wide context handed to modules.
    token: CancellationToken,
    /// Stops the subscriber listener when the supervisor is dropped.
    closed: CancellationToken,
    fatal: watch::Sender<Option<FatalEscalation>>,
    me: Weak<Supervisor>,
}

impl Supervisor {
    /// Returns a builder for a supervisor with the given configuration.
    pub fn builder(cfg: SupervisorConfig) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    /// Shortcut for `Supervisor::builder(cfg).with_factory(factory).build()`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<F: ModuleFactory>(cfg: SupervisorConfig, factory: F) -> Arc<Self> {
        Self::builder(cfg).with_factory(factory).build()
    }

    pub(crate) fn new_internal(
        cfg: SupervisorConfig,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        factory: Arc<dyn ModuleFactory>,
    ) -> Arc<Self> {
        let (fatal, _) = watch::channel(None);
        Arc::new_cyclic(|me| Self {
            cfg,
            bus,
            subs,
            factory,
            registry: RwLock::new(HashMap::new()),
            ops: tokio::sync::Mutex::new(()),
            token: CancellationToken::new(),
            closed: CancellationToken::new(),
            fatal,
            me: me.clone(),
        })
    }

    /// Configuration this supervisor was built with.
    pub fn config(&self) -> &SupervisorConfig {
        &self.cfg
    }

    /// A weak handle for modules and other long-lived holders.
    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle::new(self.me.clone())
    }

    /// Process-wide cancellation context, cancelled on shutdown and on fatal escalation.
    pub fn ctx(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Subscribes to the event bus.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Builds, configures and registers every enabled descriptor, in order.
    ///
    /// Returns the loaded ids (duplicates included, in input order). The first
    /// factory or configure failure aborts the load; modules loaded before it
    /// stay registered.
    pub async fn load(
        &self,
        descriptors: Vec<ModuleDescriptor>,
    ) -> Result<Vec<String>, SupervisorError> {
        if descriptors.is_empty() {
            return Err(SupervisorError::EmptyConfiguration);
        }
        let _ops = self.ops.lock().await;

        let mut loaded = Vec::with_capacity(descriptors.len());
        for desc in descriptors {
            if desc.disabled {
                continue;
            }
            let queue_size = self.cfg.queue_size_for(desc.queue_size);
            let module = self
                .factory
                .create(self.handle(), &desc.module_type, &desc.id, queue_size)
                .map_err(|error| SupervisorError::Factory {
                    id: desc.id.clone(),
                    error,
                })?;
            module
                .configure(&desc.params)
                .await
                .map_err(|error| SupervisorError::Config {
                    id: desc.id.clone(),
                    error,
                })?;

            let replaced = self
                .registry
                .write()
                .expect("module registry poisoned")
                .insert(desc.id.clone(), ModuleEntry::new(&desc.id, module));
            if replaced.is_some() {
                warn!(module = %desc.id, "duplicate module id, previous entry replaced");
            }
            self.bus.publish(
                Event::new(EventKind::ModuleLoaded)
                    .with_module(desc.id.as_str())
                    .with_reason(desc.module_type.as_str()),
            );
            loaded.push(desc.id);
        }
        Ok(loaded)
    }

    /// Decodes a JSON modules document and loads it.
    pub async fn load_json(&self, text: &str) -> Result<Vec<String>, SupervisorError> {
        self.load(ModulesConfig::parse(text)?.modules).await
    }

    /// Starts every registered module in parallel.
    ///
    /// Every start is attempted; failures (including `AlreadyStarted`) come
    /// back as one [`SupervisorError::Aggregate`].
    pub async fn start(&self) -> Result<(), SupervisorError> {
        let _ops = self.ops.lock().await;
        self.fan_out(self.entries(), Transition::Start).await
    }

    /// Stops every registered module in parallel.
    ///
    /// Modules that are not started report `AlreadyStopped` in the aggregate.
    /// The process-wide context stays live, so a later [`Supervisor::start`]
    /// hands modules a usable [`Supervisor::ctx`]; [`Supervisor::shutdown`]
    /// is the path that cancels it.
    pub async fn stop(&self) -> Result<(), SupervisorError> {
        let _ops = self.ops.lock().await;
        self.fan_out(self.entries(), Transition::Stop).await
    }

    async fn fan_out(
        &self,
        entries: Vec<Arc<ModuleEntry>>,
        transition: Transition,
    ) -> Result<(), SupervisorError> {
        if entries.is_empty() {
            return Ok(());
        }

        let pool = WorkerPool::with_workers(entries.len(), entries.len());
        let failures = Arc::new(Mutex::new(Vec::new()));

        for entry in entries {
            let id = entry.id().to_string();
            let bus = self.bus.clone();
            let sink = Arc::clone(&failures);
            let job_id = id.clone();
            let job = async move {
                let transit = AssertUnwindSafe(async {
                    match transition {
                        Transition::Start => entry.start(&bus).await,
                        Transition::Stop => entry.stop(&bus).await,
                    }
                });
                let res = transit.catch_unwind().await.unwrap_or_else(|panic| {
                    let error = anyhow::anyhow!("panicked: {}", panic_message(&*panic));
                    bus.publish(Event::module_failed(&job_id, error.to_string()));
                    Err(SupervisorError::Lifecycle {
                        id: job_id,
                        action: transition.action(),
                        error,
                    })
                });
                if let Err(err) = res {
                    sink.lock().expect("failure list poisoned").push(err);
                }
            };
            if let Err(err) = pool.submit(job).await {
                failures
                    .lock()
                    .expect("failure list poisoned")
                    .push(SupervisorError::Lifecycle {
                        id,
                        action: transition.action(),
                        error: err.into(),
                    });
            }
        }
        pool.wait_all().await;
        pool.release().await;

        let failures = std::mem::take(&mut *failures.lock().expect("failure list poisoned"));
        if failures.is_empty() {
            Ok(())
        } else {
            Err(SupervisorError::Aggregate(failures))
        }
    }

    /// Routes a message to the started module `id`.
    ///
    /// `handle_message` is never invoked on a module that is not started.
    pub async fn call_module(
        &self,
        id: &str,
        kind: i32,
        payload: Payload,
    ) -> Result<(), SupervisorError> {
        let entry = self
            .entry(id)
            .ok_or_else(|| SupervisorError::NotFound { id: id.to_string() })?;
        if !entry.is_started() {
            return Err(SupervisorError::NotStarted { id: id.to_string() });
        }
        entry
            .module()
            .handle_message(kind, payload)
            .await
            .map_err(|error| SupervisorError::Handler {
                id: id.to_string(),
                error,
            })
    }

    /// Stops then starts module `id` in the background.
    ///
    /// Returns once the restart is scheduled. A failure of either step
    /// escalates, and so does the module not being started when `timeout`
    /// (counted from now) elapses. Fails only when `id` is unknown.
    pub fn restart_module(
        &self,
        id: &str,
        reason: &str,
        timeout: Duration,
    ) -> Result<(), SupervisorError> {
        warn!(module = %id, reason = %reason, "module requested a restart");
        let Some(entry) = self.entry(id) else {
            error!(module = %id, "restart requested for unknown module");
            return Err(SupervisorError::NotFound { id: id.to_string() });
        };
        self.bus.publish(
            Event::new(EventKind::RestartRequested)
                .with_module(id)
                .with_reason(reason)
                .with_timeout(timeout),
        );

        self.arm_watchdog(id, timeout, true);

        let me = self.me.clone();
        let bus = self.bus.clone();
        tokio::spawn(async move {
            let failure = match entry.stop(&bus).await {
                Err(err) => Some(err),
                Ok(()) => entry.start(&bus).await.err(),
            };
            if let (Some(err), Some(sup)) = (failure, me.upgrade()) {
                sup.escalate(Some(entry.id()), format!("restart failed: {err}"));
            }
        });
        Ok(())
    }

    /// Stops every module in the background, then escalates.
    ///
    /// Always fatal: the escalation reason tells whether all stops succeeded.
    /// The watchdog escalates earlier if `module` is still started after `timeout`.
    pub fn terminate(&self, module: &str, reason: &str, timeout: Duration) {
        error!(module = %module, reason = %reason, "module requested a stop");
        self.bus.publish(
            Event::new(EventKind::TerminateRequested)
                .with_module(module)
                .with_reason(reason)
                .with_timeout(timeout),
        );

        self.arm_watchdog(module, timeout, false);

        let me = self.me.clone();
        let module = module.to_string();
        tokio::spawn(async move {
            let Some(sup) = me.upgrade() else {
                return;
            };
            let reason = match sup.stop().await {
                Ok(()) => "all modules stopped correctly".to_string(),
                Err(err) => format!("some modules stop failed: {err}"),
            };
            sup.escalate(Some(&module), reason);
        });
    }

    /// After `timeout`, escalates unless module `id` is in the expected state.
    ///
    /// Disarmed when the process-wide context is cancelled first.
    fn arm_watchdog(&self, id: &str, timeout: Duration, expect_started: bool) {
        let me = self.me.clone();
        let token = self.token.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            if !sleep_with_cancel(&token, timeout).await {
                return;
            }
            let Some(sup) = me.upgrade() else {
                return;
            };
            if sup.is_started(&id) != expect_started {
                let phase = if expect_started { "restarting" } else { "stopping" };
                sup.escalate(Some(&id), format!("timeout {timeout:?} reached while {phase}"));
            }
        });
    }

    /// Reports a fatal condition.
    ///
    /// Only the first escalation is recorded and published; it cancels the
    /// process-wide context and ends [`Supervisor::run`].
    pub fn escalate(&self, module: Option<&str>, reason: impl Into<String>) {
        let fatal = FatalEscalation::new(module, reason);
        let recorded = self.fatal.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(fatal.clone());
            true
        });
        if !recorded {
            return;
        }

        error!(module = ?fatal.module, reason = %fatal.reason, "fatal escalation");
        let mut ev = Event::new(EventKind::FatalEscalation).with_reason(fatal.reason.as_str());
        if let Some(m) = fatal.module.as_deref() {
            ev = ev.with_module(m);
        }
        self.bus.publish(ev);
        self.token.cancel();
    }

    /// The recorded escalation, if any.
    pub fn fatal(&self) -> Option<FatalEscalation> {
        self.fatal.borrow().clone()
    }

    /// Resolves with the first fatal escalation.
    pub async fn wait_fatal(&self) -> FatalEscalation {
        let mut rx = self.fatal.subscribe();
        loop {
            if let Some(fatal) = rx.borrow_and_update().clone() {
                return fatal;
            }
            if rx.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }

    /// Runs until an OS termination signal or a fatal escalation.
    ///
    /// - signal → [`Supervisor::shutdown`]
    /// - escalation → `Err(RuntimeError::Fatal)`; the caller should exit the process
    pub async fn run(&self) -> Result<(), RuntimeError> {
        tokio::select! {
            biased;
            fatal = self.wait_fatal() => Err(RuntimeError::Fatal(fatal)),
            signal = shutdown::wait_for_signal() => {
                let signal = signal?;
                info!(signal, "shutdown requested");
                self.shutdown().await
            }
        }
    }

    /// Cancels the process-wide context and stops every started module within the grace period.
    ///
    /// Publishes [`EventKind::AllStoppedWithin`] on success, or
    /// [`EventKind::GraceExceeded`] and returns [`RuntimeError::GraceExceeded`]
    /// listing the modules still started.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.token.cancel();

        let grace = self.cfg.grace;
        let drain = async {
            let _ops = self.ops.lock().await;
            let started = self.entries().into_iter().filter(|e| e.is_started()).collect();
            self.fan_out(started, Transition::Stop).await
        };

        match tokio::time::timeout(grace, drain).await {
            Ok(res) => {
                if let Err(err) = res {
                    warn!(error = %err, "some modules failed to stop");
                }
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                self.bus.publish(Event::new(EventKind::GraceExceeded));
                Err(RuntimeError::GraceExceeded {
                    grace,
                    stuck: self.started_ids(),
                })
            }
        }
    }

    /// True when module `id` is registered and started.
    pub fn is_started(&self, id: &str) -> bool {
        self.entry(id).is_some_and(|e| e.is_started())
    }

    /// The registered module `id`.
    pub fn module(&self, id: &str) -> Option<ModuleRef> {
        self.entry(id).map(|e| Arc::clone(e.module()))
    }

    /// Sorted ids of every registered module.
    pub fn module_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .registry
            .read()
            .expect("module registry poisoned")
            .keys()
            .cloned()
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Sorted ids of the modules currently started.
    pub fn started_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .entries()
            .iter()
            .filter(|e| e.is_started())
            .map(|e| e.id().to_string())
            .collect();
        ids.sort_unstable();
        ids
    }

    fn entry(&self, id: &str) -> Option<Arc<ModuleEntry>> {
        self.registry
            .read()
            .expect("module registry poisoned")
            .get(id)
            .cloned()
    }

    fn entries(&self) -> Vec<Arc<ModuleEntry>> {
        self.registry
            .read()
            .expect("module registry poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Forwards bus events to the subscriber set until the supervisor is dropped.
    pub(crate) fn subscriber_listener(&self) {
        if self.subs.is_empty() {
            return;
        }
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        let closed = self.closed.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    ev = rx.recv() => match ev {
                        Ok(ev) => set.emit(&ev),
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = closed.cancelled() => break,
                }
            }
        });
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}
