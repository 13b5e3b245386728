//! # Ticker → echo demo
//!
//! Two module types:
//! - `ticker` sends a numbered message to its `target` every `period_ms` and
//!   asks for its own restart every `restart_every` ticks;
//! - `echo` logs every message it receives, on its own bounded executor.
//!
//! Run with `cargo run --example echo --features logging [config.json]`, stop
//! with Ctrl-C. A fatal escalation exits the process with a non-zero code.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use modvisor::util::load_modules_config;
use modvisor::{
    init_tracing, CancellableTask, FactoryRegistry, LogWriter, Module, ModuleRef, ModulesConfig,
    Payload, Subscribe, Supervisor, SupervisorConfig, SupervisorHandle, TaskExecutor,
};

const DEFAULT_MODULES: &str = r#"{
  "modules": [
    { "id": "echo",   "type": "echo",   "tasks_queue_size": 16 },
    { "id": "ticker", "type": "ticker", "params": { "period_ms": 500, "target": "echo", "restart_every": 10 } },
    { "id": "spare",  "type": "ticker", "disable": true }
  ]
}"#;

#[derive(Clone, Debug, Deserialize)]
struct TickerParams {
    #[serde(default = "default_period")]
    period_ms: u64,
    target: String,
    #[serde(default)]
    restart_every: u64,
}

fn default_period() -> u64 {
    1000
}

struct Ticker {
    id: String,
    sup: SupervisorHandle,
    params: Mutex<Option<TickerParams>>,
    task: Mutex<Option<CancellableTask>>,
}

#[async_trait]
impl Module for Ticker {
    fn id(&self) -> &str {
        &self.id
    }

    fn module_type(&self) -> &str {
        "ticker"
    }

    async fn configure(&self, params: &Value) -> anyhow::Result<()> {
        let parsed: TickerParams = serde_json::from_value(params.clone())?;
        *self.params.lock().expect("ticker params poisoned") = Some(parsed);
        Ok(())
    }

    async fn start(&self) -> anyhow::Result<()> {
        let params = self
            .params
            .lock()
            .expect("ticker params poisoned")
            .clone()
            .ok_or_else(|| anyhow::anyhow!("ticker {} is not configured", self.id))?;
        let sup = self.sup.clone();
        let id = self.id.clone();

        let task = CancellableTask::new(move |cancel| async move {
            let mut n: u64 = 0;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(Duration::from_millis(params.period_ms)) => {}
                }
                n += 1;
                let msg = format!("tick {n} from {id}");
                if let Err(err) = sup.call_module(&params.target, 1, Box::new(msg)).await {
                    tracing::warn!(module = %id, error = %err, "tick not delivered");
                }
                if params.restart_every > 0 && n % params.restart_every == 0 {
                    if let Err(err) = sup.restart(&id, "tick budget spent") {
                        tracing::warn!(module = %id, error = %err, "restart not scheduled");
                    }
                }
            }
        });
        task.execute();
        *self.task.lock().expect("ticker task poisoned") = Some(task);
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        let task = self.task.lock().expect("ticker task poisoned").take();
        if let Some(task) = task {
            task.request_cancellation_and_wait().await;
        }
        Ok(())
    }

    async fn handle_message(&self, kind: i32, _payload: Payload) -> anyhow::Result<()> {
        anyhow::bail!("ticker does not accept messages (kind {kind})")
    }
}

struct Echo {
    id: String,
    queue_size: usize,
    executor: Mutex<Option<Arc<TaskExecutor>>>,
}

#[async_trait]
impl Module for Echo {
    fn id(&self) -> &str {
        &self.id
    }

    fn module_type(&self) -> &str {
        "echo"
    }

    async fn start(&self) -> anyhow::Result<()> {
        let id = self.id.clone();
        let executor = TaskExecutor::new(self.queue_size).with_monitor(
            Duration::from_secs(5),
            move |pct| tracing::debug!(module = %id, occupancy = pct, "echo queue"),
        );
        executor.run();
        *self.executor.lock().expect("echo executor poisoned") = Some(Arc::new(executor));
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        let executor = self.executor.lock().expect("echo executor poisoned").take();
        if let Some(executor) = executor {
            executor.terminate_and_wait().await;
        }
        Ok(())
    }

    async fn handle_message(&self, kind: i32, payload: Payload) -> anyhow::Result<()> {
        let text = payload
            .downcast::<String>()
            .map_err(|_| anyhow::anyhow!("echo expects a String payload"))?;
        let executor = self
            .executor
            .lock()
            .expect("echo executor poisoned")
            .clone()
            .ok_or_else(|| anyhow::anyhow!("echo {} has no executor", self.id))?;

        let id = self.id.clone();
        executor.submit("echo", async move {
            tracing::info!(module = %id, kind, text = %text, "echo");
        })?;
        Ok(())
    }
}

fn factories() -> FactoryRegistry {
    FactoryRegistry::new()
        .register("ticker", |sup, id, _queue| {
            Ok(Arc::new(Ticker {
                id: id.to_string(),
                sup,
                params: Mutex::new(None),
                task: Mutex::new(None),
            }) as ModuleRef)
        })
        .register("echo", |_sup, id, queue| {
            Ok(Arc::new(Echo {
                id: id.to_string(),
                queue_size: queue,
                executor: Mutex::new(None),
            }) as ModuleRef)
        })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let modules = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => load_modules_config(Some(&path))?,
        None => ModulesConfig::parse(DEFAULT_MODULES)?,
    };

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let sup = Supervisor::builder(SupervisorConfig::default())
        .with_factory(factories())
        .with_subscribers(subs)
        .build();

    let ids = sup.load(modules.modules).await?;
    tracing::info!(modules = ?ids, "modules loaded");
    sup.start().await?;

    if let Err(err) = sup.run().await {
        tracing::error!(error = %err, label = err.as_label(), "supervisor stopped");
        std::process::exit(err.exit_code());
    }
    Ok(())
}
