//! Top-level orchestration: collectors on one period, exporter agents on
//! their own.

use crate::collect::Collector;
use crate::core::{Config, ReporterError, Result};
use crate::export::{ExportConfig, Exporter, ExporterAgent};
use crate::metrics::{MetricReader, Registry, View};
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

/// Periods of a reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReporterConfig {
    /// Interval between collector refreshes.
    pub collect_period: Duration,
    /// Reporting period for exporters configured without one.
    pub reporting_period: Duration,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            collect_period: Duration::from_secs(10),
            reporting_period: Duration::from_secs(60),
        }
    }
}

impl From<&Config> for ReporterConfig {
    fn from(config: &Config) -> Self {
        Self {
            collect_period: config.collect_period,
            reporting_period: config.reporting_period,
        }
    }
}

/// Collects views, collectors and exporters before anything runs.
pub struct ReporterBuilder {
    config: ReporterConfig,
    registry: Arc<Registry>,
    views: Vec<View>,
    collectors: Vec<Box<dyn Collector>>,
    exporters: Vec<(Box<dyn Exporter>, ExportConfig)>,
}

impl ReporterBuilder {
    /// Empty builder with a fresh registry.
    pub fn new(config: ReporterConfig) -> Self {
        Self {
            config,
            registry: Arc::new(Registry::new()),
            views: Vec::new(),
            collectors: Vec::new(),
            exporters: Vec::new(),
        }
    }

    /// Use an existing registry instead of a fresh one.
    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = registry;
        self
    }

    /// Register `view` at start, in addition to the collectors' own views.
    pub fn view(mut self, view: View) -> Self {
        self.views.push(view);
        self
    }

    /// Refresh `collector` on every collect period.
    pub fn collector(mut self, collector: Box<dyn Collector>) -> Self {
        self.collectors.push(collector);
        self
    }

    /// Add an exporter. A zero reporting period inherits the reporter's.
    pub fn exporter(mut self, exporter: Box<dyn Exporter>, config: ExportConfig) -> Self {
        self.exporters.push((exporter, config));
        self
    }

    /// Register every view, start every agent, then start collecting.
    ///
    /// If an agent fails to start, the agents already started are stopped
    /// and the error is returned.
    pub async fn start(self) -> Result<Reporter> {
        let Self {
            config,
            registry,
            views,
            collectors,
            exporters,
        } = self;

        if config.collect_period.is_zero() {
            return Err(ReporterError::config("collect period must be non-zero"));
        }

        for view in views.into_iter().chain(collectors.iter().flat_map(|c| c.views())) {
            registry.register(view)?;
        }

        let reader: Arc<dyn MetricReader> = registry.clone();
        let mut agents: Vec<ExporterAgent> = Vec::with_capacity(exporters.len());
        for (exporter, mut export_config) in exporters {
            if export_config.reporting_period.is_zero() {
                export_config.reporting_period = config.reporting_period;
            }

            let agent = ExporterAgent::new(exporter, export_config, Arc::clone(&reader));
            if let Err(e) = agent.start() {
                error!(exporter = agent.name(), error = %e, "Failed to start exporter agent");
                agent.stop().await;
                join_all(agents.iter().map(ExporterAgent::stop)).await;
                return Err(e);
            }
            agents.push(agent);
        }
        let agents: Arc<[ExporterAgent]> = agents.into();

        let (shutdown, shutdown_rx) = watch::channel(false);
        let (state_tx, state) = watch::channel(State::Collecting);
        let collect_handle = tokio::spawn(collect_loop(
            collectors,
            Arc::clone(&registry),
            config.collect_period,
            shutdown_rx,
        ));
        let supervisor = tokio::spawn(supervise(collect_handle, Arc::clone(&agents), state_tx));

        info!(
            collect_period = ?config.collect_period,
            reporting_period = ?config.reporting_period,
            exporters = agents.len(),
            views = registry.view_names().len(),
            "Reporter started"
        );

        Ok(Reporter {
            config,
            registry,
            agents,
            shutdown,
            state,
            supervisor: Mutex::new(Some(supervisor)),
            stopped: AtomicBool::new(false),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Collecting,
    Stopped,
    Failed(String),
}

async fn collect_loop(
    mut collectors: Vec<Box<dyn Collector>>,
    registry: Arc<Registry>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for collector in collectors.iter_mut() {
                    collector.collect(&registry);
                }
                debug!(collectors = collectors.len(), "Collection pass finished");
            }
            _ = shutdown.changed() => break,
        }
    }
}

/// Waits for the collection loop. If it dies, every agent is stopped so the
/// reporter fails as a whole instead of exporting a frozen snapshot.
async fn supervise(
    collect: JoinHandle<()>,
    agents: Arc<[ExporterAgent]>,
    state: watch::Sender<State>,
) {
    let outcome = match collect.await {
        Ok(()) => State::Stopped,
        Err(e) => {
            let reason = if e.is_panic() {
                "collector panicked".to_string()
            } else {
                format!("collection loop terminated: {e}")
            };
            error!(%reason, "Collection loop died, stopping every exporter");
            join_all(agents.iter().map(ExporterAgent::stop)).await;
            State::Failed(reason)
        },
    };
    state.send_replace(outcome);
}

/// Running reporter. Dropping it does not stop anything; call [`Reporter::stop`].
///
/// A panic in any collector is fatal: the collection loop dies, every agent
/// is stopped and [`Reporter::closed`] resolves with an error.
pub struct Reporter {
    config: ReporterConfig,
    registry: Arc<Registry>,
    agents: Arc<[ExporterAgent]>,
    shutdown: watch::Sender<bool>,
    state: watch::Receiver<State>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl Reporter {
    /// Start configuring a reporter.
    pub fn builder(config: ReporterConfig) -> ReporterBuilder {
        ReporterBuilder::new(config)
    }

    /// Periods the reporter was started with.
    pub fn config(&self) -> &ReporterConfig {
        &self.config
    }

    /// Registry the collectors record into and the agents read from.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// One agent per configured exporter, in configuration order.
    pub fn agents(&self) -> &[ExporterAgent] {
        &self.agents
    }

    /// False once the collection loop has exited, including by a collector panic.
    pub fn is_collecting(&self) -> bool {
        *self.state.borrow() == State::Collecting
    }

    /// True if a collector failure brought the reporter down.
    pub fn has_failed(&self) -> bool {
        matches!(*self.state.borrow(), State::Failed(_))
    }

    /// Resolves once the reporter is no longer collecting.
    ///
    /// Returns [`ReporterError::Collector`] if a collector failure caused
    /// it, by which time every agent has already been stopped.
    pub async fn closed(&self) -> Result<()> {
        let mut state = self.state.clone();
        let current = match state.wait_for(|s| *s != State::Collecting).await {
            Ok(s) => (*s).clone(),
            Err(_) => State::Stopped,
        };
        match current {
            State::Failed(reason) => Err(ReporterError::Collector(reason)),
            _ => Ok(()),
        }
    }

    /// Stop collecting and stop every agent. Idempotent.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        let _ = self.shutdown.send(true);
        let handle = self.supervisor.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Reporter supervisor terminated abnormally");
            }
        }

        join_all(self.agents.iter().map(ExporterAgent::stop)).await;
        info!("Reporter stopped");
    }
}
