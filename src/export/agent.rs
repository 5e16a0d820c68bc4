//! Periodic driver around one export backend.

use crate::core::{ReporterError, Result};
use crate::export::{ExportConfig, Exporter};
use crate::metrics::MetricReader;
use crate::monitoring::ExportStats;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

struct Shared {
    name: String,
    exporter: tokio::sync::Mutex<Box<dyn Exporter>>,
    reader: Arc<dyn MetricReader>,
    stats: Arc<ExportStats>,
}

struct Driver {
    shutdown: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

/// Drives one [`Exporter`] on its reporting period.
///
/// Export cycles of one agent never overlap: the loop awaits each cycle
/// before the next tick, ticks that fire during a slow cycle are skipped,
/// and every cycle holds the backend lock. `start` builds the periodic
/// driver at most once even when called concurrently. `stop` is idempotent.
pub struct ExporterAgent {
    config: ExportConfig,
    shared: Arc<Shared>,
    driver: OnceCell<Driver>,
    driver_builds: AtomicUsize,
    stopped: AtomicBool,
    // Serialises the stopped check in `start` with the flag flip in `stop`.
    lifecycle: Mutex<()>,
}

impl ExporterAgent {
    /// Agent driving `exporter` over snapshots from `reader`. Nothing runs
    /// until [`start`](Self::start).
    pub fn new(
        exporter: Box<dyn Exporter>,
        config: ExportConfig,
        reader: Arc<dyn MetricReader>,
    ) -> Self {
        let stats = exporter.stats().unwrap_or_else(|| Arc::new(ExportStats::new()));
        Self {
            config,
            shared: Arc::new(Shared {
                name: exporter.name().to_string(),
                exporter: tokio::sync::Mutex::new(exporter),
                reader,
                stats,
            }),
            driver: OnceCell::new(),
            driver_builds: AtomicUsize::new(0),
            stopped: AtomicBool::new(false),
            lifecycle: Mutex::new(()),
        }
    }

    /// Backend name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Filter and period of this agent.
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Counters of this agent and its backend.
    pub fn stats(&self) -> Arc<ExportStats> {
        Arc::clone(&self.shared.stats)
    }

    /// Started and not yet stopped.
    pub fn is_running(&self) -> bool {
        self.driver.get().is_some() && !self.stopped.load(Ordering::Acquire)
    }

    /// How many times the periodic driver has been built (0 or 1).
    pub fn driver_builds(&self) -> usize {
        self.driver_builds.load(Ordering::Acquire)
    }

    /// Start the periodic loop. Later calls are no-ops.
    ///
    /// Must be called from within a tokio runtime. The first export runs
    /// one reporting period after start.
    pub fn start(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock();
        if self.stopped.load(Ordering::Acquire) {
            return Err(ReporterError::AgentStart(format!(
                "exporter '{}' was already stopped",
                self.shared.name
            )));
        }
        self.driver.get_or_try_init(|| self.build_driver())?;
        Ok(())
    }

    fn build_driver(&self) -> Result<Driver> {
        let period = self.config.reporting_period;
        if period.is_zero() {
            return Err(ReporterError::AgentStart(format!(
                "exporter '{}' has a zero reporting period",
                self.shared.name
            )));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ReporterError::AgentStart(format!("no tokio runtime: {e}")))?;

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let shared = Arc::clone(&self.shared);

        let handle = runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let _ = run_cycle(&shared).await;
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
            debug!(exporter = %shared.name, "Export loop finished");
        });

        self.driver_builds.fetch_add(1, Ordering::AcqRel);
        info!(
            exporter = %self.shared.name,
            period = ?period,
            filter = %self.config.include_filter,
            "Exporter agent started"
        );

        Ok(Driver {
            shutdown,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Run one export cycle now, waiting for any cycle already in progress.
    pub async fn export_once(&self) -> Result<()> {
        run_cycle(&self.shared).await
    }

    /// Stop the loop and release the backend. Safe to call repeatedly.
    ///
    /// A cycle already in flight is allowed to finish.
    pub async fn stop(&self) {
        let handle = {
            let _lifecycle = self.lifecycle.lock();
            if self.stopped.swap(true, Ordering::AcqRel) {
                return;
            }
            self.driver.get().and_then(|driver| {
                let _ = driver.shutdown.send(true);
                driver.handle.lock().take()
            })
        };

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(exporter = %self.shared.name, error = %e, "Export loop terminated abnormally");
            }
        }

        self.shared.exporter.lock().await.stop().await;
        let stats = self.shared.stats.snapshot();
        info!(
            exporter = %self.shared.name,
            health = stats.health().as_str(),
            cycles_ok = stats.cycles_ok,
            cycles_failed = stats.cycles_failed,
            "Exporter agent stopped"
        );
    }
}

async fn run_cycle(shared: &Shared) -> Result<()> {
    let mut exporter = shared.exporter.lock().await;
    let metrics = shared.reader.read();

    let result = exporter.export_metrics(&metrics).await;
    shared.stats.record_cycle(result.is_ok());

    match &result {
        Ok(()) => debug!(exporter = %shared.name, metrics = metrics.len(), "Export cycle completed"),
        Err(e) => warn!(
            exporter = %shared.name,
            category = e.category(),
            error = %e,
            "Export cycle failed"
        ),
    }
    result
}
