//! Module orchestration -- assembly, wiring, and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `docktrap-daemon`.
//! It loads configuration, seeds the emulation store, spawns the sensor
//! HTTP surface, starts the console consumer, schedules the optional IOC
//! export task, and manages graceful shutdown.
//!
//! # Startup order (producers before consumers)
//!
//! 1. Resource store seed (identity + default resources)
//! 2. Sensor HTTP surface (produces CapturedRequests)
//! 3. Console consumer (consumes CapturedRequests)
//! 4. Periodic IOC export (re-reads historical CapturedRequests)

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use docktrap_analyzer::{ConsoleConsumer, ConsoleConsumerBuilder, IocExporter, TracingIndicatorSink};
use docktrap_core::capture::{MemoryRequestLog, RequestLog};
use docktrap_core::config::DocktrapConfig;
use docktrap_core::metrics as m;
use docktrap_core::pipeline::Pipeline;
use docktrap_emulation::{EmulationConfig, EmulationResponder, ResourceStore};

use crate::metrics_server;
use crate::server::{self, SensorState};

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: DocktrapConfig,
    /// Append-only capture log shared by sensor and consumers.
    log: Arc<MemoryRequestLog>,
    /// The emulation surface.
    responder: Arc<EmulationResponder>,
    /// Live console consumer (None when disabled).
    console: Option<ConsoleConsumer>,
    /// Shutdown broadcast sender (signals all background tasks).
    shutdown_tx: broadcast::Sender<()>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
    /// Background task handles (export, uptime).
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl Orchestrator {
    /// Load configuration from disk and build the orchestrator.
    #[allow(dead_code)] // Public API for tests
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = DocktrapConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config)
    }

    /// Build from an already-loaded configuration.
    pub fn build_from_config(config: DocktrapConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        // Install metrics recorder before any module records a metric.
        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            record_build_info();
        }

        let emulation_config = EmulationConfig::from_core(&config.sensor);
        emulation_config
            .validate()
            .map_err(|e| anyhow::anyhow!("emulation config invalid: {}", e))?;

        info!(sensor_id = %config.sensor.id, "seeding emulation store");
        let store = ResourceStore::new(&config.sensor.id);
        if emulation_config.seed_defaults {
            store.seed_defaults();
        }

        let log = Arc::new(MemoryRequestLog::with_capacity(
            config.sensor.capture_capacity,
        ));
        let responder = Arc::new(EmulationResponder::new(store, emulation_config));

        let console = if config.console.enabled {
            let consumer = ConsoleConsumerBuilder::new()
                .request_log(Arc::clone(&log) as Arc<dyn RequestLog>)
                .build()
                .map_err(|e| anyhow::anyhow!("failed to build console consumer: {}", e))?;
            Some(consumer)
        } else {
            debug!("console consumer disabled");
            None
        };

        let (shutdown_tx, _) = broadcast::channel(16);

        Ok(Self {
            config,
            log,
            responder,
            console,
            shutdown_tx,
            start_time: Instant::now(),
            tasks: Vec::new(),
        })
    }

    /// Get a reference to the loaded configuration.
    #[allow(dead_code)] // Public API for introspection
    pub fn config(&self) -> &DocktrapConfig {
        &self.config
    }

    /// Returns whether the console consumer is wired.
    pub fn console_enabled(&self) -> bool {
        self.console.is_some()
    }

    /// Start all modules and block until a shutdown signal is received.
    pub async fn run(&mut self) -> Result<()> {
        let addr: SocketAddr = format!(
            "{}:{}",
            self.config.sensor.listen_addr, self.config.sensor.port
        )
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid sensor listen address: {}", e))?;
        let listener = TcpListener::bind(addr).await?;
        info!(listen_addr = %addr, sensor_id = %self.config.sensor.id, "sensor surface listening");

        let state = SensorState {
            responder: Arc::clone(&self.responder),
            log: Arc::clone(&self.log) as Arc<dyn RequestLog>,
            sensor_id: self.config.sensor.id.clone(),
        };
        let server_task = tokio::spawn(server::serve(
            listener,
            state,
            self.shutdown_tx.subscribe(),
        ));

        if let Some(console) = self.console.as_mut() {
            console
                .start()
                .await
                .map_err(|e| anyhow::anyhow!("failed to start console consumer: {}", e))?;
        }

        if self.config.export.enabled {
            self.tasks.push(spawn_export_task(
                Arc::clone(&self.log) as Arc<dyn RequestLog>,
                self.config.sensor.id.clone(),
                Duration::from_secs(self.config.export.interval_secs),
                Duration::from_secs(self.config.export.window_secs),
                self.shutdown_tx.subscribe(),
            ));
        }

        if self.config.metrics.enabled {
            self.tasks.push(spawn_uptime_updater(
                self.start_time,
                self.shutdown_tx.subscribe(),
            ));
        }

        info!("entering main event loop");
        let signal = wait_for_shutdown_signal().await?;
        info!(signal, "shutdown signal received");

        self.shutdown().await;

        // Give the HTTP surface a bounded window to drain in-flight clients.
        match tokio::time::timeout(Duration::from_secs(5), server_task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(err))) => warn!(error = %err, "sensor surface exited with error"),
            Ok(Err(join_err)) => warn!(error = %join_err, "sensor surface task panicked"),
            Err(_) => warn!("sensor surface did not drain within timeout"),
        }

        info!("docktrap-daemon shut down");
        Ok(())
    }

    /// Broadcast shutdown and stop modules, consumers last.
    async fn shutdown(&mut self) {
        info!("broadcasting shutdown signal to all tasks");
        let _ = self.shutdown_tx.send(());

        for task in self.tasks.drain(..) {
            task.abort();
            let _ = task.await;
        }

        if let Some(console) = self.console.as_mut()
            && let Err(err) = console.stop().await
        {
            warn!(error = %err, "failed to stop console consumer");
        }
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Spawn the periodic IOC export task.
///
/// Each tick re-reads the trailing window of captured requests and pushes
/// deduplicated indicators through the default tracing sink. Failures are
/// logged and the schedule continues.
fn spawn_export_task(
    log: Arc<dyn RequestLog>,
    sensor_id: String,
    interval: Duration,
    window: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let exporter = IocExporter::new(log, Arc::new(TracingIndicatorSink), sensor_id);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; skip it so the first window is full.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let end = SystemTime::now();
                    let start = end - window;
                    match exporter.export_range(start, end) {
                        Ok(summary) => debug!(
                            requests = summary.requests_scanned,
                            indicators = summary.indicators_exported,
                            "scheduled ioc export finished"
                        ),
                        Err(err) => warn!(error = %err, "scheduled ioc export failed"),
                    }
                }
                _ = shutdown_rx.recv() => {
                    debug!("export task shutting down");
                    break;
                }
            }
        }
    })
}

/// Spawn a background task that periodically updates the uptime metric.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let uptime_secs = start_time.elapsed().as_secs();
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);
                }
                _ = shutdown_rx.recv() => {
                    debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}

/// Record build-info metric once at startup.
fn record_build_info() {
    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}
