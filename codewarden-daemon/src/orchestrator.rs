//! Scan orchestration -- assembly, project intake and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `codewarden-daemon`.
//! It wires the result store, the analysis oracle client, the scan runner
//! and the job queue together, registers projects, and waits for every
//! submitted scan to reach a terminal state.
//!
//! # Lifecycle
//!
//! 1. `build` -- validate configuration, install metrics, build components
//! 2. `submit` -- build the manifest, register project and queued scan, enqueue
//! 3. `run` -- start the queue and wait for terminal events or a signal
//! 4. stop the queue (in-flight scan finishes its current file, pending
//!    scans are recorded as cancelled) and produce a [`ScanReport`]

use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};

use codewarden_core::config::WardenConfig;
use codewarden_core::pipeline::Pipeline;
use codewarden_core::types::{Project, Scan, ScanJob};
use codewarden_scan_engine::store::ResultStore;
use codewarden_scan_engine::{
    AnalysisOracle, HttpOracleClient, InMemoryResultStore, ScanEngineConfig, ScanEvent,
    ScanEventKind, ScanQueue, ScanQueueBuilder, ScanQueueHandle, ScanResults, ScanRunner,
};

use crate::health::{ComponentHealth, DaemonHealth, aggregate_status};
use crate::manifest;
use crate::metrics_server;

/// A project registered by this daemon run.
#[derive(Debug, Clone)]
struct Submission {
    job: ScanJob,
    name: String,
    root: PathBuf,
}

/// Final outcome of a daemon run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    /// Report creation time.
    pub generated_at: DateTime<Utc>,
    /// Whether a shutdown signal cut the run short.
    pub interrupted: bool,
    /// One entry per submitted project, in submission order.
    pub projects: Vec<ProjectReport>,
}

/// Scan record and findings for one project.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectReport {
    pub project_id: String,
    pub name: String,
    pub root_path: PathBuf,
    #[serde(flatten)]
    pub results: ScanResults,
}

impl ScanReport {
    /// Number of projects whose scan did not finish as done.
    pub fn unsuccessful(&self) -> usize {
        self.projects
            .iter()
            .filter(|p| p.results.scan.status != codewarden_core::types::ScanStatus::Done)
            .count()
    }
}

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: WardenConfig,
    /// Scan and issue records for this process.
    store: Arc<InMemoryResultStore>,
    /// Job queue driving the scan runner.
    queue: ScanQueue,
    /// Producer side of the queue.
    handle: ScanQueueHandle,
    /// Lifecycle events emitted by the queue.
    events: mpsc::Receiver<ScanEvent>,
    /// Projects submitted so far.
    submissions: Vec<Submission>,
    /// Shutdown broadcast sender (signals background tasks).
    shutdown_tx: broadcast::Sender<()>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or validated,
    /// or if any component fails to build.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = WardenConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config)
    }

    /// Build from an already-loaded configuration, talking to the
    /// configured HTTP oracle.
    pub fn build_from_config(config: WardenConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        let engine_config = ScanEngineConfig::from_core(&config);
        let oracle = HttpOracleClient::new(&engine_config)
            .map_err(|e| anyhow::anyhow!("failed to build oracle client: {}", e))?;
        tracing::info!(
            endpoint = oracle.endpoint(),
            model = %engine_config.model,
            "oracle client initialized"
        );

        Self::build_with_oracle(config, Arc::new(oracle))
    }

    /// Build with an explicit oracle implementation.
    pub fn build_with_oracle(
        config: WardenConfig,
        oracle: Arc<dyn AnalysisOracle>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            tracing::info!(port = config.metrics.port, "metrics endpoint enabled");
        }

        let engine_config = ScanEngineConfig::from_core(&config);
        let store = Arc::new(InMemoryResultStore::new());
        let runner = Arc::new(ScanRunner::new(
            store.clone(),
            oracle,
            engine_config.clone(),
        ));

        let (queue, events) = ScanQueueBuilder::new()
            .config(engine_config)
            .runner(runner)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build scan queue: {}", e))?;
        let events =
            events.ok_or_else(|| anyhow::anyhow!("scan queue did not expose an event channel"))?;
        let handle = queue.handle();
        let (shutdown_tx, _) = broadcast::channel(4);

        tracing::info!(
            concurrency = queue.concurrency(),
            invalidation = config.scan.invalidation.as_str(),
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            store,
            queue,
            handle,
            events,
            submissions: Vec::new(),
            shutdown_tx,
            start_time: Instant::now(),
        })
    }

    /// Register the project at `root` and enqueue its scan.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be walked or the queue
    /// rejects the job.
    pub async fn submit(&mut self, root: &Path) -> Result<ScanJob> {
        let entries = manifest::build_manifest(root).await?;
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());

        let project = Project {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.clone(),
            root_path: root.to_path_buf(),
            manifest: Some(manifest::to_manifest_value(&entries)?),
        };
        let job = ScanJob::new(uuid::Uuid::new_v4().to_string(), &project.id);

        self.store
            .create_project(project)
            .await
            .map_err(|e| anyhow::anyhow!("failed to register project {}: {}", name, e))?;
        self.store
            .create_scan(Scan::queued(&job.scan_id, &job.project_id))
            .await
            .map_err(|e| anyhow::anyhow!("failed to register scan for {}: {}", name, e))?;
        self.handle
            .enqueue(job.clone())
            .map_err(|e| anyhow::anyhow!("failed to enqueue scan for {}: {}", name, e))?;

        tracing::info!(
            scan_id = %job.scan_id,
            project_id = %job.project_id,
            project = %name,
            entries = entries.len(),
            "project submitted"
        );

        self.submissions.push(Submission {
            job: job.clone(),
            name,
            root: root.to_path_buf(),
        });
        Ok(job)
    }

    /// Run every submitted scan until done or until SIGINT/SIGTERM.
    pub async fn run(&mut self) -> Result<ScanReport> {
        let signal = shutdown_signal()?;
        self.run_until(signal).await
    }

    /// Run every submitted scan until done or until `shutdown` resolves.
    ///
    /// On shutdown the queue is stopped: the running scan finishes its
    /// current file and is recorded as cancelled, as are all pending scans.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<ScanReport>
    where
        F: Future<Output = &'static str>,
    {
        self.queue
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start scan queue: {}", e))?;

        let uptime_task = self
            .config
            .metrics
            .enabled
            .then(|| spawn_uptime_updater(self.start_time, self.shutdown_tx.subscribe()));

        let mut remaining: HashSet<String> = self
            .submissions
            .iter()
            .map(|s| s.job.scan_id.clone())
            .collect();
        let mut interrupted = false;

        tracing::info!(scans = remaining.len(), "waiting for scans to finish");
        tokio::pin!(shutdown);
        while !remaining.is_empty() {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => {
                        log_event(&event);
                        if event.is_terminal() {
                            remaining.remove(&event.scan_id);
                        }
                    }
                    None => {
                        tracing::warn!("scan event channel closed");
                        break;
                    }
                },
                signal = &mut shutdown => {
                    tracing::info!(signal = signal, "shutdown signal received, cancelling scans");
                    interrupted = true;
                    break;
                }
            }
        }

        // Keep draining events while the queue winds down
        let stopped = {
            let stop = self.queue.stop();
            tokio::pin!(stop);
            loop {
                tokio::select! {
                    result = &mut stop => break result,
                    Some(event) = self.events.recv() => log_event(&event),
                }
            }
        };
        stopped.map_err(|e| anyhow::anyhow!("failed to stop scan queue: {}", e))?;
        while let Ok(event) = self.events.try_recv() {
            log_event(&event);
        }

        let _ = self.shutdown_tx.send(());
        if let Some(task) = uptime_task {
            let _ = task.await;
        }

        self.report(interrupted).await
    }

    /// Collect the stored results for every submitted project.
    pub async fn report(&self, interrupted: bool) -> Result<ScanReport> {
        let mut projects = Vec::with_capacity(self.submissions.len());
        for submission in &self.submissions {
            let results = self
                .store
                .scan_results(&submission.job.scan_id)
                .await
                .map_err(|e| anyhow::anyhow!("failed to load scan results: {}", e))?;
            projects.push(ProjectReport {
                project_id: submission.job.project_id.clone(),
                name: submission.name.clone(),
                root_path: submission.root.clone(),
                results,
            });
        }

        Ok(ScanReport {
            generated_at: Utc::now(),
            interrupted,
            projects,
        })
    }

    /// Get the current aggregated health status.
    pub async fn health(&self) -> DaemonHealth {
        let components = vec![
            ComponentHealth::new("scan-queue", self.queue.health_check().await),
            ComponentHealth::new("result-store", self.store.health_check().await),
        ];
        let uptime_secs = self.start_time.elapsed().as_secs();

        if self.config.metrics.enabled {
            #[allow(clippy::cast_precision_loss)]
            metrics::gauge!(codewarden_core::metrics::DAEMON_UPTIME_SECONDS)
                .set(uptime_secs as f64);
        }

        DaemonHealth {
            status: aggregate_status(&components),
            uptime_secs,
            pending_scans: self.queue.pending(),
            components,
        }
    }

    /// Result store backing this daemon run.
    pub fn store(&self) -> &Arc<InMemoryResultStore> {
        &self.store
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &WardenConfig {
        &self.config
    }
}

fn log_event(event: &ScanEvent) {
    match &event.kind {
        ScanEventKind::Completed { summary } => tracing::info!(
            scan_id = %event.scan_id,
            project_id = %event.project_id,
            total_issues = summary.total_issues,
            critical = summary.issues_by_severity.critical,
            high = summary.issues_by_severity.high,
            scanned_files = summary.scanned_files,
            "scan completed"
        ),
        ScanEventKind::Failed { error } => tracing::warn!(
            scan_id = %event.scan_id,
            project_id = %event.project_id,
            error = %error,
            "scan failed"
        ),
        ScanEventKind::Cancelled => tracing::warn!(
            scan_id = %event.scan_id,
            project_id = %event.project_id,
            "scan cancelled"
        ),
        ScanEventKind::Queued | ScanEventKind::Started => tracing::debug!(
            scan_id = %event.scan_id,
            kind = event.kind.as_str(),
            "scan event"
        ),
    }
}

/// Install SIGTERM/SIGINT handlers.
///
/// The returned future resolves with the name of the first signal received.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
fn shutdown_signal() -> Result<impl Future<Output = &'static str>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        }
    })
}

/// Spawn a background task that periodically updates the uptime metric.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    use codewarden_core::metrics as m;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(start_time.elapsed().as_secs() as f64);
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}
