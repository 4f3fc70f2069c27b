//! 스캔 작업 대기열 -- 단일 소비자 FIFO와 전역 동시 실행 제한
//!
//! [`ScanQueue`]는 core의 [`Pipeline`] trait을 구현하여 데몬에서 동일한
//! 생명주기(start/stop/health_check)로 관리됩니다.
//!
//! # 내부 아키텍처
//!
//! ```text
//! ScanQueueHandle::enqueue ──> mpsc<ScanJob> ──> dispatcher ──(Semaphore permit)──> ScanRunner
//!                                                    │                                  │
//!                                                    └──────── mpsc<ScanEvent> <────────┘
//! ```
//!
//! 디스패처는 세마포어 permit을 먼저 얻은 뒤 다음 작업을 꺼내므로, 동시에 실행되는
//! 스캔 수는 `concurrency`를 넘지 않습니다 (기본 1).
//!
//! # 재시작 제한
//!
//! `stop()` 후 재시작이 필요하면 `ScanQueueBuilder`로 새 인스턴스를 생성해야 합니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use metrics::{counter, gauge};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use codewarden_core::error::{PipelineError, WardenError};
use codewarden_core::metrics as m;
use codewarden_core::pipeline::{HealthStatus, Pipeline};
use codewarden_core::types::ScanJob;

use crate::config::ScanEngineConfig;
use crate::error::ScanEngineError;
use crate::event::{ScanEvent, ScanEventKind};
use crate::runner::ScanRunner;

/// 기본 이벤트 채널 용량
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// 대기열 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueueState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 대기열 통계 카운터
#[derive(Debug, Default)]
struct QueueCounters {
    pending: AtomicUsize,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
}

/// 작업 등록용 핸들
///
/// 복제해서 여러 곳에서 사용할 수 있습니다. 대기열이 정지된 뒤에는
/// `ScanEngineError::QueueClosed`를 반환합니다.
#[derive(Clone)]
pub struct ScanQueueHandle {
    job_tx: mpsc::Sender<ScanJob>,
    event_tx: mpsc::Sender<ScanEvent>,
    counters: Arc<QueueCounters>,
    capacity: usize,
}

impl ScanQueueHandle {
    /// 작업을 대기열에 등록합니다.
    ///
    /// # Errors
    ///
    /// - `ScanEngineError::QueueFull`: 대기열 용량 초과
    /// - `ScanEngineError::QueueClosed`: 대기열이 정지됨
    pub fn enqueue(&self, job: ScanJob) -> Result<(), ScanEngineError> {
        let event = ScanEvent::new(&job, ScanEventKind::Queued);

        // 디스패처가 꺼내기 전에 집계되어야 take_pending이 0에서 포화되지 않음
        let depth = self.counters.pending.fetch_add(1, Ordering::Relaxed) + 1;
        if let Err(e) = self.job_tx.try_send(job) {
            take_pending(&self.counters);
            return Err(match e {
                mpsc::error::TrySendError::Full(_) => ScanEngineError::QueueFull {
                    capacity: self.capacity,
                },
                mpsc::error::TrySendError::Closed(_) => ScanEngineError::QueueClosed,
            });
        }

        counter!(m::QUEUE_JOBS_ENQUEUED_TOTAL).increment(1);
        gauge!(m::QUEUE_DEPTH).set(depth as f64);
        debug!(scan_id = %event.scan_id, project_id = %event.project_id, depth, "job enqueued");

        if let Err(e) = self.event_tx.try_send(event) {
            debug!(error = %e, "queued event dropped");
        }
        Ok(())
    }

    /// 대기 중인 작업 수
    pub fn pending(&self) -> usize {
        self.counters.pending.load(Ordering::Relaxed)
    }
}

/// 스캔 작업 대기열
pub struct ScanQueue {
    config: ScanEngineConfig,
    state: QueueState,
    runner: Arc<ScanRunner>,
    semaphore: Arc<Semaphore>,
    job_tx: mpsc::Sender<ScanJob>,
    job_rx: Option<mpsc::Receiver<ScanJob>>,
    event_tx: mpsc::Sender<ScanEvent>,
    counters: Arc<QueueCounters>,
    cancel: CancellationToken,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl ScanQueue {
    /// 현재 상태명을 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            QueueState::Initialized => "initialized",
            QueueState::Running => "running",
            QueueState::Stopped => "stopped",
        }
    }

    /// 작업 등록용 핸들을 반환합니다.
    pub fn handle(&self) -> ScanQueueHandle {
        ScanQueueHandle {
            job_tx: self.job_tx.clone(),
            event_tx: self.event_tx.clone(),
            counters: Arc::clone(&self.counters),
            capacity: self.config.queue_capacity,
        }
    }

    /// 동시 실행 한도
    pub fn concurrency(&self) -> usize {
        self.config.concurrency
    }

    /// 대기 중인 작업 수
    pub fn pending(&self) -> usize {
        self.counters.pending.load(Ordering::Relaxed)
    }

    /// 정상 완료된 작업 수
    pub fn jobs_completed(&self) -> u64 {
        self.counters.completed.load(Ordering::Relaxed)
    }

    /// 실패로 기록된 작업 수
    pub fn jobs_failed(&self) -> u64 {
        self.counters.failed.load(Ordering::Relaxed)
    }

    /// 취소된 작업 수
    pub fn jobs_cancelled(&self) -> u64 {
        self.counters.cancelled.load(Ordering::Relaxed)
    }
}

/// 작업 하나를 실행하고 결과 이벤트를 보냅니다.
async fn run_job(
    runner: Arc<ScanRunner>,
    job: ScanJob,
    cancel: CancellationToken,
    event_tx: mpsc::Sender<ScanEvent>,
    counters: Arc<QueueCounters>,
) {
    emit(&event_tx, &cancel, ScanEvent::new(&job, ScanEventKind::Started)).await;
    info!(scan_id = %job.scan_id, project_id = %job.project_id, "job started");

    let kind = match runner.run(&job, &cancel).await {
        Ok(summary) => {
            counters.completed.fetch_add(1, Ordering::Relaxed);
            info!(scan_id = %job.scan_id, "job completed");
            ScanEventKind::Completed { summary }
        }
        Err(err) if err.is_cancelled() => {
            counters.cancelled.fetch_add(1, Ordering::Relaxed);
            info!(scan_id = %job.scan_id, "job cancelled");
            ScanEventKind::Cancelled
        }
        Err(err) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            counter!(m::QUEUE_JOBS_FAILED_TOTAL).increment(1);
            error!(scan_id = %job.scan_id, error = %err, "job failed");
            ScanEventKind::Failed {
                error: err.to_string(),
            }
        }
    };

    emit(&event_tx, &cancel, ScanEvent::new(&job, kind)).await;
}

/// 이벤트를 보냅니다.
///
/// 취소 이후에는 수신자가 더 이상 읽지 않을 수 있으므로 기다리지 않고,
/// 채널이 가득 차 있으면 이벤트를 버립니다. 스캔 상태는 저장소에 이미 기록되어 있습니다.
async fn emit(event_tx: &mpsc::Sender<ScanEvent>, cancel: &CancellationToken, event: ScanEvent) {
    if !cancel.is_cancelled() {
        tokio::select! {
            permit = event_tx.reserve() => {
                match permit {
                    Ok(permit) => permit.send(event),
                    Err(_) => debug!("event receiver dropped"),
                }
                return;
            }
            _ = cancel.cancelled() => {}
        }
    }

    if let Err(e) = event_tx.try_send(event) {
        debug!(error = %e, "event dropped during shutdown");
    }
}

fn take_pending(counters: &QueueCounters) {
    let depth = counters
        .pending
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| Some(n.saturating_sub(1)))
        .map_or(0, |prev| prev.saturating_sub(1));
    gauge!(m::QUEUE_DEPTH).set(depth as f64);
}

impl Pipeline for ScanQueue {
    async fn start(&mut self) -> Result<(), WardenError> {
        if self.state == QueueState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        let Some(mut job_rx) = self.job_rx.take() else {
            return Err(PipelineError::InitFailed(
                "scan queue cannot be restarted, build a new instance".to_owned(),
            )
            .into());
        };

        info!(concurrency = self.config.concurrency, "starting scan queue");

        let runner = Arc::clone(&self.runner);
        let semaphore = Arc::clone(&self.semaphore);
        let event_tx = self.event_tx.clone();
        let counters = Arc::clone(&self.counters);
        let cancel = self.cancel.clone();

        let dispatcher = tokio::spawn(async move {
            let mut running: JoinSet<()> = JoinSet::new();

            loop {
                let permit = tokio::select! {
                    _ = cancel.cancelled() => break,
                    permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };

                let job = tokio::select! {
                    _ = cancel.cancelled() => break,
                    job = job_rx.recv() => match job {
                        Some(job) => job,
                        None => break,
                    },
                };
                take_pending(&counters);

                let runner = Arc::clone(&runner);
                let event_tx = event_tx.clone();
                let counters = Arc::clone(&counters);
                let token = cancel.child_token();
                running.spawn(async move {
                    let _permit = permit;
                    run_job(runner, job, token, event_tx, counters).await;
                });

                while let Some(result) = running.try_join_next() {
                    if let Err(e) = result {
                        warn!(error = %e, "scan task panicked");
                    }
                }
            }

            // 실행 중인 스캔은 현재 파일을 마친 뒤 cancelled로 종료됨
            while let Some(result) = running.join_next().await {
                if let Err(e) = result {
                    warn!(error = %e, "scan task panicked");
                }
            }

            // 남은 작업은 queued 상태로 방치하지 않고 취소로 기록
            job_rx.close();
            while let Ok(job) = job_rx.try_recv() {
                take_pending(&counters);
                run_job(
                    Arc::clone(&runner),
                    job,
                    cancel.child_token(),
                    event_tx.clone(),
                    Arc::clone(&counters),
                )
                .await;
            }

            debug!("scan queue dispatcher exited");
        });

        self.tasks.push(dispatcher);
        self.state = QueueState::Running;
        info!("scan queue started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), WardenError> {
        if self.state != QueueState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping scan queue");
        self.cancel.cancel();

        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "scan queue dispatcher panicked");
            }
        }

        self.state = QueueState::Stopped;
        info!(
            completed = self.jobs_completed(),
            failed = self.jobs_failed(),
            cancelled = self.jobs_cancelled(),
            "scan queue stopped"
        );
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            QueueState::Running => match self.runner.store().health_check().await {
                HealthStatus::Healthy => HealthStatus::Healthy,
                HealthStatus::Degraded(reason) | HealthStatus::Unhealthy(reason) => {
                    HealthStatus::Degraded(format!("result store: {reason}"))
                }
            },
            QueueState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            QueueState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 스캔 대기열 빌더
///
/// 대기열을 구성하고 필요한 채널을 생성합니다.
pub struct ScanQueueBuilder {
    config: ScanEngineConfig,
    runner: Option<Arc<ScanRunner>>,
    event_tx: Option<mpsc::Sender<ScanEvent>>,
    event_channel_capacity: usize,
}

impl ScanQueueBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: ScanEngineConfig::default(),
            runner: None,
            event_tx: None,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }

    /// 대기열 설정을 지정합니다.
    pub fn config(mut self, config: ScanEngineConfig) -> Self {
        self.config = config;
        self
    }

    /// 작업을 실행할 러너를 지정합니다 (필수).
    pub fn runner(mut self, runner: Arc<ScanRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// 외부 이벤트 전송 채널을 설정합니다.
    ///
    /// 설정하지 않으면 빌더가 새 채널을 생성합니다.
    pub fn event_sender(mut self, tx: mpsc::Sender<ScanEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// 이벤트 채널 용량을 설정합니다 (외부 채널 미사용 시).
    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    /// 대기열을 빌드합니다.
    ///
    /// # Returns
    ///
    /// - `ScanQueue`: 대기열 인스턴스
    /// - `Option<mpsc::Receiver<ScanEvent>>`: 이벤트 수신 채널
    ///   (외부 event_sender를 설정한 경우 None)
    ///
    /// # Errors
    ///
    /// 설정이 유효하지 않거나 러너가 지정되지 않으면 `ScanEngineError::Config`를 반환합니다.
    pub fn build(self) -> Result<(ScanQueue, Option<mpsc::Receiver<ScanEvent>>), ScanEngineError> {
        self.config.validate()?;

        let runner = self.runner.ok_or_else(|| ScanEngineError::Config {
            field: "runner".to_owned(),
            reason: "scan runner is required".to_owned(),
        })?;

        if self.event_tx.is_none() && self.event_channel_capacity == 0 {
            return Err(ScanEngineError::Config {
                field: "event_channel_capacity".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        let (event_tx, event_rx) = if let Some(tx) = self.event_tx {
            (tx, None)
        } else {
            let (tx, rx) = mpsc::channel(self.event_channel_capacity);
            (tx, Some(rx))
        };

        let (job_tx, job_rx) = mpsc::channel(self.config.queue_capacity);

        let queue = ScanQueue {
            semaphore: Arc::new(Semaphore::new(self.config.concurrency)),
            config: self.config,
            state: QueueState::Initialized,
            runner,
            job_tx,
            job_rx: Some(job_rx),
            event_tx,
            counters: Arc::new(QueueCounters::default()),
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        };

        Ok((queue, event_rx))
    }
}

impl Default for ScanQueueBuilder {
    fn default() -> Self {
        Self::new()
    }
}
