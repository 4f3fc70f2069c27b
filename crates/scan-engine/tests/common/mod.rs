//! 통합 테스트 공용 헬퍼
//!
//! - `ScriptedOracle`: 파일별로 미리 정한 응답을 돌려주는 오라클
//! - `ProjectFixture`: 임시 디렉토리에 파일을 만들고 프로젝트/스캔을 등록
//! - `FailingInsertStore`: 이슈 삽입만 실패하는 저장소

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tempfile::TempDir;

use codewarden_core::error::{OracleError, StoreError};
use codewarden_core::pipeline::{BoxFuture, HealthStatus};
use codewarden_core::types::{Issue, Project, Scan, ScanStatus, Summary};
use codewarden_scan_engine::store::{InvalidationStrategy, ResultStore, ScanResults};
use codewarden_scan_engine::{
    AnalysisOracle, InMemoryResultStore, OracleResponse, ScanEngineConfig, parse_findings,
};

/// 빈 findings 응답
pub const NO_ISSUES: &str = r#"{"issues":[]}"#;

/// 파일 하나에 대한 응답 스크립트
#[derive(Clone)]
pub enum Reply {
    /// 원본 응답 텍스트 (parse_findings로 해석)
    Raw(String),
    /// 전송 실패
    Transport(String),
    /// 2xx가 아닌 응답
    Status(u16),
}

/// 미리 정한 응답을 돌려주는 오라클
pub struct ScriptedOracle {
    replies: HashMap<String, Reply>,
    default_reply: Reply,
    delay: Duration,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self {
            replies: HashMap::new(),
            default_reply: Reply::Raw(NO_ISSUES.to_owned()),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn reply(mut self, path: &str, reply: Reply) -> Self {
        self.replies.insert(path.to_owned(), reply);
        self
    }

    pub fn raw(self, path: &str, body: &str) -> Self {
        self.reply(path, Reply::Raw(body.to_owned()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// 호출된 파일 경로 (호출 순서)
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// 동시에 진행된 최대 호출 수
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl AnalysisOracle for ScriptedOracle {
    fn name(&self) -> &str {
        "scripted"
    }

    fn analyze<'a>(
        &'a self,
        filename: &'a str,
        _source: &'a str,
    ) -> BoxFuture<'a, Result<OracleResponse, OracleError>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(filename.to_owned());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            let reply = self
                .replies
                .get(filename)
                .cloned()
                .unwrap_or_else(|| self.default_reply.clone());

            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match reply {
                Reply::Raw(body) => Ok(parse_findings(&body)),
                Reply::Transport(msg) => Err(OracleError::Transport(msg)),
                Reply::Status(status) => Err(OracleError::Status {
                    status,
                    body: "upstream error".to_owned(),
                }),
            }
        })
    }
}

/// 임시 디렉토리 기반 프로젝트
pub struct ProjectFixture {
    pub dir: TempDir,
    pub project: Project,
}

impl ProjectFixture {
    /// `files`를 생성하고 `manifest`를 그대로 저장한 프로젝트를 만듭니다.
    pub fn new(id: &str, files: &[(&str, &str)], manifest: Option<serde_json::Value>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        for (path, content) in files {
            write_file(dir.path(), path, content);
        }
        let project = Project {
            id: id.to_owned(),
            name: format!("{id}-project"),
            root_path: dir.path().to_path_buf(),
            manifest,
        };
        Self { dir, project }
    }

    /// 파일 목록으로 매니페스트를 만들어 프로젝트를 생성합니다.
    pub fn with_files(id: &str, files: &[(&str, &str)]) -> Self {
        let manifest = serde_json::Value::Array(
            files
                .iter()
                .map(|(path, content)| {
                    serde_json::json!({ "path": path, "isDir": false, "size": content.len() })
                })
                .collect(),
        );
        Self::new(id, files, Some(manifest))
    }
}

pub fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

/// 프로젝트와 queued 스캔을 저장소에 등록합니다.
pub async fn register(store: &dyn ResultStore, project: &Project, scan_id: &str) {
    if store.get_project(&project.id).await.is_err() {
        store.create_project(project.clone()).await.unwrap();
    }
    store
        .create_scan(Scan::queued(scan_id, &project.id))
        .await
        .unwrap();
}

pub fn test_config() -> ScanEngineConfig {
    ScanEngineConfig::default()
}

pub fn shared_store() -> Arc<InMemoryResultStore> {
    Arc::new(InMemoryResultStore::new())
}

/// 이슈 삽입만 실패하는 저장소
pub struct FailingInsertStore {
    pub inner: InMemoryResultStore,
}

impl FailingInsertStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryResultStore::new(),
        }
    }
}

impl ResultStore for FailingInsertStore {
    fn create_project(&self, project: Project) -> BoxFuture<'_, Result<(), StoreError>> {
        self.inner.create_project(project)
    }

    fn create_scan(&self, scan: Scan) -> BoxFuture<'_, Result<(), StoreError>> {
        self.inner.create_scan(scan)
    }

    fn get_project<'a>(
        &'a self,
        project_id: &'a str,
    ) -> BoxFuture<'a, Result<Project, StoreError>> {
        self.inner.get_project(project_id)
    }

    fn get_scan<'a>(&'a self, scan_id: &'a str) -> BoxFuture<'a, Result<Scan, StoreError>> {
        self.inner.get_scan(scan_id)
    }

    fn mark_running<'a>(
        &'a self,
        scan_id: &'a str,
        started_at: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        self.inner.mark_running(scan_id, started_at)
    }

    fn update_progress<'a>(
        &'a self,
        scan_id: &'a str,
        progress: u8,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        self.inner.update_progress(scan_id, progress)
    }

    fn finish_scan<'a>(
        &'a self,
        scan_id: &'a str,
        status: ScanStatus,
        finished_at: DateTime<Utc>,
        summary: Summary,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        self.inner.finish_scan(scan_id, status, finished_at, summary)
    }

    fn invalidate_prior_findings<'a>(
        &'a self,
        project_id: &'a str,
        current_scan_id: &'a str,
        strategy: InvalidationStrategy,
    ) -> BoxFuture<'a, Result<usize, StoreError>> {
        self.inner
            .invalidate_prior_findings(project_id, current_scan_id, strategy)
    }

    fn insert_issues(&self, _issues: Vec<Issue>) -> BoxFuture<'_, Result<usize, StoreError>> {
        Box::pin(async { Err(StoreError::Unavailable("disk full".to_owned())) })
    }

    fn issues_for_scan<'a>(
        &'a self,
        scan_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Issue>, StoreError>> {
        self.inner.issues_for_scan(scan_id)
    }

    fn scan_results<'a>(
        &'a self,
        scan_id: &'a str,
    ) -> BoxFuture<'a, Result<ScanResults, StoreError>> {
        self.inner.scan_results(scan_id)
    }

    fn scan_history<'a>(
        &'a self,
        project_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Scan>, StoreError>> {
        self.inner.scan_history(project_id)
    }

    fn health_check(&self) -> BoxFuture<'_, HealthStatus> {
        Box::pin(async { HealthStatus::Degraded("insert path failing".to_owned()) })
    }
}
