//! 인메모리 결과 저장소
//!
//! `tokio::sync::RwLock`으로 보호되는 맵 기반 구현입니다. 프로세스 종료 시
//! 데이터가 사라지므로 데몬의 단발 실행과 테스트에 사용합니다.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use codewarden_core::error::StoreError;
use codewarden_core::pipeline::{BoxFuture, HealthStatus};
use codewarden_core::types::{Issue, Project, Scan, ScanStatus, Summary};

use super::{InvalidationStrategy, ResultStore, ScanResults, compare_history, compare_issues};

#[derive(Debug, Default)]
struct Inner {
    projects: HashMap<String, Project>,
    scans: HashMap<String, Scan>,
    /// 삽입 순서를 유지하는 이슈 목록
    issues: Vec<Issue>,
    /// `issues`에 들어 있는 이슈의 중복 판별 키
    finding_keys: HashSet<FindingKey>,
    /// 스캔별 진행률 기록 이력
    progress_log: HashMap<String, Vec<u8>>,
}

/// 인메모리 결과 저장소
#[derive(Debug, Default)]
pub struct InMemoryResultStore {
    inner: RwLock<Inner>,
}

impl InMemoryResultStore {
    /// 빈 저장소를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 스캔에 기록된 진행률 값을 기록 순서대로 반환합니다.
    pub async fn progress_log(&self, scan_id: &str) -> Vec<u8> {
        self.inner
            .read()
            .await
            .progress_log
            .get(scan_id)
            .cloned()
            .unwrap_or_default()
    }

    /// 프로젝트의 전체 이슈 수
    pub async fn issue_count(&self, project_id: &str) -> usize {
        self.inner
            .read()
            .await
            .issues
            .iter()
            .filter(|i| i.project_id == project_id)
            .count()
    }

    /// 저장된 스캔 수
    pub async fn scan_count(&self) -> usize {
        self.inner.read().await.scans.len()
    }
}

/// 중복 판별 키 (ID를 제외한 모든 필드)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FindingKey {
    scan_id: String,
    project_id: String,
    file_path: String,
    lines: BTreeSet<u32>,
    issue_type: String,
    severity: String,
    name: Option<String>,
    description: String,
    recommendation: String,
    cwe: Option<String>,
    owasp: Option<String>,
}

impl FindingKey {
    fn of(issue: &Issue) -> Self {
        Self {
            scan_id: issue.scan_id.clone(),
            project_id: issue.project_id.clone(),
            file_path: issue.file_path.clone(),
            lines: issue.lines.clone(),
            issue_type: issue.issue_type.clone(),
            severity: issue.severity.clone(),
            name: issue.name.clone(),
            description: issue.description.clone(),
            recommendation: issue.recommendation.clone(),
            cwe: issue.cwe.clone(),
            owasp: issue.owasp.clone(),
        }
    }
}

fn transition(scan: &mut Scan, next: ScanStatus) -> Result<(), StoreError> {
    if !scan.status.can_transition_to(next) {
        return Err(StoreError::InvalidTransition {
            scan_id: scan.id.clone(),
            from: scan.status.to_string(),
            to: next.to_string(),
        });
    }
    scan.status = next;
    Ok(())
}

impl ResultStore for InMemoryResultStore {
    fn create_project(&self, project: Project) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let mut inner = self.inner.write().await;
            if inner.projects.contains_key(&project.id) {
                return Err(StoreError::AlreadyExists(format!("project {}", project.id)));
            }
            inner.projects.insert(project.id.clone(), project);
            Ok(())
        })
    }

    fn create_scan(&self, scan: Scan) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let mut inner = self.inner.write().await;
            if inner.scans.contains_key(&scan.id) {
                return Err(StoreError::AlreadyExists(format!("scan {}", scan.id)));
            }
            if scan.status != ScanStatus::Queued {
                return Err(StoreError::InvalidTransition {
                    scan_id: scan.id.clone(),
                    from: scan.status.to_string(),
                    to: ScanStatus::Queued.to_string(),
                });
            }
            inner.scans.insert(scan.id.clone(), scan);
            Ok(())
        })
    }

    fn get_project<'a>(
        &'a self,
        project_id: &'a str,
    ) -> BoxFuture<'a, Result<Project, StoreError>> {
        Box::pin(async move {
            self.inner
                .read()
                .await
                .projects
                .get(project_id)
                .cloned()
                .ok_or_else(|| StoreError::ProjectNotFound(project_id.to_owned()))
        })
    }

    fn get_scan<'a>(&'a self, scan_id: &'a str) -> BoxFuture<'a, Result<Scan, StoreError>> {
        Box::pin(async move {
            self.inner
                .read()
                .await
                .scans
                .get(scan_id)
                .cloned()
                .ok_or_else(|| StoreError::ScanNotFound(scan_id.to_owned()))
        })
    }

    fn mark_running<'a>(
        &'a self,
        scan_id: &'a str,
        started_at: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let mut inner = self.inner.write().await;
            let scan = inner
                .scans
                .get_mut(scan_id)
                .ok_or_else(|| StoreError::ScanNotFound(scan_id.to_owned()))?;
            transition(scan, ScanStatus::Running)?;
            scan.started_at = Some(started_at);
            Ok(())
        })
    }

    fn update_progress<'a>(
        &'a self,
        scan_id: &'a str,
        progress: u8,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let mut guard = self.inner.write().await;
            let inner = &mut *guard;
            let scan = inner
                .scans
                .get_mut(scan_id)
                .ok_or_else(|| StoreError::ScanNotFound(scan_id.to_owned()))?;
            if scan.status != ScanStatus::Running {
                return Err(StoreError::InvalidTransition {
                    scan_id: scan_id.to_owned(),
                    from: scan.status.to_string(),
                    to: "progress update".to_owned(),
                });
            }
            let progress = progress.min(100);
            if progress > scan.progress {
                scan.progress = progress;
                inner
                    .progress_log
                    .entry(scan_id.to_owned())
                    .or_default()
                    .push(progress);
            }
            Ok(())
        })
    }

    fn finish_scan<'a>(
        &'a self,
        scan_id: &'a str,
        status: ScanStatus,
        finished_at: DateTime<Utc>,
        summary: Summary,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let mut guard = self.inner.write().await;
            let inner = &mut *guard;
            let scan = inner
                .scans
                .get_mut(scan_id)
                .ok_or_else(|| StoreError::ScanNotFound(scan_id.to_owned()))?;
            if !status.is_terminal() {
                return Err(StoreError::InvalidTransition {
                    scan_id: scan_id.to_owned(),
                    from: scan.status.to_string(),
                    to: status.to_string(),
                });
            }
            transition(scan, status)?;
            scan.finished_at = Some(finished_at);
            scan.results = Some(summary);

            if status == ScanStatus::Done && scan.progress < 100 {
                scan.progress = 100;
                inner
                    .progress_log
                    .entry(scan_id.to_owned())
                    .or_default()
                    .push(100);
            }
            Ok(())
        })
    }

    fn invalidate_prior_findings<'a>(
        &'a self,
        project_id: &'a str,
        current_scan_id: &'a str,
        strategy: InvalidationStrategy,
    ) -> BoxFuture<'a, Result<usize, StoreError>> {
        Box::pin(async move {
            let mut guard = self.inner.write().await;
            let inner = &mut *guard;
            let before = inner.issues.len();
            let finding_keys = &mut inner.finding_keys;
            inner.issues.retain(|issue| {
                let keep = issue.project_id != project_id
                    || match strategy {
                        InvalidationStrategy::ProjectWide => false,
                        InvalidationStrategy::PriorScansOnly => issue.scan_id == current_scan_id,
                    };
                if !keep {
                    finding_keys.remove(&FindingKey::of(issue));
                }
                keep
            });
            let removed = before - inner.issues.len();
            debug!(project_id, removed, strategy = strategy.as_str(), "prior findings invalidated");
            Ok(removed)
        })
    }

    fn insert_issues(&self, issues: Vec<Issue>) -> BoxFuture<'_, Result<usize, StoreError>> {
        Box::pin(async move {
            let mut guard = self.inner.write().await;
            let inner = &mut *guard;
            let mut inserted = 0;
            for issue in issues {
                if !inner.finding_keys.insert(FindingKey::of(&issue)) {
                    continue;
                }
                inner.issues.push(issue);
                inserted += 1;
            }
            Ok(inserted)
        })
    }

    fn issues_for_scan<'a>(
        &'a self,
        scan_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Issue>, StoreError>> {
        Box::pin(async move {
            Ok(self
                .inner
                .read()
                .await
                .issues
                .iter()
                .filter(|i| i.scan_id == scan_id)
                .cloned()
                .collect())
        })
    }

    fn scan_results<'a>(
        &'a self,
        scan_id: &'a str,
    ) -> BoxFuture<'a, Result<ScanResults, StoreError>> {
        Box::pin(async move {
            let inner = self.inner.read().await;
            let scan = inner
                .scans
                .get(scan_id)
                .cloned()
                .ok_or_else(|| StoreError::ScanNotFound(scan_id.to_owned()))?;

            let mut issues: Vec<Issue> = inner
                .issues
                .iter()
                .filter(|i| i.project_id == scan.project_id)
                .cloned()
                .collect();
            issues.sort_by(compare_issues);

            Ok(ScanResults { scan, issues })
        })
    }

    fn scan_history<'a>(
        &'a self,
        project_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Scan>, StoreError>> {
        Box::pin(async move {
            let inner = self.inner.read().await;
            let mut scans: Vec<Scan> = inner
                .scans
                .values()
                .filter(|s| s.project_id == project_id)
                .cloned()
                .collect();
            scans.sort_by(|a, b| compare_history(a, b).then_with(|| a.id.cmp(&b.id)));
            Ok(scans)
        })
    }

    fn health_check(&self) -> BoxFuture<'_, HealthStatus> {
        Box::pin(async move {
            match self.inner.try_read() {
                Ok(_) => HealthStatus::Healthy,
                Err(_) => HealthStatus::Degraded("store is busy".to_owned()),
            }
        })
    }
}
