//! 스캔 러너 -- 스캔 하나의 상태 머신
//!
//! # 상태 전이
//!
//! ```text
//! queued ──> running ──> done
//!   │           ├──────> failed
//!   │           └──────> cancelled
//!   └──────> failed | cancelled   (루프 시작 전 치명적 에러 / 취소)
//! ```
//!
//! # 실행 순서
//!
//! 1. 프로젝트와 매니페스트 검증 (실패 시 바로 `failed`)
//! 2. `running` 전이 및 시작 시각 기록
//! 3. 이전 findings 무효화
//! 4. 매니페스트 순서대로 항목 처리 ([`EntryOutcome`] + 진행률 기록)
//! 5. 요약 계산, `done` 전이
//!
//! 파일 단위 에러(읽기, 크기 초과, 오라클 전송, 스키마 위반)는 로그만 남기고
//! 다음 항목으로 진행합니다. 저장소 에러와 매니페스트 에러는 스캔을 중단합니다.

use std::path::{Component, Path};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use metrics::{counter, histogram};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use codewarden_core::error::ScanError;
use codewarden_core::metrics as m;
use codewarden_core::types::{Issue, ManifestEntry, ScanJob, ScanStatus, Severity, Summary};

use crate::config::ScanEngineConfig;
use crate::eligibility::is_eligible;
use crate::error::ScanEngineError;
use crate::oracle::{AnalysisOracle, Finding, OracleResponse};
use crate::progress::{EntryOutcome, ProgressTracker};
use crate::store::ResultStore;
use crate::summary::summarize;

/// 스캔 러너
pub struct ScanRunner {
    store: Arc<dyn ResultStore>,
    oracle: Arc<dyn AnalysisOracle>,
    config: ScanEngineConfig,
}

impl ScanRunner {
    /// 저장소, 오라클, 설정으로 러너를 생성합니다.
    pub fn new(
        store: Arc<dyn ResultStore>,
        oracle: Arc<dyn AnalysisOracle>,
        config: ScanEngineConfig,
    ) -> Self {
        Self {
            store,
            oracle,
            config,
        }
    }

    /// 결과 저장소 참조
    pub fn store(&self) -> &Arc<dyn ResultStore> {
        &self.store
    }

    /// 러너 설정
    pub fn config(&self) -> &ScanEngineConfig {
        &self.config
    }

    /// 스캔 하나를 끝까지 실행합니다.
    ///
    /// 스캔은 항상 종료 상태로 기록됩니다. 정상 완료 시 요약을 반환하고,
    /// 실패나 취소 시 스캔을 `failed`/`cancelled`로 기록한 뒤 에러를 반환합니다.
    ///
    /// # Errors
    ///
    /// - `ScanError::ManifestMissing` / `ManifestMalformed`: 매니페스트 문제
    /// - `ScanError::Cancelled`: 취소 토큰이 트리거됨
    /// - `StoreError`: 저장소 읽기/쓰기 실패
    pub async fn run(
        &self,
        job: &ScanJob,
        cancel: &CancellationToken,
    ) -> Result<Summary, ScanEngineError> {
        let started = Instant::now();

        let result = self.execute(job, cancel).await;
        histogram!(m::SCAN_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

        match result {
            Ok(summary) => {
                counter!(m::SCANS_COMPLETED_TOTAL).increment(1);
                info!(
                    scan_id = %job.scan_id,
                    project_id = %job.project_id,
                    total_issues = summary.total_issues,
                    scanned_files = summary.scanned_files,
                    "scan completed"
                );
                Ok(summary)
            }
            Err(err) => {
                self.record_failure(job, &err).await;
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        job: &ScanJob,
        cancel: &CancellationToken,
    ) -> Result<Summary, ScanEngineError> {
        let project = self.store.get_project(&job.project_id).await?;
        let entries = project.manifest_entries()?;

        if cancel.is_cancelled() {
            return Err(ScanError::Cancelled.into());
        }

        self.store.mark_running(&job.scan_id, Utc::now()).await?;
        counter!(m::SCANS_STARTED_TOTAL).increment(1);

        let removed = self
            .store
            .invalidate_prior_findings(&job.project_id, &job.scan_id, self.config.invalidation)
            .await?;

        info!(
            scan_id = %job.scan_id,
            project_id = %job.project_id,
            entries = entries.len(),
            removed,
            "scan started"
        );

        let mut tracker = ProgressTracker::new(entries.len(), self.config.progress_policy);
        let mut findings: Vec<Issue> = Vec::new();
        let mut attempted = 0usize;
        let total = entries.len();

        for (index, entry) in entries.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(scan_id = %job.scan_id, index, "scan cancelled before entry");
                return Err(ScanError::Cancelled.into());
            }

            let outcome = if !is_eligible(entry) {
                debug!(scan_id = %job.scan_id, path = %entry.path, "entry skipped");
                EntryOutcome::Skipped
            } else {
                info!(scan_id = %job.scan_id, "[{}/{}] {}", index + 1, total, entry.path);
                attempted += 1;

                match self.analyze_entry(job, &project.root_path, entry).await {
                    Ok(issues) => {
                        let inserted = self.store.insert_issues(issues.clone()).await?;
                        debug!(
                            scan_id = %job.scan_id,
                            path = %entry.path,
                            found = issues.len(),
                            inserted,
                            "findings persisted"
                        );
                        for issue in &issues {
                            let level = issue
                                .severity_level()
                                .map(|s| s.as_upper().to_lowercase())
                                .unwrap_or_else(|| "unknown".to_owned());
                            counter!(m::SCAN_ISSUES_FOUND_TOTAL, m::LABEL_SEVERITY => level)
                                .increment(1);
                        }
                        findings.extend(issues);
                        counter!(m::SCAN_FILES_ANALYZED_TOTAL).increment(1);
                        EntryOutcome::Processed
                    }
                    Err(err) => {
                        warn!(
                            scan_id = %job.scan_id,
                            path = %entry.path,
                            error = %err,
                            "file analysis failed, continuing"
                        );
                        EntryOutcome::Failed
                    }
                }
            };

            counter!(m::SCAN_ENTRIES_TOTAL, m::LABEL_OUTCOME => outcome.as_str()).increment(1);

            if let Some(progress) = tracker.record(index, outcome) {
                self.store.update_progress(&job.scan_id, progress).await?;
            }
        }

        let summary = summarize(&findings, attempted);
        self.store
            .finish_scan(&job.scan_id, ScanStatus::Done, Utc::now(), summary.clone())
            .await?;

        Ok(summary)
    }

    /// 파일 하나를 읽어 오라클에 보내고 이슈 레코드로 변환합니다.
    async fn analyze_entry(
        &self,
        job: &ScanJob,
        root: &Path,
        entry: &ManifestEntry,
    ) -> Result<Vec<Issue>, ScanEngineError> {
        let io_err = |source: std::io::Error| ScanEngineError::Io {
            path: entry.path.clone(),
            source,
        };

        let relative = entry.path.trim_start_matches(['/', '\\']);
        if escapes_root(relative) {
            return Err(io_err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "manifest path escapes the project root",
            )));
        }
        let full_path = root.join(relative);

        let metadata = tokio::fs::metadata(&full_path).await.map_err(io_err)?;
        if metadata.len() > self.config.max_file_size as u64 {
            return Err(ScanEngineError::FileTooBig {
                path: entry.path.clone(),
                size: metadata.len(),
                max: self.config.max_file_size,
            });
        }

        let bytes = tokio::fs::read(&full_path).await.map_err(io_err)?;
        let source = String::from_utf8_lossy(&bytes);

        let response = self.oracle.analyze(&entry.path, &source).await?;
        match response {
            OracleResponse::Findings(result) => Ok(result
                .issues
                .into_iter()
                .map(|finding| to_issue(job, &entry.path, finding))
                .collect()),
            OracleResponse::ParseError { reason } => {
                warn!(
                    scan_id = %job.scan_id,
                    path = %entry.path,
                    reason = %reason,
                    "oracle answer is not JSON, treating as no findings"
                );
                Ok(Vec::new())
            }
            OracleResponse::SchemaError { reason } => Err(ScanEngineError::MalformedFindings {
                path: entry.path.clone(),
                reason,
            }),
        }
    }

    /// 실패/취소된 스캔을 종료 상태로 기록합니다.
    async fn record_failure(&self, job: &ScanJob, err: &ScanEngineError) {
        let status = if err.is_cancelled() {
            counter!(m::SCANS_CANCELLED_TOTAL).increment(1);
            warn!(scan_id = %job.scan_id, project_id = %job.project_id, "scan cancelled");
            ScanStatus::Cancelled
        } else {
            counter!(m::SCANS_FAILED_TOTAL).increment(1);
            error!(
                scan_id = %job.scan_id,
                project_id = %job.project_id,
                error = %err,
                "scan failed"
            );
            ScanStatus::Failed
        };

        if let Err(store_err) = self
            .store
            .finish_scan(&job.scan_id, status, Utc::now(), Summary::failed(err.to_string()))
            .await
        {
            error!(
                scan_id = %job.scan_id,
                error = %store_err,
                "failed to record terminal scan status"
            );
        }
    }
}

/// 루트 밖을 가리킬 수 있는 경로 (`..` 구성요소, 드라이브 접두사)
fn escapes_root(relative: &str) -> bool {
    relative.split(['/', '\\']).any(|segment| segment == "..")
        || Path::new(relative)
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
}

/// 오라클 finding을 이슈 레코드로 변환합니다.
///
/// 심각도는 인식 가능하면 정규화된 대문자, 아니면 받은 값을 대문자로 저장합니다.
fn to_issue(job: &ScanJob, path: &str, finding: Finding) -> Issue {
    let severity = Severity::from_str_loose(&finding.severity)
        .map(|s| s.as_upper().to_owned())
        .unwrap_or_else(|| finding.severity.trim().to_uppercase());

    Issue {
        id: uuid::Uuid::new_v4().to_string(),
        scan_id: job.scan_id.clone(),
        project_id: job.project_id.clone(),
        file_path: path.to_owned(),
        lines: finding.lines.into_iter().collect(),
        issue_type: finding.issue_type,
        severity,
        name: finding.name,
        description: finding.description,
        recommendation: finding.recommendation,
        cwe: finding.cwe,
        owasp: finding.owasp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: &str) -> Finding {
        Finding {
            name: Some("n".to_owned()),
            issue_type: "XSS".to_owned(),
            severity: severity.to_owned(),
            cwe: Some("CWE-79".to_owned()),
            owasp: None,
            lines: vec![5, 3, 5],
            description: "d".to_owned(),
            recommendation: "r".to_owned(),
        }
    }

    #[test]
    fn parent_components_escape_root() {
        assert!(escapes_root("../secret.env"));
        assert!(escapes_root("src/../../etc/passwd"));
        assert!(escapes_root("src\\..\\..\\boot.ini"));
        assert!(!escapes_root("src/app..py"));
        assert!(!escapes_root("src/./main.rs"));
        assert!(!escapes_root(".env"));
    }

    #[test]
    fn to_issue_tags_scan_and_path() {
        let job = ScanJob::new("s1", "p1");
        let issue = to_issue(&job, "src/a.js", finding("high"));
        assert_eq!(issue.scan_id, "s1");
        assert_eq!(issue.project_id, "p1");
        assert_eq!(issue.file_path, "src/a.js");
        assert_eq!(issue.severity, "HIGH");
        assert_eq!(issue.lines.iter().copied().collect::<Vec<_>>(), vec![3, 5]);
    }

    #[test]
    fn to_issue_normalizes_known_aliases() {
        let job = ScanJob::new("s1", "p1");
        assert_eq!(to_issue(&job, "a", finding(" Moderate ")).severity, "MEDIUM");
    }

    #[test]
    fn to_issue_keeps_unknown_severity_uppercased() {
        let job = ScanJob::new("s1", "p1");
        let issue = to_issue(&job, "a", finding("severe"));
        assert_eq!(issue.severity, "SEVERE");
        assert!(issue.severity_level().is_none());
    }
}
