//! 결과 저장소 -- 스캔/이슈 레코드의 영속 계층
//!
//! 러너는 [`ResultStore`] trait만 알고 있으며, 실제 저장 방식은 구현체가 결정합니다.
//! 데몬과 테스트는 [`InMemoryResultStore`]를 사용합니다.
//!
//! # 불변식
//!
//! - 스캔 상태 전이는 [`ScanStatus::can_transition_to`]를 따름
//! - 종료 상태의 스캔은 변경 불가
//! - 진행률은 감소하지 않음
//! - 이슈 일괄 삽입은 멱등 (ID를 제외한 모든 필드가 같으면 중복으로 취급)

pub mod memory;

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use codewarden_core::error::StoreError;
use codewarden_core::pipeline::{BoxFuture, HealthStatus};
use codewarden_core::types::{Issue, Project, Scan, ScanStatus, Summary};

pub use memory::InMemoryResultStore;

/// 새 스캔 시작 시 이전 이슈 삭제 범위
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidationStrategy {
    /// 프로젝트의 모든 이슈 삭제
    #[default]
    ProjectWide,
    /// 현재 스캔이 아닌 이슈만 삭제
    PriorScansOnly,
}

impl InvalidationStrategy {
    /// 설정 문자열에서 전략을 파싱합니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "project" | "project-wide" => Some(Self::ProjectWide),
            "prior-scans" | "prior-scans-only" | "prior" => Some(Self::PriorScansOnly),
            _ => None,
        }
    }

    /// 설정 문자열
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectWide => "project",
            Self::PriorScansOnly => "prior-scans",
        }
    }
}

/// 스캔 결과 조회 응답
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResults {
    /// 스캔 레코드
    pub scan: Scan,
    /// 프로젝트 이슈 (심각도 내림차순, 파일 경로, 줄 번호 오름차순)
    pub issues: Vec<Issue>,
}

/// 결과 저장소 trait
///
/// 러너와 대기열이 `Arc<dyn ResultStore>`로 공유하므로 [`BoxFuture`]를 반환합니다.
pub trait ResultStore: Send + Sync {
    /// 프로젝트를 등록합니다.
    fn create_project(&self, project: Project) -> BoxFuture<'_, Result<(), StoreError>>;

    /// `queued` 상태의 스캔을 등록합니다.
    fn create_scan(&self, scan: Scan) -> BoxFuture<'_, Result<(), StoreError>>;

    /// 프로젝트를 조회합니다.
    fn get_project<'a>(&'a self, project_id: &'a str)
    -> BoxFuture<'a, Result<Project, StoreError>>;

    /// 스캔을 조회합니다.
    fn get_scan<'a>(&'a self, scan_id: &'a str) -> BoxFuture<'a, Result<Scan, StoreError>>;

    /// 스캔을 `running`으로 전이하고 시작 시각을 기록합니다.
    fn mark_running<'a>(
        &'a self,
        scan_id: &'a str,
        started_at: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    /// 진행률을 갱신합니다. 현재 값보다 작은 값은 무시됩니다.
    fn update_progress<'a>(
        &'a self,
        scan_id: &'a str,
        progress: u8,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    /// 스캔을 종료 상태로 전이하고 요약을 저장합니다.
    ///
    /// `done`이면 진행률을 100으로 고정합니다.
    fn finish_scan<'a>(
        &'a self,
        scan_id: &'a str,
        status: ScanStatus,
        finished_at: DateTime<Utc>,
        summary: Summary,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    /// 이전 스캔의 이슈를 삭제하고 삭제된 수를 반환합니다.
    fn invalidate_prior_findings<'a>(
        &'a self,
        project_id: &'a str,
        current_scan_id: &'a str,
        strategy: InvalidationStrategy,
    ) -> BoxFuture<'a, Result<usize, StoreError>>;

    /// 이슈를 일괄 삽입하고 실제로 삽입된 수를 반환합니다.
    fn insert_issues(&self, issues: Vec<Issue>) -> BoxFuture<'_, Result<usize, StoreError>>;

    /// 특정 스캔이 기록한 이슈를 삽입 순서대로 반환합니다.
    fn issues_for_scan<'a>(
        &'a self,
        scan_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Issue>, StoreError>>;

    /// 스캔과 해당 프로젝트의 이슈를 정렬하여 반환합니다.
    fn scan_results<'a>(
        &'a self,
        scan_id: &'a str,
    ) -> BoxFuture<'a, Result<ScanResults, StoreError>>;

    /// 프로젝트의 스캔 이력을 최신순으로 반환합니다.
    fn scan_history<'a>(
        &'a self,
        project_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Scan>, StoreError>>;

    /// 저장소 상태를 확인합니다.
    fn health_check(&self) -> BoxFuture<'_, HealthStatus>;
}

/// 결과 조회용 이슈 정렬
///
/// 심각도 내림차순 (인식 불가 심각도는 마지막), 파일 경로 오름차순,
/// 줄 번호 집합 오름차순.
pub fn compare_issues(a: &Issue, b: &Issue) -> Ordering {
    b.severity_level()
        .cmp(&a.severity_level())
        .then_with(|| a.file_path.cmp(&b.file_path))
        .then_with(|| a.lines.iter().cmp(b.lines.iter()))
}

/// 스캔 이력 정렬: 시작 시각 내림차순, 시작 전 스캔은 마지막
pub fn compare_history(a: &Scan, b: &Scan) -> Ordering {
    b.started_at.cmp(&a.started_at)
}
