//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 프로젝트, 매니페스트, 스캔, 이슈, 요약 등 스캔 엔진과 결과 저장소가
//! 공유하는 데이터 구조를 정의합니다. 외부 계약과 맞추기 위해
//! 직렬화 시 camelCase 키를 사용합니다.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// 심각도 레벨
///
/// `Ord` 구현으로 심각도 비교가 가능합니다 (`Info < Low < Medium < High < Critical`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// 정보성 발견
    #[default]
    Info,
    /// 낮은 심각도
    Low,
    /// 중간 심각도
    Medium,
    /// 높은 심각도
    High,
    /// 치명적 — 즉시 대응 필요
    Critical,
}

impl Severity {
    /// 문자열에서 심각도를 파싱합니다.
    ///
    /// 대소문자와 앞뒤 공백을 무시합니다. 알 수 없는 값이면 `None`입니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "info" | "informational" => Some(Self::Info),
            "low" => Some(Self::Low),
            "medium" | "med" | "moderate" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }

    /// 저장 시 사용하는 대문자 레이블
    pub fn as_upper(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "Info"),
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}

/// 매니페스트 항목
///
/// 프로젝트 루트 기준 상대 경로와 디렉토리 여부, 크기를 담습니다.
/// 매니페스트 순서가 순회 순서이자 진행률 기준입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    /// 루트 기준 상대 경로
    pub path: String,
    /// 디렉토리 여부
    pub is_dir: bool,
    /// 파일 크기 (바이트, 디렉토리는 0)
    #[serde(default)]
    pub size: u64,
}

impl ManifestEntry {
    /// 파일 항목을 생성합니다.
    pub fn file(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
            size,
        }
    }

    /// 디렉토리 항목을 생성합니다.
    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_dir: true,
            size: 0,
        }
    }
}

/// 프로젝트
///
/// 매니페스트는 업로드 시점에 외부에서 만들어진 원본 JSON 그대로 보관되며,
/// 스캔 시작 시 [`Project::manifest_entries`]로 해석됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// 프로젝트 ID
    pub id: String,
    /// 표시용 이름
    pub name: String,
    /// 압축 해제된 소스 루트
    pub root_path: PathBuf,
    /// 원본 매니페스트 (없으면 `None`)
    #[serde(default)]
    pub manifest: Option<serde_json::Value>,
}

impl Project {
    /// 매니페스트 JSON을 항목 목록으로 해석합니다.
    ///
    /// # Errors
    ///
    /// - 매니페스트가 없거나 `null`이면 [`ScanError::ManifestMissing`]
    /// - 배열이 아니거나 항목 형식이 맞지 않으면 [`ScanError::ManifestMalformed`]
    pub fn manifest_entries(&self) -> Result<Vec<ManifestEntry>, ScanError> {
        let raw = match &self.manifest {
            None | Some(serde_json::Value::Null) => {
                return Err(ScanError::ManifestMissing {
                    project_id: self.id.clone(),
                });
            }
            Some(value) => value,
        };

        if !raw.is_array() {
            return Err(ScanError::ManifestMalformed {
                project_id: self.id.clone(),
                reason: "expected a sequence of manifest entries".to_owned(),
            });
        }

        serde_json::from_value(raw.clone()).map_err(|e| ScanError::ManifestMalformed {
            project_id: self.id.clone(),
            reason: e.to_string(),
        })
    }
}

/// 스캔 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// 대기열에 등록됨
    Queued,
    /// 실행 중
    Running,
    /// 정상 완료
    Done,
    /// 실패
    Failed,
    /// 협력적 취소로 중단됨
    Cancelled,
}

impl ScanStatus {
    /// 상태 문자열
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// 종료 상태 여부 (종료 후에는 레코드가 변경되지 않음)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }

    /// 상태 전이 허용 여부
    ///
    /// `queued -> running`, `queued -> failed|cancelled`,
    /// `running -> done|failed|cancelled`만 허용합니다.
    pub fn can_transition_to(&self, next: ScanStatus) -> bool {
        match self {
            Self::Queued => matches!(next, Self::Running | Self::Failed | Self::Cancelled),
            Self::Running => next.is_terminal(),
            Self::Done | Self::Failed | Self::Cancelled => false,
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 스캔 레코드
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scan {
    /// 스캔 ID
    pub id: String,
    /// 대상 프로젝트 ID
    pub project_id: String,
    /// 현재 상태
    pub status: ScanStatus,
    /// 진행률 (0-100, 단조 증가)
    pub progress: u8,
    /// 실행 시작 시각
    pub started_at: Option<DateTime<Utc>>,
    /// 종료 시각
    pub finished_at: Option<DateTime<Utc>>,
    /// 최종 요약 (종료 상태에서만 존재)
    pub results: Option<Summary>,
}

impl Scan {
    /// `queued` 상태의 새 스캔을 생성합니다.
    pub fn queued(id: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            status: ScanStatus::Queued,
            progress: 0,
            started_at: None,
            finished_at: None,
            results: None,
        }
    }
}

impl fmt::Display for Scan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scan {} (project {}) status={} progress={}%",
            self.id, self.project_id, self.status, self.progress,
        )
    }
}

/// 보안 이슈 레코드
///
/// 오라클이 보고한 발견 사항 하나를 스캔/파일 단위로 태깅한 결과입니다.
/// 생성 후에는 수정되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// 이슈 ID
    pub id: String,
    /// 소속 스캔 ID
    pub scan_id: String,
    /// 소속 프로젝트 ID
    pub project_id: String,
    /// 루트 기준 파일 경로
    pub file_path: String,
    /// 관련 줄 번호
    pub lines: BTreeSet<u32>,
    /// 취약점 분류 (예: "SQL Injection")
    #[serde(rename = "type")]
    pub issue_type: String,
    /// 심각도 (대문자로 정규화된 원본 문자열)
    pub severity: String,
    /// 짧은 제목
    #[serde(default)]
    pub name: Option<String>,
    /// 상세 설명
    pub description: String,
    /// 권장 조치
    pub recommendation: String,
    /// CWE 식별자
    #[serde(default)]
    pub cwe: Option<String>,
    /// OWASP 분류
    #[serde(default)]
    pub owasp: Option<String>,
}

impl Issue {
    /// 인식 가능한 심각도이면 해당 레벨을 반환합니다.
    pub fn severity_level(&self) -> Option<Severity> {
        Severity::from_str_loose(&self.severity)
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} in {} (cwe: {})",
            self.severity,
            self.issue_type,
            self.file_path,
            self.cwe.as_deref().unwrap_or("N/A"),
        )
    }
}

/// 심각도별 이슈 수
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    /// CRITICAL 수
    pub critical: usize,
    /// HIGH 수
    pub high: usize,
    /// MEDIUM 수
    pub medium: usize,
    /// LOW 수
    pub low: usize,
    /// INFO 수
    pub info: usize,
}

impl SeverityCounts {
    /// 해당 심각도 카운트를 1 증가시킵니다.
    pub fn increment(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
            Severity::Info => self.info += 1,
        }
    }

    /// 전체 합계
    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.info
    }
}

/// 스캔 요약
///
/// 스캔 종료 시 한 번 계산되어 `Scan.results`에 저장됩니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// 실패 사유 (실패/취소 시에만 존재)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 전체 이슈 수
    pub total_issues: usize,
    /// 심각도별 이슈 수
    pub issues_by_severity: SeverityCounts,
    /// 분류별 이슈 수
    pub issues_by_type: BTreeMap<String, usize>,
    /// 분석을 시도한 파일 수
    pub scanned_files: usize,
}

impl Summary {
    /// 카운트가 모두 0인 실패 요약을 생성합니다.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// 대기열 작업 페이로드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanJob {
    /// 실행할 스캔 ID
    pub scan_id: String,
    /// 대상 프로젝트 ID
    pub project_id: String,
}

impl ScanJob {
    /// 새 작업을 생성합니다.
    pub fn new(scan_id: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            scan_id: scan_id.into(),
            project_id: project_id.into(),
        }
    }
}

impl fmt::Display for ScanJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scan={} project={}", self.scan_id, self.project_id)
    }
}
