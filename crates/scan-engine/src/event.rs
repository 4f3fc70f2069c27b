//! 스캔 라이프사이클 이벤트
//!
//! 대기열은 작업 상태가 바뀔 때마다 [`ScanEvent`]를 `tokio::mpsc` 채널로 보냅니다.
//! 호스트(데몬)는 이 이벤트로 로그를 남기거나 종료 시점을 판단합니다.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use codewarden_core::types::{ScanJob, Summary};

/// 이벤트 종류
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ScanEventKind {
    /// 대기열에 등록됨
    Queued,
    /// 러너가 작업을 가져감
    Started,
    /// 정상 완료
    Completed {
        /// 최종 요약
        summary: Summary,
    },
    /// 실패
    Failed {
        /// 실패 사유
        error: String,
    },
    /// 취소됨
    Cancelled,
}

impl ScanEventKind {
    /// 종류 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Started => "started",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// 작업이 더 이상 진행되지 않는 종류인지 반환합니다.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Failed { .. } | Self::Cancelled
        )
    }
}

/// 스캔 작업 이벤트
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanEvent {
    /// 이벤트 고유 ID (UUID v4)
    pub id: String,
    /// 발생 시각
    pub timestamp: DateTime<Utc>,
    /// 스캔 ID
    pub scan_id: String,
    /// 프로젝트 ID
    pub project_id: String,
    /// 이벤트 종류
    #[serde(flatten)]
    pub kind: ScanEventKind,
}

impl ScanEvent {
    /// 작업에 대한 새 이벤트를 생성합니다.
    pub fn new(job: &ScanJob, kind: ScanEventKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            scan_id: job.scan_id.clone(),
            project_id: job.project_id.clone(),
            kind,
        }
    }

    /// 종료 이벤트 여부
    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }
}

impl fmt::Display for ScanEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scan {} (project {}) {}",
            self.scan_id,
            self.project_id,
            self.kind.as_str()
        )?;
        if let ScanEventKind::Failed { error } = &self.kind {
            write!(f, ": {error}")?;
        }
        Ok(())
    }
}
