//! 스캔 엔진 에러 타입
//!
//! [`ScanEngineError`]는 스캔 엔진 내에서 발생할 수 있는 모든 에러를 나타냅니다.
//! `From<ScanEngineError> for WardenError` 구현을 통해 `?` 연산자로
//! 상위 에러 타입으로 자연스럽게 전파됩니다.
//!
//! # 에러 카테고리
//!
//! - **파일 단위 (복구 가능)**: `Io`, `FileTooBig`, `Oracle`, `MalformedFindings`
//! - **스캔 단위 (치명적)**: `Store`, `Scan`
//! - **대기열**: `QueueFull`, `QueueClosed`
//! - **설정**: `Config`

use codewarden_core::error::{
    ConfigError, OracleError, PipelineError, ScanError, StoreError, WardenError,
};

/// 스캔 엔진 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ScanEngineError {
    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 결과 저장소 에러
    #[error(transparent)]
    Store(#[from] StoreError),

    /// 오라클 전송 에러
    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// 스캔 실행 에러
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// 오라클 응답이 findings 스키마를 따르지 않음
    #[error("malformed findings for {path}: {reason}")]
    MalformedFindings {
        /// 분석 대상 파일 경로
        path: String,
        /// 스키마 위반 사유
        reason: String,
    },

    /// 파일 I/O 에러
    #[error("io error: {path}: {source}")]
    Io {
        /// 관련 파일 경로
        path: String,
        /// 원본 I/O 에러
        source: std::io::Error,
    },

    /// 파일 크기 초과
    #[error("file too large: {path}: {size} bytes (max: {max})")]
    FileTooBig {
        /// 파일 경로
        path: String,
        /// 실제 파일 크기 (바이트)
        size: u64,
        /// 최대 허용 크기 (바이트)
        max: usize,
    },

    /// 대기열이 가득 참
    #[error("scan queue is full (capacity: {capacity})")]
    QueueFull {
        /// 대기열 용량
        capacity: usize,
    },

    /// 대기열이 닫힘 (워커 정지)
    #[error("scan queue is closed")]
    QueueClosed,
}

impl ScanEngineError {
    /// 협력적 취소로 인한 에러인지 반환합니다.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Scan(ScanError::Cancelled))
    }
}

impl From<ScanEngineError> for WardenError {
    fn from(err: ScanEngineError) -> Self {
        match err {
            ScanEngineError::Config { field, reason } => {
                WardenError::Config(ConfigError::InvalidValue { field, reason })
            }
            ScanEngineError::Store(e) => WardenError::Store(e),
            ScanEngineError::Oracle(e) => WardenError::Oracle(e),
            ScanEngineError::Scan(e) => WardenError::Scan(e),
            ScanEngineError::MalformedFindings { path, reason } => WardenError::Oracle(
                OracleError::InvalidResponse(format!("malformed findings for {path}: {reason}")),
            ),
            ScanEngineError::Io { path, source } => WardenError::Scan(ScanError::Failed(
                format!("io error: {path}: {source}"),
            )),
            ScanEngineError::FileTooBig { path, size, max } => WardenError::Scan(
                ScanError::Failed(format!("file too large: {path}: {size} bytes (max: {max})")),
            ),
            ScanEngineError::QueueFull { capacity } => WardenError::Pipeline(
                PipelineError::ChannelSend(format!("scan queue is full (capacity: {capacity})")),
            ),
            ScanEngineError::QueueClosed => WardenError::Pipeline(PipelineError::ChannelSend(
                "scan queue is closed".to_owned(),
            )),
        }
    }
}
