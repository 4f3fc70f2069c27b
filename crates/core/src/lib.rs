//! codewarden 공통 크레이트
//!
//! 스캔 엔진과 데몬이 공유하는 에러 타입, 설정, 도메인 타입,
//! 파이프라인 생명주기 trait, 메트릭 이름을 정의합니다.

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, OracleError, PipelineError, ScanError, StoreError, WardenError};

// 설정
pub use config::WardenConfig;

// 파이프라인 trait
pub use pipeline::{BoxFuture, HealthStatus, Pipeline};

// 도메인 타입
pub use types::{
    Issue, ManifestEntry, Project, Scan, ScanJob, ScanStatus, Severity, SeverityCounts, Summary,
};
