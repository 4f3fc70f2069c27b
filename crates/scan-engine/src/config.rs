//! 스캔 엔진 설정
//!
//! [`ScanEngineConfig`]는 core의 `[oracle]`, `[queue]`, `[scan]` 섹션을
//! 타입이 있는 값으로 변환한 설정입니다.
//!
//! # 사용 예시
//!
//! ```
//! use codewarden_scan_engine::{ScanEngineConfig, ScanEngineConfigBuilder};
//! use codewarden_scan_engine::store::InvalidationStrategy;
//!
//! // 기본값으로 생성
//! let config = ScanEngineConfig::default();
//! config.validate().unwrap();
//!
//! // 빌더로 생성
//! let config = ScanEngineConfigBuilder::new()
//!     .invalidation(InvalidationStrategy::PriorScansOnly)
//!     .request_timeout_secs(60)
//!     .build()
//!     .unwrap();
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use codewarden_core::config::WardenConfig;

use crate::error::ScanEngineError;
use crate::progress::ProgressPolicy;
use crate::store::InvalidationStrategy;

/// 설정 상한값 상수
const MAX_REQUEST_TIMEOUT_SECS: u64 = 3600;
const MAX_CONCURRENCY: usize = 64;
const MAX_QUEUE_CAPACITY: usize = 100_000;
const MAX_FILE_SIZE: usize = 100 * 1024 * 1024; // 100 MB

/// 스캔 엔진 설정
///
/// # 필드
///
/// - **oracle_endpoint / model / api_key**: 분석 오라클 접속 정보
/// - **temperature / max_tokens**: 요청 파라미터
/// - **request_timeout_secs**: 오라클 요청 타임아웃
/// - **concurrency**: 동시에 실행할 스캔 수 (기본 1)
/// - **queue_capacity**: 대기열 용량
/// - **invalidation**: 새 스캔 시작 시 이전 이슈 삭제 범위
/// - **progress_policy**: 진행률 기록 정책
/// - **max_file_size**: 오라클로 보낼 파일 최대 크기
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanEngineConfig {
    /// chat-completions 엔드포인트 URL
    pub oracle_endpoint: String,
    /// 모델명
    pub model: String,
    /// Bearer API 키 (빈 문자열이면 생략)
    pub api_key: String,
    /// 샘플링 온도
    pub temperature: f32,
    /// 응답 최대 토큰 수
    pub max_tokens: u32,
    /// 오라클 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// 동시 실행 스캔 수
    pub concurrency: usize,
    /// 대기열 용량
    pub queue_capacity: usize,
    /// 이전 결과 무효화 전략
    pub invalidation: InvalidationStrategy,
    /// 진행률 기록 정책
    pub progress_policy: ProgressPolicy,
    /// 분석 대상 파일 최대 크기 (바이트)
    pub max_file_size: usize,
}

impl Default for ScanEngineConfig {
    fn default() -> Self {
        Self::from_core(&WardenConfig::default())
    }
}

impl ScanEngineConfig {
    /// core의 `WardenConfig`에서 엔진 설정을 생성합니다.
    ///
    /// 알 수 없는 전략 문자열은 기본 전략으로 대체됩니다.
    pub fn from_core(core: &WardenConfig) -> Self {
        Self {
            oracle_endpoint: core.oracle.endpoint.clone(),
            model: core.oracle.model.clone(),
            api_key: core.oracle.api_key.clone(),
            temperature: core.oracle.temperature,
            max_tokens: core.oracle.max_tokens,
            request_timeout_secs: core.oracle.request_timeout_secs,
            concurrency: core.queue.concurrency,
            queue_capacity: core.queue.capacity,
            invalidation: InvalidationStrategy::from_str_loose(&core.scan.invalidation)
                .unwrap_or_default(),
            progress_policy: ProgressPolicy::from_str_loose(&core.scan.progress_policy)
                .unwrap_or_default(),
            max_file_size: core.scan.max_file_size,
        }
    }

    /// 오라클 요청 타임아웃
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// 설정 값의 유효성을 검증합니다.
    ///
    /// # 검증 규칙
    ///
    /// - `oracle_endpoint`: http:// 또는 https:// URL
    /// - `model`: 비어 있으면 안 됨
    /// - `request_timeout_secs`: 1-3600
    /// - `concurrency`: 1-64
    /// - `queue_capacity`: 1-100000
    /// - `max_file_size`: 1-104857600 (100MB)
    pub fn validate(&self) -> Result<(), ScanEngineError> {
        if !(self.oracle_endpoint.starts_with("http://")
            || self.oracle_endpoint.starts_with("https://"))
        {
            return Err(config_error(
                "oracle_endpoint",
                "must be an http:// or https:// URL".to_owned(),
            ));
        }

        if self.model.trim().is_empty() {
            return Err(config_error("model", "must not be empty".to_owned()));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(config_error(
                "temperature",
                "must be between 0.0 and 2.0".to_owned(),
            ));
        }

        if self.max_tokens == 0 {
            return Err(config_error("max_tokens", "must be greater than 0".to_owned()));
        }

        if self.request_timeout_secs == 0 || self.request_timeout_secs > MAX_REQUEST_TIMEOUT_SECS {
            return Err(config_error(
                "request_timeout_secs",
                format!("must be 1-{MAX_REQUEST_TIMEOUT_SECS}"),
            ));
        }

        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(config_error(
                "concurrency",
                format!("must be 1-{MAX_CONCURRENCY}"),
            ));
        }

        if self.queue_capacity == 0 || self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(config_error(
                "queue_capacity",
                format!("must be 1-{MAX_QUEUE_CAPACITY}"),
            ));
        }

        if self.max_file_size == 0 || self.max_file_size > MAX_FILE_SIZE {
            return Err(config_error(
                "max_file_size",
                format!("must be 1-{MAX_FILE_SIZE}"),
            ));
        }

        Ok(())
    }
}

fn config_error(field: &str, reason: String) -> ScanEngineError {
    ScanEngineError::Config {
        field: field.to_owned(),
        reason,
    }
}

/// [`ScanEngineConfig`] 빌더
///
/// 유연한 설정 구성 및 빌드 시 유효성 검증을 제공합니다.
#[derive(Default)]
pub struct ScanEngineConfigBuilder {
    config: ScanEngineConfig,
}

impl ScanEngineConfigBuilder {
    /// 기본값을 가진 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 오라클 엔드포인트를 설정합니다.
    pub fn oracle_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.oracle_endpoint = endpoint.into();
        self
    }

    /// 모델명을 설정합니다.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// API 키를 설정합니다.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    /// 응답 최대 토큰 수를 설정합니다.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    /// 요청 타임아웃(초)을 설정합니다.
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    /// 동시 실행 스캔 수를 설정합니다.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// 대기열 용량을 설정합니다.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// 이전 결과 무효화 전략을 설정합니다.
    pub fn invalidation(mut self, strategy: InvalidationStrategy) -> Self {
        self.config.invalidation = strategy;
        self
    }

    /// 진행률 기록 정책을 설정합니다.
    pub fn progress_policy(mut self, policy: ProgressPolicy) -> Self {
        self.config.progress_policy = policy;
        self
    }

    /// 최대 파일 크기(바이트)를 설정합니다.
    pub fn max_file_size(mut self, size: usize) -> Self {
        self.config.max_file_size = size;
        self
    }

    /// 설정을 검증하고 빌드합니다.
    ///
    /// # Errors
    ///
    /// 유효성 검증 실패 시 `ScanEngineError::Config` 반환
    pub fn build(self) -> Result<ScanEngineConfig, ScanEngineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
