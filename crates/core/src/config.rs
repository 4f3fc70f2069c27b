//! 설정 관리 — codewarden.toml 파싱 및 런타임 설정
//!
//! [`WardenConfig`]는 모든 컴포넌트의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`CODEWARDEN_ORACLE_MODEL=qwen/qwen3-32b` 형식)
//! 3. 설정 파일 (`codewarden.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), codewarden_core::error::WardenError> {
//! use codewarden_core::config::WardenConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = WardenConfig::load("codewarden.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = WardenConfig::parse("[queue]\nconcurrency = 1")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, WardenError};

/// 오라클 요청 타임아웃 상한 (초)
const MAX_REQUEST_TIMEOUT_SECS: u64 = 3600;
/// 동시 실행 스캔 수 상한
const MAX_CONCURRENCY: usize = 64;
/// 대기열 용량 상한
const MAX_QUEUE_CAPACITY: usize = 100_000;
/// 분석 대상 파일 크기 상한 (바이트)
const MAX_FILE_SIZE_LIMIT: usize = 100 * 1024 * 1024;

/// codewarden 통합 설정
///
/// `codewarden.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 컴포넌트는 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WardenConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 분석 오라클 설정
    #[serde(default)]
    pub oracle: OracleConfig,
    /// 작업 대기열 설정
    #[serde(default)]
    pub queue: QueueConfig,
    /// 스캔 실행 설정
    #[serde(default)]
    pub scan: ScanConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl WardenConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, WardenError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, WardenError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                WardenError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                WardenError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, WardenError> {
        toml::from_str(toml_str).map_err(|e| {
            WardenError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `CODEWARDEN_{SECTION}_{FIELD}`
    /// 예: `CODEWARDEN_ORACLE_ENDPOINT=http://10.0.0.5:1234/v1/chat/completions`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "CODEWARDEN_GENERAL_LOG_LEVEL");
        override_string(
            &mut self.general.log_format,
            "CODEWARDEN_GENERAL_LOG_FORMAT",
        );

        // Oracle
        override_string(&mut self.oracle.endpoint, "CODEWARDEN_ORACLE_ENDPOINT");
        override_string(&mut self.oracle.model, "CODEWARDEN_ORACLE_MODEL");
        override_string(&mut self.oracle.api_key, "CODEWARDEN_ORACLE_API_KEY");
        override_f32(
            &mut self.oracle.temperature,
            "CODEWARDEN_ORACLE_TEMPERATURE",
        );
        override_u32(&mut self.oracle.max_tokens, "CODEWARDEN_ORACLE_MAX_TOKENS");
        override_u64(
            &mut self.oracle.request_timeout_secs,
            "CODEWARDEN_ORACLE_REQUEST_TIMEOUT_SECS",
        );

        // Queue
        override_usize(&mut self.queue.concurrency, "CODEWARDEN_QUEUE_CONCURRENCY");
        override_usize(&mut self.queue.capacity, "CODEWARDEN_QUEUE_CAPACITY");

        // Scan
        override_string(&mut self.scan.invalidation, "CODEWARDEN_SCAN_INVALIDATION");
        override_string(
            &mut self.scan.progress_policy,
            "CODEWARDEN_SCAN_PROGRESS_POLICY",
        );
        override_usize(&mut self.scan.max_file_size, "CODEWARDEN_SCAN_MAX_FILE_SIZE");

        // Metrics
        override_bool(&mut self.metrics.enabled, "CODEWARDEN_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "CODEWARDEN_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "CODEWARDEN_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), WardenError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        // oracle 검증
        if !(self.oracle.endpoint.starts_with("http://")
            || self.oracle.endpoint.starts_with("https://"))
        {
            return Err(invalid(
                "oracle.endpoint",
                "must be an http:// or https:// URL".to_owned(),
            ));
        }

        if self.oracle.model.trim().is_empty() {
            return Err(invalid("oracle.model", "must not be empty".to_owned()));
        }

        if !(0.0..=2.0).contains(&self.oracle.temperature) {
            return Err(invalid(
                "oracle.temperature",
                "must be between 0.0 and 2.0".to_owned(),
            ));
        }

        if self.oracle.max_tokens == 0 {
            return Err(invalid(
                "oracle.max_tokens",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.oracle.request_timeout_secs == 0
            || self.oracle.request_timeout_secs > MAX_REQUEST_TIMEOUT_SECS
        {
            return Err(invalid(
                "oracle.request_timeout_secs",
                format!("must be 1-{MAX_REQUEST_TIMEOUT_SECS}"),
            ));
        }

        // queue 검증
        if self.queue.concurrency == 0 || self.queue.concurrency > MAX_CONCURRENCY {
            return Err(invalid(
                "queue.concurrency",
                format!("must be 1-{MAX_CONCURRENCY}"),
            ));
        }

        if self.queue.capacity == 0 || self.queue.capacity > MAX_QUEUE_CAPACITY {
            return Err(invalid(
                "queue.capacity",
                format!("must be 1-{MAX_QUEUE_CAPACITY}"),
            ));
        }

        // scan 검증
        let valid_invalidation = ["project", "prior-scans"];
        if !valid_invalidation.contains(&self.scan.invalidation.as_str()) {
            return Err(invalid(
                "scan.invalidation",
                format!("must be one of: {}", valid_invalidation.join(", ")),
            ));
        }

        let valid_policies = ["processed", "every-entry"];
        if !valid_policies.contains(&self.scan.progress_policy.as_str()) {
            return Err(invalid(
                "scan.progress_policy",
                format!("must be one of: {}", valid_policies.join(", ")),
            ));
        }

        if self.scan.max_file_size == 0 || self.scan.max_file_size > MAX_FILE_SIZE_LIMIT {
            return Err(invalid(
                "scan.max_file_size",
                format!("must be 1-{MAX_FILE_SIZE_LIMIT}"),
            ));
        }

        // metrics 검증
        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid(
                "metrics.port",
                "must be non-zero when metrics are enabled".to_owned(),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> WardenError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 분석 오라클 설정
///
/// OpenAI 호환 chat-completions 엔드포인트를 가리킵니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// chat-completions 엔드포인트 URL
    pub endpoint: String,
    /// 모델명
    pub model: String,
    /// Bearer API 키 (빈 문자열이면 Authorization 헤더 생략)
    pub api_key: String,
    /// 샘플링 온도
    pub temperature: f32,
    /// 응답 최대 토큰 수
    pub max_tokens: u32,
    /// 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:1234/v1/chat/completions".to_owned(),
            model: "qwen/qwen3-32b".to_owned(),
            api_key: String::new(),
            temperature: 0.0,
            max_tokens: 5000,
            request_timeout_secs: 300,
        }
    }
}

/// 작업 대기열 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// 동시에 실행할 수 있는 스캔 수 (기본 1 = 전역 단일 워커)
    pub concurrency: usize,
    /// 대기열 용량
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            capacity: 1024,
        }
    }
}

/// 스캔 실행 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// 이전 결과 무효화 전략 (project, prior-scans)
    pub invalidation: String,
    /// 진행률 기록 정책 (processed, every-entry)
    pub progress_policy: String,
    /// 분석 대상 파일 최대 크기 (바이트)
    pub max_file_size: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            invalidation: "project".to_owned(),
            progress_policy: "processed".to_owned(),
            max_file_size: 1024 * 1024, // 1 MB
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 수신 주소
    pub listen_addr: String,
    /// 수신 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_u32(target: &mut u32, env_key: &str) {
    override_parsed(target, env_key, "u32");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

fn override_f32(target: &mut f32, env_key: &str) {
    override_parsed(target, env_key, "f32");
}
