//! 에러 타입 — 도메인별 에러 정의

/// codewarden 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 생명주기 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 결과 저장소 에러
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// 분석 오라클 에러
    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    /// 스캔 실행 에러
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 생명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 실행 중
    #[error("pipeline is already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline is not running")]
    NotRunning,

    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),
}

/// 결과 저장소 에러
///
/// 저장소 에러는 항상 스캔 전체를 실패시킵니다 (파일 단위 격리 대상이 아님).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// 프로젝트를 찾을 수 없음
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    /// 스캔을 찾을 수 없음
    #[error("scan not found: {0}")]
    ScanNotFound(String),

    /// 이미 존재하는 레코드
    #[error("record already exists: {0}")]
    AlreadyExists(String),

    /// 허용되지 않는 상태 전이
    #[error("invalid status transition for scan {scan_id}: {from} -> {to}")]
    InvalidTransition {
        scan_id: String,
        from: String,
        to: String,
    },

    /// 저장소 접근 불가
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// 분석 오라클 에러
///
/// 전송 계층 실패를 나타냅니다. 응답 본문 파싱 실패는 에러가 아니라
/// 오라클 결과 타입의 `ParseError`/`SchemaError` 변형으로 표현됩니다.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// 요청 전송 실패 (연결 거부, DNS 등)
    #[error("oracle transport error: {0}")]
    Transport(String),

    /// 요청 시간 초과
    #[error("oracle request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// 2xx가 아닌 HTTP 응답
    #[error("oracle HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// 채팅 완료 응답 형식이 아님
    #[error("invalid oracle response: {0}")]
    InvalidResponse(String),
}

/// 스캔 실행 에러 (스캔 전체 실패 사유)
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// 프로젝트에 매니페스트가 없음
    #[error("manifest missing for project {project_id}")]
    ManifestMissing { project_id: String },

    /// 매니페스트가 ManifestEntry 시퀀스가 아님
    #[error("manifest malformed for project {project_id}: {reason}")]
    ManifestMalformed { project_id: String, reason: String },

    /// 취소됨
    #[error("scan cancelled")]
    Cancelled,

    /// 기타 실패
    #[error("scan failed: {0}")]
    Failed(String),
}
