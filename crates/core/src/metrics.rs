//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 컴포넌트는 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `codewarden_`
//! - 컴포넌트명: `scan_`, `oracle_`, `queue_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(codewarden_core::metrics::SCAN_FILES_ANALYZED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 심각도 레이블 키 (info, low, medium, high, critical, unknown)
pub const LABEL_SEVERITY: &str = "severity";

/// 파일 처리 결과 레이블 키 (skipped, processed, failed)
pub const LABEL_OUTCOME: &str = "outcome";

/// 오라클 실패 종류 레이블 키 (transport, timeout, status, parse, schema)
pub const LABEL_KIND: &str = "kind";

// ─── Scan 메트릭 ───────────────────────────────────────────────────

/// Scan: 실행을 시작한 스캔 수 (counter)
pub const SCANS_STARTED_TOTAL: &str = "codewarden_scans_started_total";

/// Scan: 정상 완료된 스캔 수 (counter)
pub const SCANS_COMPLETED_TOTAL: &str = "codewarden_scans_completed_total";

/// Scan: 실패한 스캔 수 (counter)
pub const SCANS_FAILED_TOTAL: &str = "codewarden_scans_failed_total";

/// Scan: 취소된 스캔 수 (counter)
pub const SCANS_CANCELLED_TOTAL: &str = "codewarden_scans_cancelled_total";

/// Scan: 스캔 소요 시간 (histogram, 초)
pub const SCAN_DURATION_SECONDS: &str = "codewarden_scan_duration_seconds";

/// Scan: 매니페스트 항목 처리 결과 (counter, label: outcome)
pub const SCAN_ENTRIES_TOTAL: &str = "codewarden_scan_entries_total";

/// Scan: 오라클 분석을 마친 파일 수 (counter)
pub const SCAN_FILES_ANALYZED_TOTAL: &str = "codewarden_scan_files_analyzed_total";

/// Scan: 저장된 이슈 수 (counter, label: severity)
pub const SCAN_ISSUES_FOUND_TOTAL: &str = "codewarden_scan_issues_found_total";

// ─── Oracle 메트릭 ─────────────────────────────────────────────────

/// Oracle: 전송한 요청 수 (counter)
pub const ORACLE_REQUESTS_TOTAL: &str = "codewarden_oracle_requests_total";

/// Oracle: 실패 수 (counter, label: kind)
pub const ORACLE_FAILURES_TOTAL: &str = "codewarden_oracle_failures_total";

/// Oracle: 요청 지연 시간 (histogram, 초)
pub const ORACLE_REQUEST_DURATION_SECONDS: &str = "codewarden_oracle_request_duration_seconds";

// ─── Queue 메트릭 ──────────────────────────────────────────────────

/// Queue: 등록된 작업 수 (counter)
pub const QUEUE_JOBS_ENQUEUED_TOTAL: &str = "codewarden_queue_jobs_enqueued_total";

/// Queue: 실패로 기록된 작업 수 (counter)
pub const QUEUE_JOBS_FAILED_TOTAL: &str = "codewarden_queue_jobs_failed_total";

/// Queue: 대기 중인 작업 수 (gauge)
pub const QUEUE_DEPTH: &str = "codewarden_queue_depth";

// ─── Daemon 메트릭 ─────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "codewarden_daemon_uptime_seconds";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 오라클 요청 지연 시간 히스토그램 버킷 (초)
///
/// 로컬 LLM 추론은 파일당 수 초에서 수 분까지 걸립니다.
pub const ORACLE_DURATION_BUCKETS: [f64; 9] = [0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0];

/// 스캔 소요 시간 히스토그램 버킷 (초)
pub const SCAN_DURATION_BUCKETS: [f64; 9] = [
    1.0, 10.0, 30.0, 60.0, 300.0, 600.0, 1800.0, 3600.0, 7200.0,
];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 이 함수는 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `codewarden-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Scan
    describe_counter!(SCANS_STARTED_TOTAL, "Total number of scans that entered running");
    describe_counter!(SCANS_COMPLETED_TOTAL, "Total number of scans finished as done");
    describe_counter!(SCANS_FAILED_TOTAL, "Total number of scans finished as failed");
    describe_counter!(
        SCANS_CANCELLED_TOTAL,
        "Total number of scans finished as cancelled"
    );
    describe_histogram!(SCAN_DURATION_SECONDS, "Wall-clock duration of a scan in seconds");
    describe_counter!(
        SCAN_ENTRIES_TOTAL,
        "Manifest entries visited, labelled by outcome"
    );
    describe_counter!(
        SCAN_FILES_ANALYZED_TOTAL,
        "Files successfully analyzed by the oracle"
    );
    describe_counter!(
        SCAN_ISSUES_FOUND_TOTAL,
        "Issues persisted, labelled by severity"
    );

    // Oracle
    describe_counter!(ORACLE_REQUESTS_TOTAL, "Total requests sent to the analysis oracle");
    describe_counter!(
        ORACLE_FAILURES_TOTAL,
        "Oracle failures, labelled by kind (transport, timeout, status, parse, schema)"
    );
    describe_histogram!(
        ORACLE_REQUEST_DURATION_SECONDS,
        "Analysis oracle request latency in seconds"
    );

    // Queue
    describe_counter!(QUEUE_JOBS_ENQUEUED_TOTAL, "Total scan jobs enqueued");
    describe_counter!(QUEUE_JOBS_FAILED_TOTAL, "Total scan jobs recorded as failed");
    describe_gauge!(QUEUE_DEPTH, "Scan jobs waiting for the worker");

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "codewarden daemon uptime in seconds");
}
