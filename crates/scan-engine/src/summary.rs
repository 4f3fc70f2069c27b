//! 스캔 요약 계산

use codewarden_core::types::{Issue, Summary};

/// 스캔 중 메모리에 누적한 이슈로 요약을 계산합니다.
///
/// 인식할 수 없는 심각도의 이슈는 `total_issues`와 `issues_by_type`에는
/// 포함되지만 심각도 버킷에는 포함되지 않습니다.
pub fn summarize(issues: &[Issue], scanned_files: usize) -> Summary {
    let mut summary = Summary {
        total_issues: issues.len(),
        scanned_files,
        ..Summary::default()
    };

    for issue in issues {
        if let Some(level) = issue.severity_level() {
            summary.issues_by_severity.increment(level);
        }
        *summary
            .issues_by_type
            .entry(issue.issue_type.clone())
            .or_insert(0) += 1;
    }

    summary
}
