//! 진행률 계산
//!
//! 러너는 매니페스트 항목마다 [`EntryOutcome`]을 만들고, [`ProgressTracker`]가
//! 정책에 따라 저장할 진행률 값을 결정합니다. 반환된 값만 저장소에 기록하면
//! 진행률은 항상 단조 증가합니다.

use serde::{Deserialize, Serialize};

/// 매니페스트 항목 하나의 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryOutcome {
    /// 디렉토리 또는 분석 대상이 아닌 파일
    Skipped,
    /// 오라클 분석 완료
    Processed,
    /// 파일 단위 실패 (읽기, 오라클, 스키마 에러)
    Failed,
}

impl EntryOutcome {
    /// 메트릭 레이블 값
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }
}

/// 진행률 기록 정책
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressPolicy {
    /// 건너뛴 항목에서는 진행률을 기록하지 않음
    #[default]
    ProcessedOnly,
    /// 모든 항목에서 진행률을 기록
    EveryEntry,
}

impl ProgressPolicy {
    /// 설정 문자열에서 정책을 파싱합니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "processed" | "processed-only" => Some(Self::ProcessedOnly),
            "every-entry" | "every" | "all" => Some(Self::EveryEntry),
            _ => None,
        }
    }

    /// 설정 문자열
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProcessedOnly => "processed",
            Self::EveryEntry => "every-entry",
        }
    }
}

/// 스캔 하나의 진행률 추적기
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: usize,
    policy: ProgressPolicy,
    last: u8,
}

impl ProgressTracker {
    /// 항목 수와 정책으로 추적기를 생성합니다.
    pub fn new(total: usize, policy: ProgressPolicy) -> Self {
        Self {
            total,
            policy,
            last: 0,
        }
    }

    /// 마지막으로 기록한 진행률
    pub fn last(&self) -> u8 {
        self.last
    }

    /// `index`번째 항목의 결과를 반영하고, 기록해야 할 진행률을 반환합니다.
    ///
    /// 정책상 기록하지 않거나 값이 증가하지 않으면 `None`입니다.
    pub fn record(&mut self, index: usize, outcome: EntryOutcome) -> Option<u8> {
        if outcome == EntryOutcome::Skipped && self.policy == ProgressPolicy::ProcessedOnly {
            return None;
        }

        let value = percent(index + 1, self.total);
        if value > self.last {
            self.last = value;
            Some(value)
        } else {
            None
        }
    }
}

/// `round(done / total * 100)`, 0-100 범위
fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let done = done.min(total) as f64;
    let pct = (done / total as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(1, 8), 13);
        assert_eq!(percent(3, 3), 100);
        assert_eq!(percent(0, 0), 100);
    }

    #[test]
    fn processed_only_skips_skipped_entries() {
        let mut tracker = ProgressTracker::new(4, ProgressPolicy::ProcessedOnly);
        assert_eq!(tracker.record(0, EntryOutcome::Skipped), None);
        assert_eq!(tracker.record(1, EntryOutcome::Processed), Some(50));
        assert_eq!(tracker.record(2, EntryOutcome::Failed), Some(75));
        assert_eq!(tracker.record(3, EntryOutcome::Skipped), None);
        assert_eq!(tracker.last(), 75);
    }

    #[test]
    fn every_entry_records_each_step() {
        let mut tracker = ProgressTracker::new(2, ProgressPolicy::EveryEntry);
        assert_eq!(tracker.record(0, EntryOutcome::Skipped), Some(50));
        assert_eq!(tracker.record(1, EntryOutcome::Skipped), Some(100));
    }

    #[test]
    fn never_reports_a_decrease() {
        let mut tracker = ProgressTracker::new(3, ProgressPolicy::EveryEntry);
        assert_eq!(tracker.record(2, EntryOutcome::Processed), Some(100));
        assert_eq!(tracker.record(0, EntryOutcome::Processed), None);
    }

    #[test]
    fn large_manifest_does_not_repeat_values() {
        let mut tracker = ProgressTracker::new(1000, ProgressPolicy::EveryEntry);
        let writes: Vec<u8> = (0..1000)
            .filter_map(|i| tracker.record(i, EntryOutcome::Processed))
            .collect();
        assert_eq!(writes.len(), 100);
        assert!(writes.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(writes.last(), Some(&100));
    }

    #[test]
    fn policy_parsing() {
        assert_eq!(
            ProgressPolicy::from_str_loose("processed"),
            Some(ProgressPolicy::ProcessedOnly)
        );
        assert_eq!(
            ProgressPolicy::from_str_loose(" Every-Entry "),
            Some(ProgressPolicy::EveryEntry)
        );
        assert_eq!(ProgressPolicy::from_str_loose("sometimes"), None);
        assert_eq!(ProgressPolicy::default().as_str(), "processed");
    }
}
