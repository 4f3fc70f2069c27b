//! 분석 오라클 -- 파일 하나를 외부 LLM에 보내고 findings를 받아오는 경계
//!
//! 오라클은 `(파일명, 소스 텍스트) -> {issues[]}` 함수로 취급되는 블랙박스입니다.
//! 출력은 신뢰할 수 없으므로 러너는 전송 실패(`Err(OracleError)`)와
//! 응답 해석 실패([`OracleResponse::ParseError`], [`OracleResponse::SchemaError`])를
//! 구분해서 처리합니다.
//!
//! # 구성
//!
//! - [`prompt`]: 고정 시스템 지시문과 사용자 메시지 생성
//! - [`response`]: 추론 마커 제거, JSON 복구, findings 스키마 검증
//! - [`client`]: OpenAI 호환 chat-completions HTTP 클라이언트

pub mod client;
pub mod prompt;
pub mod response;

use serde::{Deserialize, Deserializer, Serialize};

use codewarden_core::error::OracleError;
use codewarden_core::pipeline::BoxFuture;

pub use client::HttpOracleClient;
pub use response::parse_findings;

/// 오라클이 보고한 발견 사항 하나
///
/// `type`과 `severity`는 필수이며, 나머지 필드는 누락 시 기본값을 사용합니다.
/// 심각도는 자유 형식 문자열 그대로 보관하고 정규화는 러너가 담당합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// 짧은 제목
    #[serde(default, deserialize_with = "de_opt_text")]
    pub name: Option<String>,
    /// 취약점 분류
    #[serde(rename = "type")]
    pub issue_type: String,
    /// 심각도 (자유 형식)
    pub severity: String,
    /// CWE 식별자
    #[serde(default, deserialize_with = "de_opt_text")]
    pub cwe: Option<String>,
    /// OWASP 분류
    #[serde(default, deserialize_with = "de_opt_text")]
    pub owasp: Option<String>,
    /// 관련 줄 번호
    #[serde(default, deserialize_with = "de_lines")]
    pub lines: Vec<u32>,
    /// 설명
    #[serde(default)]
    pub description: String,
    /// 권장 조치
    #[serde(default)]
    pub recommendation: String,
}

/// 파일 하나에 대한 findings 목록
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingsResult {
    /// 발견 사항 목록
    pub issues: Vec<Finding>,
}

/// 오라클 응답 해석 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleResponse {
    /// 스키마를 만족하는 findings
    Findings(FindingsResult),
    /// 추론 마커 제거 후에도 JSON으로 해석할 수 없음
    ParseError {
        /// 실패 사유
        reason: String,
    },
    /// JSON이지만 `issues` 배열이 없거나 항목 형식이 틀림
    SchemaError {
        /// 스키마 위반 사유
        reason: String,
    },
}

impl OracleResponse {
    /// 결과 종류 레이블 (로그/메트릭용)
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Findings(_) => "findings",
            Self::ParseError { .. } => "parse",
            Self::SchemaError { .. } => "schema",
        }
    }
}

/// 분석 오라클 trait
///
/// `Arc<dyn AnalysisOracle>`로 러너에 주입되므로 [`BoxFuture`]를 반환합니다.
pub trait AnalysisOracle: Send + Sync {
    /// 오라클 이름 (로그용)
    fn name(&self) -> &str;

    /// 파일 하나를 분석합니다.
    ///
    /// # Errors
    ///
    /// 전송 실패, 타임아웃, 2xx가 아닌 응답은 `OracleError`로 반환합니다.
    fn analyze<'a>(
        &'a self,
        filename: &'a str,
        source: &'a str,
    ) -> BoxFuture<'a, Result<OracleResponse, OracleError>>;
}

/// 문자열, 숫자, null을 모두 허용하는 선택 텍스트 필드
fn de_opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// 줄 번호 배열 (숫자 문자열과 단일 숫자도 허용, 해석 불가 항목은 무시)
fn de_lines<'de, D>(deserializer: D) -> Result<Vec<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let items = match value {
        Some(serde_json::Value::Array(items)) => items,
        Some(single @ serde_json::Value::Number(_)) => vec![single],
        _ => return Ok(Vec::new()),
    };

    Ok(items
        .iter()
        .filter_map(|item| match item {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        })
        .filter_map(|n| u32::try_from(n).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finding_deserializes_full_contract() {
        let json = serde_json::json!({
            "name": "SQL built from request",
            "type": "Injection",
            "severity": "high",
            "cwe": "CWE-89",
            "owasp": "A03:2021",
            "lines": [12, 14],
            "description": "query concatenates user input",
            "recommendation": "use bound parameters"
        });
        let finding: Finding = serde_json::from_value(json).unwrap();
        assert_eq!(finding.issue_type, "Injection");
        assert_eq!(finding.cwe.as_deref(), Some("CWE-89"));
        assert_eq!(finding.lines, vec![12, 14]);
    }

    #[test]
    fn finding_tolerates_loose_optional_fields() {
        let json = serde_json::json!({
            "type": "XSS",
            "severity": "MEDIUM",
            "cwe": null,
            "owasp": "null",
            "lines": ["7", "x", 9, -1]
        });
        let finding: Finding = serde_json::from_value(json).unwrap();
        assert_eq!(finding.cwe, None);
        assert_eq!(finding.owasp, None);
        assert_eq!(finding.lines, vec![7, 9]);
        assert!(finding.description.is_empty());
    }

    #[test]
    fn finding_accepts_numeric_cwe_and_single_line() {
        let json = serde_json::json!({
            "type": "Secrets",
            "severity": "critical",
            "cwe": 798,
            "lines": 3
        });
        let finding: Finding = serde_json::from_value(json).unwrap();
        assert_eq!(finding.cwe.as_deref(), Some("798"));
        assert_eq!(finding.lines, vec![3]);
    }

    #[test]
    fn finding_requires_type_and_severity() {
        let json = serde_json::json!({ "severity": "low" });
        assert!(serde_json::from_value::<Finding>(json).is_err());

        let json = serde_json::json!({ "type": "XSS" });
        assert!(serde_json::from_value::<Finding>(json).is_err());
    }

    #[test]
    fn response_kind_labels() {
        assert_eq!(
            OracleResponse::Findings(FindingsResult::default()).kind(),
            "findings"
        );
        assert_eq!(
            OracleResponse::ParseError {
                reason: String::new()
            }
            .kind(),
            "parse"
        );
        assert_eq!(
            OracleResponse::SchemaError {
                reason: String::new()
            }
            .kind(),
            "schema"
        );
    }
}
