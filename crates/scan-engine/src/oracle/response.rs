//! 오라클 응답 해석
//!
//! 모델 응답은 신뢰할 수 없는 텍스트입니다. 다음 순서로 복구를 시도합니다.
//!
//! 1. `<think>...</think>` 추론 블록 제거
//! 2. 전체 텍스트를 JSON으로 해석
//! 3. ```` ```json ```` 코드 펜스 내부
//! 4. 임의 코드 펜스 내부
//! 5. 첫 번째 `{` 또는 `[`부터 시작하는 첫 JSON 값
//!
//! JSON 값을 얻은 뒤 `issues` 배열과 각 항목의 스키마를 검증합니다.

use serde_json::Value;

use super::{Finding, FindingsResult, OracleResponse};

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// 추론 마커를 제거합니다.
///
/// - 닫힌 `<think>...</think>` 블록은 통째로 제거
/// - 닫히지 않은 `<think>` 이후 텍스트는 버림
/// - 짝 없는 `</think>`가 남아 있으면 마지막 마커 이후 텍스트만 유지
pub fn strip_reasoning(raw: &str) -> String {
    let mut text = raw.to_owned();

    while let Some(start) = text.find(THINK_OPEN) {
        match text[start..].find(THINK_CLOSE) {
            Some(rel_end) => {
                let end = start + rel_end + THINK_CLOSE.len();
                text.replace_range(start..end, "");
            }
            None => {
                text.truncate(start);
                break;
            }
        }
    }

    if let Some(pos) = text.rfind(THINK_CLOSE) {
        text = text[pos + THINK_CLOSE.len()..].to_owned();
    }

    text.trim().to_owned()
}

/// 원본 응답 텍스트를 findings로 해석합니다.
pub fn parse_findings(raw: &str) -> OracleResponse {
    let cleaned = strip_reasoning(raw);
    if cleaned.is_empty() {
        return OracleResponse::ParseError {
            reason: "empty response after removing reasoning".to_owned(),
        };
    }

    let Some(value) = extract_json(&cleaned) else {
        return OracleResponse::ParseError {
            reason: format!("no JSON value in response: {}", preview(&cleaned)),
        };
    };

    validate_findings(value)
}

/// JSON 값을 findings 스키마로 검증합니다.
pub fn validate_findings(value: Value) -> OracleResponse {
    let Value::Object(mut map) = value else {
        return OracleResponse::SchemaError {
            reason: "response is not a JSON object".to_owned(),
        };
    };

    let Some(issues) = map.remove("issues") else {
        return OracleResponse::SchemaError {
            reason: "missing `issues` field".to_owned(),
        };
    };

    let Value::Array(items) = issues else {
        return OracleResponse::SchemaError {
            reason: "`issues` is not an array".to_owned(),
        };
    };

    let mut findings = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<Finding>(item) {
            Ok(finding) => findings.push(finding),
            Err(e) => {
                return OracleResponse::SchemaError {
                    reason: format!("issues[{index}]: {e}"),
                };
            }
        }
    }

    OracleResponse::Findings(FindingsResult { issues: findings })
}

fn extract_json(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }

    if let Some(value) = fenced_block(text, "```json").and_then(parse_value) {
        return Some(value);
    }

    if let Some(value) = fenced_block(text, "```").and_then(parse_value) {
        return Some(value);
    }

    first_json_value(text)
}

fn parse_value(block: &str) -> Option<Value> {
    serde_json::from_str::<Value>(block).ok()
}

/// `marker`로 시작하는 코드 펜스의 내용을 반환합니다.
fn fenced_block<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let start = text.find(marker)? + marker.len();
    let rest = &text[start..];
    // 펜스 첫 줄의 언어 태그는 건너뜀
    let body_start = rest.find('\n').map_or(0, |i| i + 1);
    let body = &rest[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// 텍스트 안의 첫 번째 완결된 JSON 객체/배열을 찾습니다.
fn first_json_value(text: &str) -> Option<Value> {
    for (offset, ch) in text.char_indices() {
        if ch != '{' && ch != '[' {
            continue;
        }
        let mut stream = serde_json::Deserializer::from_str(&text[offset..]).into_iter::<Value>();
        if let Some(Ok(value)) = stream.next() {
            return Some(value);
        }
    }
    None
}

fn preview(text: &str) -> String {
    const MAX: usize = 80;
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_owned(),
    }
}
