//! OpenAI 호환 chat-completions 클라이언트
//!
//! LM Studio, vLLM, Ollama 등 `/v1/chat/completions`를 제공하는 서버와 통신합니다.
//! 요청은 결정적 설정(temperature 0, 스트리밍 비활성)으로 보내고,
//! 응답 본문의 `choices[0].message.content`를 [`parse_findings`]로 해석합니다.

use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use codewarden_core::error::OracleError;
use codewarden_core::metrics as m;
use codewarden_core::pipeline::BoxFuture;

use super::prompt::{SYSTEM_PROMPT, user_message};
use super::response::parse_findings;
use super::{AnalysisOracle, OracleResponse};
use crate::config::ScanEngineConfig;
use crate::error::ScanEngineError;

/// HTTP 오라클 클라이언트
pub struct HttpOracleClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl HttpOracleClient {
    /// 엔진 설정으로 클라이언트를 생성합니다.
    ///
    /// # Errors
    ///
    /// HTTP 클라이언트 초기화에 실패하면 `ScanEngineError::Config`를 반환합니다.
    pub fn new(config: &ScanEngineConfig) -> Result<Self, ScanEngineError> {
        let timeout = config.request_timeout();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ScanEngineError::Config {
                field: "oracle.endpoint".to_owned(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            endpoint: config.oracle_endpoint.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout,
        })
    }

    /// 요청 대상 엔드포인트
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_request(&self, filename: &str, source: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_owned(),
                    content: Some(SYSTEM_PROMPT.to_owned()),
                },
                ChatMessage {
                    role: "user".to_owned(),
                    content: Some(user_message(filename, source)),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        }
    }

    async fn complete(&self, filename: &str, source: &str) -> Result<String, OracleError> {
        let request = self.build_request(filename, source);

        debug!(
            model = %request.model,
            filename,
            bytes = source.len(),
            "sending file to oracle"
        );

        let mut req = self.client.post(&self.endpoint).json(&request);
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }

        let response = req.send().await.map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.transport_error(e)
            } else {
                OracleError::InvalidResponse(format!("unexpected completion body: {e}"))
            }
        })?;

        Ok(chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default())
    }

    fn transport_error(&self, e: reqwest::Error) -> OracleError {
        if e.is_timeout() {
            OracleError::Timeout {
                secs: self.timeout.as_secs(),
            }
        } else {
            OracleError::Transport(e.to_string())
        }
    }
}

impl AnalysisOracle for HttpOracleClient {
    fn name(&self) -> &str {
        &self.model
    }

    fn analyze<'a>(
        &'a self,
        filename: &'a str,
        source: &'a str,
    ) -> BoxFuture<'a, Result<OracleResponse, OracleError>> {
        Box::pin(async move {
            counter!(m::ORACLE_REQUESTS_TOTAL).increment(1);
            let started = Instant::now();

            let result = self.complete(filename, source).await;
            histogram!(m::ORACLE_REQUEST_DURATION_SECONDS)
                .record(started.elapsed().as_secs_f64());

            let content = match result {
                Ok(content) => content,
                Err(e) => {
                    let kind = match &e {
                        OracleError::Status { .. } => "status",
                        OracleError::Timeout { .. } => "timeout",
                        _ => "transport",
                    };
                    counter!(m::ORACLE_FAILURES_TOTAL, m::LABEL_KIND => kind).increment(1);
                    warn!(filename, error = %e, "oracle request failed");
                    return Err(e);
                }
            };

            let parsed = parse_findings(&content);
            if !matches!(parsed, OracleResponse::Findings(_)) {
                counter!(m::ORACLE_FAILURES_TOTAL, m::LABEL_KIND => parsed.kind()).increment(1);
            }
            Ok(parsed)
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatMessage>,
}
