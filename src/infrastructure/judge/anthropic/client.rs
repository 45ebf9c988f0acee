use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::{header, Client as ReqwestClient, Response};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::types::{
    ContentBlock, ErrorResponse, ImageSource, Message, MessageRequest, MessageResponse, Tool,
    ToolChoice,
};
use crate::domain::models::config::JudgeConfig;
use crate::domain::models::metrics::TokenUsage;
use crate::domain::ports::{
    ContentPart, JudgeCallError, JudgeClient, JudgeRequest, JudgeResponse, Role,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Characters of an error body kept in the failure message
const ERROR_BODY_CHARS: usize = 500;

/// Judge backed by the Anthropic Messages API
///
/// The requested schema is offered as the only tool and forced through
/// `tool_choice`, so a well-behaved response carries the payload as a
/// `tool_use` block. Text blocks are passed through as free text for the
/// fallback parser.
///
/// This client performs exactly one HTTP request per [`JudgeClient::submit`].
/// Rate limiting, deadlines and retries belong to the retry orchestrator.
///
/// The Messages API has no seed parameter; temperature 0 is the only
/// determinism control sent on the wire.
pub struct AnthropicJudge {
    /// Reusable HTTP client with connection pooling
    http_client: ReqwestClient,

    /// Base URL for the API, without a trailing slash
    base_url: String,
}

impl AnthropicJudge {
    /// Create a judge from configuration
    ///
    /// The API key comes from `config.api_key`, falling back to the
    /// `ANTHROPIC_API_KEY` environment variable.
    ///
    /// # Example
    /// ```no_run
    /// use arbiter::domain::models::config::JudgeConfig;
    /// use arbiter::infrastructure::judge::AnthropicJudge;
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let judge = AnthropicJudge::new(&JudgeConfig::default())?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: &JudgeConfig) -> Result<Self> {
        let api_key = match &config.api_key {
            Some(key) => key.clone(),
            None => std::env::var("ANTHROPIC_API_KEY")
                .context("No judge API key configured and ANTHROPIC_API_KEY is not set")?,
        };

        info!(
            base_url = %config.base_url,
            model = %config.model,
            timeout_secs = config.request_timeout_secs,
            "Initializing Anthropic judge client"
        );

        let mut headers = header::HeaderMap::new();
        let mut key_value =
            header::HeaderValue::from_str(&api_key).context("API key is not a valid header value")?;
        key_value.set_sensitive(true);
        headers.insert("x-api-key", key_value);
        headers.insert(
            "anthropic-version",
            header::HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let http_client = ReqwestClient::builder()
            .pool_max_idle_per_host(10)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .tcp_nodelay(true)
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Handle HTTP response and convert to a judge response
    async fn handle_response(
        &self,
        response: Response,
        tool_name: &str,
    ) -> Result<JudgeResponse, JudgeCallError> {
        let status = response.status();
        debug!(%status, "Judge response status");

        if !status.is_success() {
            return Err(error_from_response(response).await);
        }

        let message: MessageResponse = response.json().await.map_err(|e| {
            JudgeCallError::new(format!("Failed to decode judge response body: {e}")).with_source(e)
        })?;

        Ok(into_judge_response(message, tool_name))
    }
}

#[async_trait]
impl JudgeClient for AnthropicJudge {
    #[instrument(skip(self, request), fields(model = %request.model, schema = %request.schema.name))]
    async fn submit(&self, request: JudgeRequest) -> Result<JudgeResponse, JudgeCallError> {
        let tool_name = request.schema.name.clone();
        let body = to_message_request(request);
        let url = format!("{}/v1/messages", self.base_url);

        debug!("POST {}", url);

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        self.handle_response(response, &tool_name).await
    }
}

/// Build the wire request for a provider-neutral judge request.
pub fn to_message_request(request: JudgeRequest) -> MessageRequest {
    let messages = request
        .messages
        .into_iter()
        .map(|message| Message {
            role: match message.role {
                Role::User => "user".to_string(),
                Role::Assistant => "assistant".to_string(),
            },
            content: message.content.into_iter().map(to_content_block).collect(),
        })
        .collect();

    let tool_name = request.schema.name;
    MessageRequest {
        model: request.model,
        messages,
        max_tokens: request.max_tokens,
        system: Some(request.system).filter(|s| !s.is_empty()),
        temperature: Some(request.sampling.temperature),
        tools: Some(vec![Tool {
            name: tool_name.clone(),
            description: request.schema.description,
            input_schema: request.schema.json_schema,
        }]),
        tool_choice: Some(ToolChoice::Tool { name: tool_name }),
        metadata: None,
    }
}

fn to_content_block(part: ContentPart) -> ContentBlock {
    match part {
        ContentPart::Text { text } => ContentBlock::Text { text },
        ContentPart::Image { media_type, data } => ContentBlock::Image {
            source: ImageSource::Base64 {
                media_type,
                data: STANDARD.encode(&data),
            },
        },
    }
}

/// Pull the tool payload and free text out of a wire response.
pub fn into_judge_response(message: MessageResponse, tool_name: &str) -> JudgeResponse {
    let mut structured = None;
    let mut texts = Vec::new();

    for block in message.content {
        match block {
            ContentBlock::ToolUse { name, input, .. } => {
                // The forced tool wins over any other tool the model reached for
                if structured.is_none() || name == tool_name {
                    structured = Some(input);
                }
            }
            ContentBlock::Text { text } => texts.push(text),
            ContentBlock::Image { .. } | ContentBlock::Unsupported => {}
        }
    }

    JudgeResponse {
        id: message.id,
        structured,
        text: if texts.is_empty() {
            None
        } else {
            Some(texts.join("\n"))
        },
        usage: TokenUsage {
            input_tokens: message.usage.input_tokens,
            output_tokens: message.usage.output_tokens,
        },
    }
}

fn transport_error(err: reqwest::Error) -> JudgeCallError {
    let message = if err.is_timeout() {
        format!("Judge request timeout: {err}")
    } else if err.is_connect() {
        format!("Judge connection failed: {err}")
    } else {
        format!("Judge network error: {err}")
    };
    warn!(timeout = err.is_timeout(), connect = err.is_connect(), "Judge transport error");
    JudgeCallError::new(message).with_source(err)
}

async fn error_from_response(response: Response) -> JudgeCallError {
    let status = response.status();
    let retry_after = header_value(&response, "retry-after");
    let retry_after_ms = header_value(&response, "retry-after-ms");
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error body".to_string());

    let detail = serde_json::from_str::<ErrorResponse>(&body).map_or_else(
        |_| truncate(&body),
        |parsed| format!("{}: {}", parsed.error.error_type, truncate(&parsed.error.message)),
    );

    warn!(%status, "Judge API error");

    let mut error = JudgeCallError::with_status(status.as_u16(), format!("HTTP {status}: {detail}"));
    error.retry_after = retry_after;
    error.retry_after_ms = retry_after_ms;
    error
}

fn header_value(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= ERROR_BODY_CHARS {
        return text.to_string();
    }
    let mut out: String = text.chars().take(ERROR_BODY_CHARS).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{JudgeMessage, ResponseSchema, Sampling};
    use crate::infrastructure::judge::anthropic::types::{StopReason, Usage};
    use serde_json::json;
    use std::sync::Arc;

    fn request() -> JudgeRequest {
        JudgeRequest {
            model: "claude-test".into(),
            system: "Grade the trajectory".into(),
            messages: vec![JudgeMessage::user(vec![
                ContentPart::text("chunk 1"),
                ContentPart::Image {
                    media_type: "image/png".into(),
                    data: Arc::from(&b"hi"[..]),
                },
            ])],
            schema: ResponseSchema {
                name: "record_chunk_summary".into(),
                description: "d".into(),
                json_schema: json!({"type": "object"}),
            },
            sampling: Sampling::deterministic(42),
            max_tokens: 1024,
        }
    }

    #[test]
    fn test_request_forces_schema_tool() {
        let wire = to_message_request(request());
        assert_eq!(
            wire.tool_choice,
            Some(ToolChoice::Tool {
                name: "record_chunk_summary".into()
            })
        );
        assert_eq!(wire.tools.as_ref().map(Vec::len), Some(1));
        assert_eq!(wire.temperature, Some(0.0));
        assert_eq!(wire.system.as_deref(), Some("Grade the trajectory"));
    }

    #[test]
    fn test_images_are_base64_encoded() {
        let wire = to_message_request(request());
        assert_eq!(
            wire.messages[0].content[1],
            ContentBlock::Image {
                source: ImageSource::Base64 {
                    media_type: "image/png".into(),
                    data: "aGk=".into(),
                }
            }
        );
    }

    #[test]
    fn test_response_prefers_named_tool() {
        let message = MessageResponse {
            id: "msg_1".into(),
            content: vec![
                ContentBlock::Text {
                    text: "thinking out loud".into(),
                },
                ContentBlock::ToolUse {
                    id: "a".into(),
                    name: "other_tool".into(),
                    input: json!({"wrong": true}),
                },
                ContentBlock::ToolUse {
                    id: "b".into(),
                    name: "record_chunk_summary".into(),
                    input: json!({"summary": "ok"}),
                },
            ],
            model: "claude-test".into(),
            stop_reason: Some(StopReason::ToolUse),
            usage: Usage {
                input_tokens: 12,
                output_tokens: 3,
            },
        };

        let response = into_judge_response(message, "record_chunk_summary");
        assert_eq!(response.structured, Some(json!({"summary": "ok"})));
        assert_eq!(response.text.as_deref(), Some("thinking out loud"));
        assert_eq!(response.usage.total(), 15);
    }

    #[test]
    fn test_missing_api_key_is_an_error() {
        temp_env::with_var_unset("ANTHROPIC_API_KEY", || {
            let result = AnthropicJudge::new(&JudgeConfig::default());
            assert!(result.is_err());
        });
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "e".repeat(ERROR_BODY_CHARS + 10);
        assert!(truncate(&body).ends_with("..."));
        assert_eq!(truncate("short"), "short");
    }
}
