//! HTTP client for the OpenRouter chat completions API.

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, trace};

use crate::{ChatCompletion, ChatRequest, OPENROUTER_URL, ToolCall, UsageInfo};

/// Boxed future returned by [`ChatBackend::chat`].
pub type ChatFuture<'a> = Pin<Box<dyn Future<Output = Result<ChatCompletion, String>> + Send + 'a>>;

/// A model completion service.
///
/// Errors are plain strings in the `"OpenRouter API HTTP 429: ..."` /
/// `"request failed: ..."` shape so [`retry`](super::retry) can classify them.
pub trait ChatBackend: Send + Sync {
    fn chat<'a>(&'a self, body: &'a ChatRequest) -> ChatFuture<'a>;
}

// ── Wire format ────────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct RawChatResponse {
    model: Option<String>,
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

/// Parse a raw response body into a [`ChatCompletion`].
fn parse_completion(text: &str) -> Result<ChatCompletion, String> {
    let parsed: RawChatResponse =
        serde_json::from_str(text).map_err(|e| format!("failed to parse response: {e}"))?;

    if let Some(err) = parsed.error {
        return Err(format!("OpenRouter API error: {}", err.message));
    }

    let choice = parsed.choices.and_then(|c| c.into_iter().next());
    let (content, tool_calls, finish_reason) = match choice {
        Some(c) => (
            c.message.content,
            c.message.tool_calls.unwrap_or_default(),
            c.finish_reason,
        ),
        None => {
            debug!("LLM output: empty (no choices)");
            (None, Vec::new(), None)
        }
    };

    Ok(ChatCompletion {
        model: parsed.model,
        content,
        tool_calls,
        usage: parsed.usage,
        finish_reason,
    })
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for the OpenRouter chat completions API.
///
/// Works against any OpenAI-compatible endpoint via
/// [`with_base_url`](Self::with_base_url).
pub struct OpenRouterClient {
    client: reqwest::Client,
    api_key: String,
    url: String,
    title: String,
}

impl OpenRouterClient {
    /// Create a client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("crewline/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            url: OPENROUTER_URL.to_string(),
            title: "crewline".to_string(),
        })
    }

    /// Point the client at a different chat completions URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Send a chat completion request.
    pub async fn send(&self, body: &ChatRequest) -> Result<ChatCompletion, String> {
        debug!(
            "LLM request: model={}, messages={}, tools={}, temp={}",
            body.model,
            body.messages.len(),
            body.tools.as_ref().map_or(0, Vec::len),
            body.temperature,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();
        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .header("X-Title", &self.title)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| format!("failed to read response: {e}"))?;

        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(format!("OpenRouter API HTTP {status}: {text}"));
        }

        let completion = parse_completion(&text)?;
        if let Some(ref usage) = completion.usage {
            debug!(
                "Token usage: prompt={}, completion={}, cost={:?}",
                usage.prompt_tokens.unwrap_or(0),
                usage.completion_tokens.unwrap_or(0),
                usage.cost,
            );
        }
        Ok(completion)
    }
}

impl ChatBackend for OpenRouterClient {
    fn chat<'a>(&'a self, body: &'a ChatRequest) -> ChatFuture<'a> {
        Box::pin(self.send(body))
    }
}
