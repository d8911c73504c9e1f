use reqwest::Client;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::providers::gemini::{self, GenerateContentRequest, ReqwestTransport};
use crate::response::{ApiResponse, ErrorKind};
use crate::retry::RetryPolicy;

/// One call's worth of input. Built per call and dropped afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub system_instruction: String,
    pub user_query: String,
    pub tools_enabled: bool,
    pub response_format: Option<ResponseFormat>,
}

impl Request {
    pub fn new(
        system_instruction: impl Into<String>,
        user_query: impl Into<String>,
        tools_enabled: bool,
    ) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            user_query: user_query.into(),
            tools_enabled,
            response_format: None,
        }
    }

    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }
}

/// Structured-output constraint sent as `generationConfig`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseFormat {
    pub mime_type: String,
    pub schema: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure below HTTP: refused connection, timeout, DNS, broken body stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub detail: String,
}

impl TransportError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<HttpReply, TransportError>> + 'a>>;

pub trait Transport {
    fn post<'a>(
        &'a self,
        api_url: &'a str,
        api_key: &'a str,
        body: &'a GenerateContentRequest,
    ) -> TransportFuture<'a>;
}

pub type SleepFuture<'a> = Pin<Box<dyn Future<Output = ()> + 'a>>;

pub trait Sleeper {
    fn sleep(&self, delay: Duration) -> SleepFuture<'_>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, delay: Duration) -> SleepFuture<'_> {
        Box::pin(tokio::time::sleep(delay))
    }
}

/// Persona-locked client for the `generateContent` endpoint.
///
/// Everything it reads is fixed at construction; calls share no state.
pub struct GenerativeContentClient<T = ReqwestTransport, S = TokioSleeper> {
    api_url: String,
    api_key: Option<String>,
    model: String,
    system_instruction: String,
    tools_enabled: bool,
    retry_policy: RetryPolicy,
    transport: T,
    sleeper: S,
}

impl GenerativeContentClient<ReqwestTransport, TokioSleeper> {
    pub fn new(http: Client, cfg: &Config) -> Self {
        let transport = ReqwestTransport::new(http, cfg.model_timeout_secs);
        Self::with_parts(cfg, transport, TokioSleeper)
    }
}

impl<T, S> GenerativeContentClient<T, S> {
    pub fn with_parts(cfg: &Config, transport: T, sleeper: S) -> Self {
        Self {
            api_url: gemini::generate_content_url(&cfg.api_base_url, &cfg.model),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            system_instruction: cfg.system_prompt.clone(),
            tools_enabled: cfg.google_search,
            retry_policy: cfg.retry_policy.clone(),
            transport,
            sleeper,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    /// Request carrying the fixed persona for `user_query`.
    pub fn request_for(&self, user_query: &str) -> Request {
        Request::new(
            self.system_instruction.clone(),
            user_query,
            self.tools_enabled,
        )
    }
}

impl<T, S> GenerativeContentClient<T, S>
where
    T: Transport,
    S: Sleeper,
{
    /// Callers filter out blank queries before getting here.
    pub async fn generate(&self, query: &str) -> ApiResponse {
        let request = self.request_for(query);
        self.send(&request).await
    }

    pub async fn send(&self, request: &Request) -> ApiResponse {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!(model = %self.model, "no API credential configured; request not sent");
            return ApiResponse::failure(
                ErrorKind::MissingCredential,
                "GEMINI_API_KEY is not set. Export it or point GEMINI_API_KEY_FILE at a file \
                 containing the key.",
            );
        };

        let body = GenerateContentRequest::from(request);
        let max_attempts = self.retry_policy.max_attempts();
        let mut last_problem = String::from("no attempt completed");

        for attempt in 0..max_attempts {
            debug!(
                api_url = %self.api_url,
                model = %self.model,
                attempt = attempt + 1,
                max_attempts,
                tools_enabled = request.tools_enabled,
                "sending generate content request"
            );

            let reply = match self.transport.post(&self.api_url, api_key, &body).await {
                Ok(reply) => reply,
                Err(err) => return ApiResponse::failure(ErrorKind::NetworkError, err.detail),
            };

            if reply.is_success() {
                match gemini::extract_text(&reply.body) {
                    Ok(text) if !text.is_empty() => {
                        info!(
                            model = %self.model,
                            attempt = attempt + 1,
                            response_len = text.len(),
                            "received model answer"
                        );
                        return ApiResponse::Success { text };
                    }
                    Ok(_) => {
                        last_problem = "model returned an empty answer".to_string();
                    }
                    Err(detail) => {
                        warn!(
                            model = %self.model,
                            response_body_len = reply.body.len(),
                            error = %detail,
                            "model response has an unexpected shape"
                        );
                        return ApiResponse::failure(
                            ErrorKind::MalformedResponse {
                                raw_body: Some(reply.body),
                            },
                            detail,
                        );
                    }
                }
            } else if self.retry_policy.is_retryable(reply.status) {
                last_problem = format!("status {}: {}", reply.status, reply.body);
            } else {
                warn!(
                    model = %self.model,
                    status = reply.status,
                    response_body_len = reply.body.len(),
                    "model returned non-retryable status"
                );
                return ApiResponse::failure(
                    ErrorKind::HttpError(reply.status),
                    format!(
                        "Model request failed with status {}: {}",
                        reply.status, reply.body
                    ),
                );
            }

            if self.retry_policy.has_attempt_after(attempt) {
                let delay = self.retry_policy.delay_for_attempt(attempt);
                warn!(
                    model = %self.model,
                    status = reply.status,
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    problem = %last_problem,
                    "transient model failure; backing off"
                );
                self.sleeper.sleep(delay).await;
            }
        }

        warn!(model = %self.model, max_attempts, "giving up on model request");
        ApiResponse::failure(
            ErrorKind::RetryExhausted,
            format!(
                "Failed to generate content after {max_attempts} attempt(s); last failure: {last_problem}"
            ),
        )
    }
}
