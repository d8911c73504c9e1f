use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::client::{HttpReply, Request, Transport, TransportError, TransportFuture};
use crate::providers::http_errors::network_error_detail;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    contents: Vec<Content>,
    system_instruction: Content,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Content {
    parts: Vec<Part>,
}

impl Content {
    fn text(text: &str) -> Self {
        Self {
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: Value,
}

impl From<&Request> for GenerateContentRequest {
    fn from(request: &Request) -> Self {
        let tools = if request.tools_enabled {
            vec![Tool {
                google_search: GoogleSearch {},
            }]
        } else {
            Vec::new()
        };

        Self {
            contents: vec![Content::text(&request.user_query)],
            system_instruction: Content::text(&request.system_instruction),
            tools,
            generation_config: request.response_format.as_ref().map(|format| GenerationConfig {
                response_mime_type: format.mime_type.clone(),
                response_schema: format.schema.clone(),
            }),
        }
    }
}

// Only the first candidate and its first part are type-checked; later entries may be
// safety-blocked candidates or non-text parts.
#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: String,
}

pub fn generate_content_url(base_url: &str, model: &str) -> String {
    format!(
        "{}/models/{}:generateContent",
        base_url.trim_end_matches('/'),
        model
    )
}

/// Pulls `candidates[0].content.parts[0].text` out of a response body.
///
/// An empty string is returned as-is; the caller decides what it means.
pub(crate) fn extract_text(body: &str) -> Result<String, String> {
    let parsed: GenerateContentResponse = serde_json::from_str(body).map_err(malformed)?;

    let candidate = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| "Failed to parse model response: 'candidates' is empty".to_string())?;
    let candidate: Candidate = serde_json::from_value(candidate).map_err(malformed)?;

    let part = candidate
        .content
        .parts
        .into_iter()
        .next()
        .ok_or_else(|| "Failed to parse model response: 'content.parts' is empty".to_string())?;
    let part: CandidatePart = serde_json::from_value(part).map_err(malformed)?;
    Ok(part.text)
}

fn malformed(err: serde_json::Error) -> String {
    format!("Failed to parse model response: {err}")
}

/// Sends requests with reqwest; the key travels as the `key` query parameter.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    timeout_secs: u64,
}

impl ReqwestTransport {
    pub fn new(client: Client, timeout_secs: u64) -> Self {
        Self {
            client,
            timeout_secs,
        }
    }
}

impl Transport for ReqwestTransport {
    fn post<'a>(
        &'a self,
        api_url: &'a str,
        api_key: &'a str,
        body: &'a GenerateContentRequest,
    ) -> TransportFuture<'a> {
        Box::pin(async move {
            let response = self
                .client
                .post(api_url)
                .query(&[("key", api_key)])
                .timeout(Duration::from_secs(self.timeout_secs))
                .json(body)
                .send()
                .await
                .map_err(|err| {
                    let detail = network_error_detail(err, api_url, self.timeout_secs);
                    warn!(api_url = %api_url, error = %detail, "gemini request failed");
                    TransportError::new(detail)
                })?;

            let status = response.status().as_u16();
            let body = response.text().await.map_err(|err| {
                TransportError::new(network_error_detail(err, api_url, self.timeout_secs))
            })?;
            debug!(
                api_url = %api_url,
                status,
                response_body_len = body.len(),
                "received gemini response"
            );
            Ok(HttpReply { status, body })
        })
    }
}
