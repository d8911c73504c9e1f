use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;

use crate::client::{GenerativeContentClient, ResponseFormat, Sleeper, Transport};
use crate::response::{ErrorKind, GenerateError};

const STORY_DESCRIPTION: &str =
    "The main text content, strictly adhering to the configured persona.";
const IMAGE_PROMPT_DESCRIPTION: &str = "A highly detailed, cinematic prompt for image \
     generation. It must describe a scene that matches the story in a 'Vintage comic book art, \
     vibrant colors, 1950s retro-futurism' style.";

/// A persona story plus a prompt to paste into a free image generator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContentCreation {
    pub persona_story: String,
    pub image_prompt: String,
}

fn content_creation_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "persona_story": {"type": "STRING", "description": STORY_DESCRIPTION},
            "image_prompt": {"type": "STRING", "description": IMAGE_PROMPT_DESCRIPTION},
        },
        "required": ["persona_story", "image_prompt"],
    })
}

/// Asks for structured JSON output. Search grounding is switched off because the
/// API refuses it together with a response schema.
pub async fn create_content<T, S>(
    client: &GenerativeContentClient<T, S>,
    topic: &str,
) -> Result<ContentCreation, GenerateError>
where
    T: Transport,
    S: Sleeper,
{
    let mut request = client
        .request_for(topic)
        .with_response_format(ResponseFormat {
            mime_type: "application/json".to_string(),
            schema: content_creation_schema(),
        });
    request.tools_enabled = false;

    let text = client.send(&request).await.into_result()?;
    parse_content_creation(text)
}

fn parse_content_creation(text: String) -> Result<ContentCreation, GenerateError> {
    match serde_json::from_str(&text) {
        Ok(created) => Ok(created),
        Err(err) => {
            warn!(error = %err, response_len = text.len(), "structured content did not match schema");
            Err(GenerateError {
                kind: ErrorKind::MalformedResponse {
                    raw_body: Some(text),
                },
                detail: format!("Model output did not match the content schema: {err}"),
            })
        }
    }
}
