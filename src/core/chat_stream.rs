//! HTTP side of a generation: payload construction and opening the
//! streamed response.

use serde::Serialize;
use tracing::debug;

use crate::api::{ChatMessage, ChatRequest, GenerateRequest};
use crate::core::config::ApiMode;
use crate::core::error::ChatError;
use crate::core::message::{Message, Role};
use crate::core::store::PreparedGeneration;
use crate::core::stream::format_api_error;
use crate::utils::url::construct_api_url;

/// Request body in whichever shape the configured endpoint expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RequestBody {
    Generate(GenerateRequest),
    Chat(ChatRequest),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub url: String,
    pub body: RequestBody,
}

/// Flatten messages into `ROLE:\ncontent` blocks separated by blank lines.
pub fn render_prompt(system_prompt: Option<&str>, messages: &[Message]) -> String {
    let mut prompt = String::new();
    if let Some(system) = system_prompt {
        prompt.push_str(Role::System.prompt_label());
        prompt.push_str(":\n");
        prompt.push_str(system);
        prompt.push_str("\n\n");
    }
    let blocks: Vec<String> = messages
        .iter()
        .map(|message| format!("{}:\n{}", message.role.prompt_label(), message.content))
        .collect();
    prompt.push_str(&blocks.join("\n\n"));
    prompt
}

fn chat_messages(system_prompt: Option<&str>, messages: &[Message]) -> Vec<ChatMessage> {
    let system = system_prompt.map(|content| ChatMessage {
        role: Role::System.as_str().to_string(),
        content: content.to_string(),
    });
    system
        .into_iter()
        .chain(messages.iter().map(|message| ChatMessage {
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
        }))
        .collect()
}

pub fn build_request(
    base_url: &str,
    api_mode: ApiMode,
    stream: bool,
    prepared: &PreparedGeneration,
) -> OutboundRequest {
    let system_prompt = prepared.system_prompt.as_deref();
    match api_mode {
        ApiMode::Generate => OutboundRequest {
            url: construct_api_url(base_url, "api/generate"),
            body: RequestBody::Generate(GenerateRequest {
                model: prepared.model.clone(),
                prompt: render_prompt(system_prompt, &prepared.context),
                stream,
            }),
        },
        ApiMode::Chat => OutboundRequest {
            url: construct_api_url(base_url, "api/chat"),
            body: RequestBody::Chat(ChatRequest {
                model: prepared.model.clone(),
                messages: chat_messages(system_prompt, &prepared.context),
                stream,
            }),
        },
    }
}

/// Send the request; a non-success status becomes [`ChatError::Network`]
/// carrying the formatted response body.
pub async fn open_stream(
    client: &reqwest::Client,
    request: &OutboundRequest,
) -> Result<reqwest::Response, ChatError> {
    debug!(url = %request.url, "Opening generation request");
    let response = client
        .post(&request.url)
        .header("Content-Type", "application/json")
        .json(&request.body)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        return Err(ChatError::Network(format!(
            "HTTP {status}: {}",
            format_api_error(&error_text)
        )));
    }

    Ok(response)
}
