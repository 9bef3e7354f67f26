use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role-tagged message in a `/api/chat` request.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// `POST /api/chat` body.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

/// `POST /api/generate` body; the conversation is flattened into `prompt`.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
}

/// One entry of a model listing. Servers send either bare strings or
/// objects naming the model under `name`, `model`, or `id`.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum ModelEntry {
    Name(String),
    Object {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        modified_at: Option<String>,
        #[serde(default)]
        size: Option<u64>,
    },
    Other(Value),
}

/// Listing body: a bare array or `{ "models": [...] }`.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum ModelsResponse {
    List(Vec<ModelEntry>),
    Wrapped {
        #[serde(default)]
        models: Vec<ModelEntry>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: String,
    pub modified_at: Option<String>,
    pub size: Option<u64>,
}

impl ModelEntry {
    fn into_info(self) -> Option<ModelInfo> {
        match self {
            ModelEntry::Name(name) => Some(ModelInfo {
                id: name,
                modified_at: None,
                size: None,
            }),
            ModelEntry::Object {
                name,
                model,
                id,
                modified_at,
                size,
            } => name.or(model).or(id).map(|id| ModelInfo {
                id,
                modified_at,
                size,
            }),
            ModelEntry::Other(_) => None,
        }
    }
}

impl ModelsResponse {
    pub fn into_models(self) -> Vec<ModelInfo> {
        let entries = match self {
            ModelsResponse::List(entries) => entries,
            ModelsResponse::Wrapped { models } => models,
        };
        entries
            .into_iter()
            .filter_map(ModelEntry::into_info)
            .filter(|info| !info.id.trim().is_empty())
            .collect()
    }
}

pub mod models;

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(json: &str) -> Vec<String> {
        serde_json::from_str::<ModelsResponse>(json)
            .unwrap()
            .into_models()
            .into_iter()
            .map(|m| m.id)
            .collect()
    }

    #[test]
    fn listings_accept_wrapped_and_bare_shapes() {
        assert_eq!(
            ids(r#"{"models":[{"name":"llama3:latest","size":42},{"model":"mistral"}]}"#),
            vec!["llama3:latest", "mistral"]
        );
        assert_eq!(ids(r#"["phi3", {"id":"qwen2"}]"#), vec!["phi3", "qwen2"]);
    }

    #[test]
    fn entries_without_a_name_are_skipped() {
        assert_eq!(ids(r#"[{"size":1}, 7, "gemma"]"#), vec!["gemma"]);
        assert!(ids(r#"{}"#).is_empty());
    }

    #[test]
    fn request_bodies_serialize_the_wire_fields() {
        let generate = GenerateRequest {
            model: "llama3".into(),
            prompt: "USER:\nhi".into(),
            stream: true,
        };
        assert_eq!(
            serde_json::to_value(&generate).unwrap(),
            serde_json::json!({"model":"llama3","prompt":"USER:\nhi","stream":true})
        );

        let chat = ChatRequest {
            model: "llama3".into(),
            messages: vec![ChatMessage {
                role: "user".into(),
                content: "hi".into(),
            }],
            stream: false,
        };
        assert_eq!(
            serde_json::to_value(&chat).unwrap(),
            serde_json::json!({
                "model":"llama3",
                "messages":[{"role":"user","content":"hi"}],
                "stream":false
            })
        );
    }
}
