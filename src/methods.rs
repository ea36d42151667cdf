//! Hub-facing method registry: thin proxies to the OpenAI API.
//!
//! Registration order matters only in that nothing is registered before the
//! `session.register` handshake has produced the API key, so no handler can
//! ever run against an unconfigured client.

use anyhow::Result;
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::config::Config;
use crate::openai::OpenAiClient;
use crate::rpc::RpcSession;

/// Model used by the vision handler.
const VISION_MODEL: &str = "gpt-4-vision-preview";
const VISION_MAX_TOKENS: u32 = 4096;

/// Model used by the dalle handler.
const IMAGE_MODEL: &str = "dall-e-3";

/// Fixed namespace for queue ids.
pub const QUEUE_ID_NAMESPACE: Uuid = Uuid::NAMESPACE_OID;
const QUEUE_ID_NAME: &[u8] = b"dalle";

/// Queue id for an image-generation call.
///
/// Name-based under a fixed namespace, so every dalle call in every process
/// yields the same id (carried over from the upstream behavior; see
/// DESIGN.md).
pub fn queue_id() -> Uuid {
    Uuid::new_v5(&QUEUE_ID_NAMESPACE, QUEUE_ID_NAME)
}

/// Perform the registration handshake, build the provider client from the
/// returned configuration, and register all handlers.
pub async fn bootstrap(session: &RpcSession, config: &Config) -> Result<()> {
    let result = session
        .call(
            "session.register",
            json!({
                "code": config.code,
                "name": config.name,
                "token": config.token,
            }),
        )
        .await?;

    let api_key = extract_api_key(&result);
    if api_key.is_none() {
        warn!("registration returned no apiKey entry; provider calls will fail");
    }

    register_methods(session, OpenAiClient::new(api_key), &config.code).await;
    info!("module '{}' registered with the hub", config.code);
    Ok(())
}

/// Linear search of the registration result for the `apiKey` entry.
pub fn extract_api_key(result: &Value) -> Option<String> {
    result
        .as_array()?
        .iter()
        .find(|entry| entry.get("key").and_then(Value::as_str) == Some("apiKey"))?
        .get("value")?
        .as_str()
        .map(String::from)
}

#[derive(Debug, Deserialize)]
struct AssistantParams {
    #[serde(rename = "assistantId")]
    assistant_id: String,
}

#[derive(Debug, Deserialize)]
struct CreateThreadParams {
    #[serde(default)]
    messages: Value,
}

#[derive(Debug, Deserialize)]
struct AddMessageParams {
    #[serde(rename = "threadId")]
    thread_id: String,
    #[serde(default = "default_role")]
    role: String,
    content: Value,
}

fn default_role() -> String {
    "user".to_string()
}

#[derive(Debug, Deserialize)]
struct RunThreadParams {
    #[serde(rename = "threadId")]
    thread_id: String,
    assistant_id: String,
    #[serde(default)]
    additional_instructions: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ThreadParams {
    #[serde(rename = "threadId")]
    thread_id: String,
}

#[derive(Debug, Deserialize)]
struct RunParams {
    #[serde(rename = "threadId")]
    thread_id: String,
    #[serde(rename = "runId")]
    run_id: String,
}

#[derive(Debug, Deserialize)]
struct MessageParams {
    #[serde(rename = "threadId")]
    thread_id: String,
    #[serde(rename = "messageId")]
    message_id: String,
}

#[derive(Debug, Deserialize)]
struct SubmitToolOutputsParams {
    #[serde(rename = "threadId")]
    thread_id: String,
    #[serde(rename = "runId")]
    run_id: String,
    outputs: Value,
}

#[derive(Debug, Deserialize)]
struct VisionParams {
    prompt: String,
    image: String,
    #[serde(default)]
    additional_instructions: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DalleParams {
    prompt: String,
    #[serde(default = "default_n")]
    n: u32,
    #[serde(default = "default_size")]
    size: String,
    #[serde(default = "default_quality")]
    quality: String,
}

fn default_n() -> u32 {
    1
}

fn default_size() -> String {
    "1024x1024".to_string()
}

fn default_quality() -> String {
    "standard".to_string()
}

/// Chat-completion request body for a vision call: an optional system
/// message built from the additional instructions, then the prompt plus
/// image as one user message.
fn vision_body(params: &VisionParams) -> Value {
    let mut messages = Vec::new();
    if let Some(instructions) = &params.additional_instructions {
        messages.push(json!({ "role": "system", "content": instructions }));
    }
    messages.push(json!({
        "role": "user",
        "content": [
            { "type": "text", "text": params.prompt },
            { "type": "image_url", "image_url": { "url": params.image } },
        ],
    }));

    json!({
        "model": VISION_MODEL,
        "max_tokens": VISION_MAX_TOKENS,
        "messages": messages,
    })
}

/// Collect the image URLs out of an images-generation response.
fn image_urls(response: &Value) -> Vec<String> {
    response
        .get("data")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("url").and_then(Value::as_str).map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// Register every hub-callable method on the session.
pub async fn register_methods(session: &RpcSession, openai: OpenAiClient, code: &str) {
    let client = openai.clone();
    session
        .register_method("getAssistants", move |_params| {
            let client = client.clone();
            async move { Ok(client.list_assistants().await?) }
        })
        .await;

    let client = openai.clone();
    session
        .register_method("getAssistant", move |params| {
            let client = client.clone();
            async move {
                let params: AssistantParams = serde_json::from_value(params)?;
                Ok(client.get_assistant(&params.assistant_id).await?)
            }
        })
        .await;

    let client = openai.clone();
    session
        .register_method("createThread", move |params| {
            let client = client.clone();
            async move {
                let params: CreateThreadParams = serde_json::from_value(params)?;
                let body = if params.messages.is_null() {
                    json!({})
                } else {
                    json!({ "messages": params.messages })
                };
                Ok(client.create_thread(&body).await?)
            }
        })
        .await;

    let client = openai.clone();
    session
        .register_method("addMessage", move |params| {
            let client = client.clone();
            async move {
                let params: AddMessageParams = serde_json::from_value(params)?;
                let body = json!({ "role": params.role, "content": params.content });
                Ok(client.create_message(&params.thread_id, &body).await?)
            }
        })
        .await;

    let client = openai.clone();
    session
        .register_method("runThread", move |params| {
            let client = client.clone();
            async move {
                let params: RunThreadParams = serde_json::from_value(params)?;
                let body = json!({
                    "assistant_id": params.assistant_id,
                    "additional_instructions": params.additional_instructions,
                });
                Ok(client.create_run(&params.thread_id, &body).await?)
            }
        })
        .await;

    let client = openai.clone();
    session
        .register_method("getRunStatus", move |params| {
            let client = client.clone();
            async move {
                let params: RunParams = serde_json::from_value(params)?;
                Ok(client.get_run(&params.thread_id, &params.run_id).await?)
            }
        })
        .await;

    let client = openai.clone();
    session
        .register_method("getRunSteps", move |params| {
            let client = client.clone();
            async move {
                let params: RunParams = serde_json::from_value(params)?;
                Ok(client
                    .list_run_steps(&params.thread_id, &params.run_id)
                    .await?)
            }
        })
        .await;

    let client = openai.clone();
    session
        .register_method("getMessages", move |params| {
            let client = client.clone();
            async move {
                let params: ThreadParams = serde_json::from_value(params)?;
                Ok(client.list_messages(&params.thread_id).await?)
            }
        })
        .await;

    let client = openai.clone();
    session
        .register_method("getMessage", move |params| {
            let client = client.clone();
            async move {
                let params: MessageParams = serde_json::from_value(params)?;
                Ok(client
                    .get_message(&params.thread_id, &params.message_id)
                    .await?)
            }
        })
        .await;

    let client = openai.clone();
    session
        .register_method("getRuns", move |params| {
            let client = client.clone();
            async move {
                let params: ThreadParams = serde_json::from_value(params)?;
                Ok(client.list_runs(&params.thread_id).await?)
            }
        })
        .await;

    let client = openai.clone();
    session
        .register_method("submitToolOutputs", move |params| {
            let client = client.clone();
            async move {
                let params: SubmitToolOutputsParams = serde_json::from_value(params)?;
                let body = json!({ "tool_outputs": params.outputs });
                Ok(client
                    .submit_tool_outputs(&params.thread_id, &params.run_id, &body)
                    .await?)
            }
        })
        .await;

    let client = openai.clone();
    session
        .register_method("vision", move |params| {
            let client = client.clone();
            async move {
                let params: VisionParams = serde_json::from_value(params)?;
                Ok(client.create_chat_completion(&vision_body(&params)).await?)
            }
        })
        .await;

    let client = openai.clone();
    let dalle_session = session.clone();
    let event_name = format!("{code}-queue-state-changed");
    session
        .register_method("dalle", move |params| {
            let client = client.clone();
            let session = dalle_session.clone();
            let event_name = event_name.clone();
            async move {
                let params: DalleParams = serde_json::from_value(params)?;
                let id = queue_id();
                let body = json!({
                    "model": IMAGE_MODEL,
                    "prompt": params.prompt,
                    "n": params.n,
                    "size": params.size,
                    "quality": params.quality,
                });

                // Fire and forget: the RPC response goes out immediately,
                // the hub learns the outcome through an event.new frame.
                tokio::spawn(async move {
                    match client.create_image(&body).await {
                        Ok(response) => {
                            let payload = json!({
                                "name": event_name,
                                "payload": {
                                    "id": id,
                                    "state": "completed",
                                    "output": image_urls(&response),
                                },
                            });
                            if let Err(e) = session.notify("event.new", payload).await {
                                error!("failed to send queue completion event: {}", e);
                            }
                        }
                        Err(e) => {
                            error!("image generation failed: {}", e);
                            let payload = json!({
                                "name": event_name,
                                "payload": { "id": id, "state": "failed" },
                            });
                            if let Err(e) = session.notify("event.new", payload).await {
                                error!("failed to send queue failure event: {}", e);
                            }
                        }
                    }
                });

                Ok(json!({
                    "type": "queue",
                    "message": { "state": "in_progress", "id": id },
                }))
            }
        })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_id_is_deterministic() {
        assert_eq!(queue_id(), queue_id());
        assert_eq!(queue_id(), Uuid::new_v5(&QUEUE_ID_NAMESPACE, b"dalle"));
    }

    #[test]
    fn test_extract_api_key_present() {
        let result = json!([
            { "key": "model", "value": "gpt-4" },
            { "key": "apiKey", "value": "sk-abc" },
        ]);
        assert_eq!(extract_api_key(&result), Some("sk-abc".to_string()));
    }

    #[test]
    fn test_extract_api_key_absent() {
        assert_eq!(extract_api_key(&json!([{ "key": "model", "value": "x" }])), None);
        assert_eq!(extract_api_key(&json!({})), None);
        assert_eq!(extract_api_key(&Value::Null), None);
    }

    #[test]
    fn test_add_message_role_defaults_to_user() {
        let params: AddMessageParams =
            serde_json::from_value(json!({ "threadId": "t1", "content": "hi" })).unwrap();
        assert_eq!(params.role, "user");
        assert_eq!(params.thread_id, "t1");
    }

    #[test]
    fn test_dalle_defaults() {
        let params: DalleParams = serde_json::from_value(json!({ "prompt": "a cat" })).unwrap();
        assert_eq!(params.n, 1);
        assert_eq!(params.size, "1024x1024");
        assert_eq!(params.quality, "standard");
    }

    #[test]
    fn test_vision_body_with_instructions() {
        let params = VisionParams {
            prompt: "describe this".to_string(),
            image: "https://example.com/cat.png".to_string(),
            additional_instructions: Some("be brief".to_string()),
        };
        let body = vision_body(&params);
        assert_eq!(body["model"], VISION_MODEL);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "be brief");
        assert_eq!(body["messages"][1]["content"][1]["image_url"]["url"], params.image);
    }

    #[test]
    fn test_vision_body_without_instructions() {
        let params = VisionParams {
            prompt: "describe this".to_string(),
            image: "https://example.com/cat.png".to_string(),
            additional_instructions: None,
        };
        let body = vision_body(&params);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn test_image_urls_extraction() {
        let response = json!({
            "created": 1700000000,
            "data": [
                { "url": "https://img/1.png" },
                { "revised_prompt": "no url here" },
                { "url": "https://img/2.png" },
            ],
        });
        assert_eq!(image_urls(&response), vec!["https://img/1.png", "https://img/2.png"]);
        assert!(image_urls(&json!({})).is_empty());
    }
}
