//! OpenAI HTTP client.

use reqwest::{Client, RequestBuilder};
use serde_json::Value;

use super::error::{OpenAiError, OpenAiResult};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Assistants endpoints are gated behind this beta header.
const BETA_HEADER: (&str, &str) = ("OpenAI-Beta", "assistants=v2");

/// Client for the OpenAI API.
///
/// Constructed once per process, after the registration handshake delivered
/// the API key. A missing key is kept as an empty bearer token, so calls
/// fail at call time with the provider's 401 rather than at startup.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    /// HTTP client. Deliberately built without a request timeout: callers
    /// await provider calls indefinitely, the same way RPC requests have no
    /// timeout.
    client: Client,
    /// Base URL (e.g. "https://api.openai.com/v1").
    base_url: String,
    /// Bearer token; empty when registration carried no apiKey entry.
    api_key: String,
}

impl OpenAiClient {
    /// Create a new client with the given API key, if any.
    pub fn new(api_key: Option<String>) -> Self {
        let client = Client::builder()
            .build()
            .expect("failed to create HTTP client");

        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.unwrap_or_default(),
        }
    }

    /// Override the base URL (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// List all assistants.
    pub async fn list_assistants(&self) -> OpenAiResult<Value> {
        self.send(self.get_beta("/assistants")).await
    }

    /// Retrieve one assistant.
    pub async fn get_assistant(&self, assistant_id: &str) -> OpenAiResult<Value> {
        self.send(self.get_beta(&format!("/assistants/{assistant_id}")))
            .await
    }

    /// Create a conversation thread, optionally seeded with messages.
    pub async fn create_thread(&self, body: &Value) -> OpenAiResult<Value> {
        self.send(self.post_beta("/threads", body)).await
    }

    /// Append a message to a thread.
    pub async fn create_message(&self, thread_id: &str, body: &Value) -> OpenAiResult<Value> {
        self.send(self.post_beta(&format!("/threads/{thread_id}/messages"), body))
            .await
    }

    /// List messages in a thread.
    pub async fn list_messages(&self, thread_id: &str) -> OpenAiResult<Value> {
        self.send(self.get_beta(&format!("/threads/{thread_id}/messages")))
            .await
    }

    /// Retrieve one message.
    pub async fn get_message(&self, thread_id: &str, message_id: &str) -> OpenAiResult<Value> {
        self.send(self.get_beta(&format!("/threads/{thread_id}/messages/{message_id}")))
            .await
    }

    /// Start a run of a thread against an assistant.
    pub async fn create_run(&self, thread_id: &str, body: &Value) -> OpenAiResult<Value> {
        self.send(self.post_beta(&format!("/threads/{thread_id}/runs"), body))
            .await
    }

    /// Fetch run status.
    pub async fn get_run(&self, thread_id: &str, run_id: &str) -> OpenAiResult<Value> {
        self.send(self.get_beta(&format!("/threads/{thread_id}/runs/{run_id}")))
            .await
    }

    /// List runs of a thread.
    pub async fn list_runs(&self, thread_id: &str) -> OpenAiResult<Value> {
        self.send(self.get_beta(&format!("/threads/{thread_id}/runs")))
            .await
    }

    /// List steps of a run.
    pub async fn list_run_steps(&self, thread_id: &str, run_id: &str) -> OpenAiResult<Value> {
        self.send(self.get_beta(&format!("/threads/{thread_id}/runs/{run_id}/steps")))
            .await
    }

    /// Submit tool call outputs to continue a run.
    pub async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        body: &Value,
    ) -> OpenAiResult<Value> {
        self.send(self.post_beta(
            &format!("/threads/{thread_id}/runs/{run_id}/submit_tool_outputs"),
            body,
        ))
        .await
    }

    /// Single-shot chat completion (used for vision).
    pub async fn create_chat_completion(&self, body: &Value) -> OpenAiResult<Value> {
        self.send(self.post("/chat/completions", body)).await
    }

    /// Generate images.
    pub async fn create_image(&self, body: &Value) -> OpenAiResult<Value> {
        self.send(self.post("/images/generations", body)).await
    }

    fn get_beta(&self, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .header(BETA_HEADER.0, BETA_HEADER.1)
    }

    fn post_beta(&self, path: &str, body: &Value) -> RequestBuilder {
        self.post(path, body).header(BETA_HEADER.0, BETA_HEADER.1)
    }

    fn post(&self, path: &str, body: &Value) -> RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .json(body)
    }

    /// Send the request and pass the JSON body through, or surface a typed
    /// error carrying the provider's status and error body.
    async fn send(&self, request: RequestBuilder) -> OpenAiResult<Value> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| OpenAiError::ParseError(e.to_string()))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(OpenAiError::Api { status, body })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = OpenAiClient::new(Some("sk-test".to_string()));
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
        assert_eq!(client.api_key, "sk-test");
    }

    #[test]
    fn test_missing_key_is_empty_token() {
        let client = OpenAiClient::new(None).with_base_url("http://127.0.0.1:1");
        assert_eq!(client.api_key, "");
        assert_eq!(client.base_url, "http://127.0.0.1:1");
    }
}
