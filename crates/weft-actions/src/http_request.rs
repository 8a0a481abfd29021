//! HTTP request step — call external APIs from a workflow.

use async_trait::async_trait;
use weft_core::traits::ActionHandler;
use weft_core::types::{ActionResult, Step};
use weft_core::vars::VariableStore;

const BODY_PREVIEW_LIMIT: usize = 1500;

pub struct HttpRequestAction {
    client: reqwest::Client,
}

impl HttpRequestAction {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpRequestAction {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionHandler for HttpRequestAction {
    fn kind(&self) -> &str {
        "http_request"
    }

    async fn execute(&self, step: &Step, vars: &VariableStore) -> ActionResult {
        let url = vars.interpolate(step.config_str("url"));
        if url.is_empty() {
            return ActionResult::fail("http_request: missing 'url'");
        }

        // Never allow workflows to reach cloud metadata endpoints.
        let lower_url = url.to_lowercase();
        if lower_url.contains("169.254.") || lower_url.contains("metadata.google") {
            return ActionResult::fail("Blocked: cannot access cloud metadata endpoints");
        }

        let method = step.config_str("method").to_uppercase();
        let mut request = match method.as_str() {
            "POST" => self.client.post(&url),
            "PUT" => self.client.put(&url),
            "DELETE" => self.client.delete(&url),
            "PATCH" => self.client.patch(&url),
            _ => self.client.get(&url),
        };

        if let Some(headers) = step.config.get("headers").and_then(|h| h.as_object()) {
            for (key, value) in headers {
                if let Some(v) = value.as_str() {
                    request = request.header(key.as_str(), vars.interpolate(v));
                }
            }
        }

        let body = step.config_str("body");
        if !body.is_empty() {
            request = request
                .header("Content-Type", "application/json")
                .body(vars.interpolate(body));
        }

        let response = match request
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => return ActionResult::fail(format!("Request failed: {e}")),
        };

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let preview: String = text.chars().take(BODY_PREVIEW_LIMIT).collect();

        ActionResult {
            success: status.as_u16() < 400,
            output: preview,
            extra: serde_json::Map::new(),
        }
        .with_extra("status_code", serde_json::json!(status.as_u16()))
    }
}
