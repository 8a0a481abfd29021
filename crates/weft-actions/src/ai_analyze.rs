//! AI analysis step — run a prompt through the injected analyst.
//!
//! The analyst itself is a collaborator; the built-in implementation talks
//! to any OpenAI-compatible chat endpoint, distinguished only by URL, key,
//! and model name.

use std::sync::Arc;

use async_trait::async_trait;
use weft_core::config::AnalystConfig;
use weft_core::error::{Result, WeftError};
use weft_core::traits::{ActionHandler, Analyst};
use weft_core::types::{ActionResult, Step};
use weft_core::vars::VariableStore;

pub struct AiAnalyzeAction {
    analyst: Arc<dyn Analyst>,
}

impl AiAnalyzeAction {
    pub fn new(analyst: Arc<dyn Analyst>) -> Self {
        Self { analyst }
    }
}

#[async_trait]
impl ActionHandler for AiAnalyzeAction {
    fn kind(&self) -> &str {
        "ai_analyze"
    }

    async fn execute(&self, step: &Step, vars: &VariableStore) -> ActionResult {
        let prompt = vars.interpolate(step.config_str("prompt"));
        if prompt.is_empty() {
            return ActionResult::fail("ai_analyze: missing 'prompt'");
        }
        match self.analyst.analyze(&prompt).await {
            Ok(summary) => ActionResult::ok(summary),
            Err(e) => ActionResult::fail(format!("Analysis failed: {e}")),
        }
    }
}

/// Analyst over an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiAnalyst {
    endpoint: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiAnalyst {
    pub fn new(config: &AnalystConfig) -> Self {
        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Analyst for OpenAiAnalyst {
    async fn analyze(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.endpoint);
        let payload = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.1,
            "max_tokens": 800,
        });

        let mut request = self.client.post(&url).json(&payload);
        if !self.api_key.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let response = request
            .timeout(std::time::Duration::from_secs(60))
            .send()
            .await
            .map_err(|e| WeftError::Action(format!("Analyst request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(WeftError::Action(format!(
                "Analyst API error: {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| WeftError::Action(format!("Invalid analyst response: {e}")))?;

        extract_content(&body)
            .ok_or_else(|| WeftError::Action("Analyst returned no content".into()))
    }
}

fn extract_content(body: &serde_json::Value) -> Option<String> {
    let content = body
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedAnalyst(String);

    #[async_trait]
    impl Analyst for CannedAnalyst {
        async fn analyze(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_prompt_interpolation() {
        let action = AiAnalyzeAction::new(Arc::new(CannedAnalyst("Sentiment: positive".into())));
        let mut vars = VariableStore::new();
        vars.set("step_1_output", "headlines here");
        let step = Step::new(
            "analyze",
            "ai_analyze",
            serde_json::json!({"prompt": "Summarize: {{step_1_output}}"}),
        );
        let result = action.execute(&step, &vars).await;
        assert!(result.success);
        assert_eq!(result.output, "Sentiment: positive");
    }

    #[test]
    fn test_extract_content() {
        let body = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": " summary text "}}]
        });
        assert_eq!(extract_content(&body).unwrap(), "summary text");
        assert!(extract_content(&serde_json::json!({"choices": []})).is_none());
    }
}
