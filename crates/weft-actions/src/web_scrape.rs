//! Web scrape step — search the web and return result snippets.
//!
//! Uses DuckDuckGo HTML search (no API key required) and a hand-rolled
//! extractor; good enough for feeding snippets into later analysis steps.

use async_trait::async_trait;
use weft_core::traits::ActionHandler;
use weft_core::types::{ActionResult, Step};
use weft_core::vars::VariableStore;

const OUTPUT_LIMIT: usize = 1500;
const MAX_RESULTS: usize = 5;

pub struct WebScrapeAction {
    client: reqwest::Client,
}

impl WebScrapeAction {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for WebScrapeAction {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionHandler for WebScrapeAction {
    fn kind(&self) -> &str {
        "web_scrape"
    }

    async fn execute(&self, step: &Step, vars: &VariableStore) -> ActionResult {
        let query = vars.interpolate(step.config_str("query"));
        if query.is_empty() {
            return ActionResult::fail("web_scrape: missing 'query'");
        }

        let url = format!(
            "https://html.duckduckgo.com/html/?q={}",
            urlencoding::encode(&query)
        );
        let response = match self
            .client
            .get(&url)
            .header("User-Agent", "Weft/0.3")
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => return ActionResult::fail(format!("Scrape failed: {e}")),
        };

        let html = match response.text().await {
            Ok(html) => html,
            Err(e) => return ActionResult::fail(format!("Scrape read failed: {e}")),
        };

        let results = parse_results(&html, MAX_RESULTS);
        if results.is_empty() {
            return ActionResult::fail(format!("No results found for: {query}"));
        }

        let mut out = String::new();
        for (i, (title, snippet)) in results.iter().enumerate() {
            out.push_str(&format!("{}. {title}\n   {snippet}\n", i + 1));
        }
        ActionResult::ok(out.chars().take(OUTPUT_LIMIT).collect::<String>())
    }
}

/// Extract (title, snippet) pairs from DuckDuckGo's HTML results page.
fn parse_results(html: &str, max: usize) -> Vec<(String, String)> {
    let mut results = Vec::new();

    for segment in html.split("class=\"result__a\"").skip(1).take(max) {
        let title = extract_between(segment, ">", "</a>")
            .unwrap_or_default()
            .replace("<b>", "")
            .replace("</b>", "");

        let snippet = if let Some(snip_seg) = segment.split("class=\"result__snippet\"").nth(1) {
            extract_between(snip_seg, ">", "</")
                .unwrap_or_default()
                .replace("<b>", "")
                .replace("</b>", "")
        } else {
            String::new()
        };

        if !title.is_empty() {
            results.push((title.trim().to_string(), snippet.trim().to_string()));
        }
    }
    results
}

fn extract_between(text: &str, start: &str, end: &str) -> Option<String> {
    let start_idx = text.find(start)? + start.len();
    let remaining = &text[start_idx..];
    let end_idx = remaining.find(end)?;
    Some(remaining[..end_idx].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_results() {
        let html = r##"
            <a rel="nofollow" class="result__a" href="https://example.com">Apple <b>earnings</b> beat</a>
            <a class="result__snippet" href="#">Shares rose after strong results.</a>
            <a rel="nofollow" class="result__a" href="https://other.com">Second hit</a>
        "##;
        let results = parse_results(html, 5);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "Apple earnings beat");
        assert_eq!(results[0].1, "Shares rose after strong results.");
        assert_eq!(results[1].0, "Second hit");
    }

    #[test]
    fn test_parse_empty_page() {
        assert!(parse_results("<html><body>no results</body></html>", 5).is_empty());
    }

    #[tokio::test]
    async fn test_missing_query_fails() {
        let action = WebScrapeAction::new();
        let step = Step::new("scrape", "web_scrape", serde_json::json!({}));
        let result = action.execute(&step, &VariableStore::new()).await;
        assert!(!result.success);
    }
}
