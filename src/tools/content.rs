use async_trait::async_trait;
use serde_json::{Value, json};

use crate::mcp::registry::NativeTool;

const DEFAULT_SUMMARY_LENGTH: usize = 200;

#[derive(Debug, Default)]
pub struct SearchTool;

#[async_trait]
impl NativeTool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> Option<&str> {
        Some("Search the web for a query and return ranked results.")
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query." }
            },
            "required": ["query"]
        })
    }

    async fn call(&self, args: Value) -> anyhow::Result<Value> {
        let query = args["query"].as_str().unwrap_or_default();
        Ok(json!({
            "type": "search_result",
            "query": query,
            "results": [
                {"title": "Example Result 1", "url": "https://example.com/1", "snippet": "Example snippet 1"},
                {"title": "Example Result 2", "url": "https://example.com/2", "snippet": "Example snippet 2"},
            ],
            "timestamp": super::timestamp(),
        }))
    }
}

#[derive(Debug, Default)]
pub struct ExtractTool;

#[async_trait]
impl NativeTool for ExtractTool {
    fn name(&self) -> &str {
        "extract"
    }

    fn description(&self) -> Option<&str> {
        Some("Extract the main content and metadata of a web page.")
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "Page to extract." }
            },
            "required": ["url"]
        })
    }

    async fn call(&self, args: Value) -> anyhow::Result<Value> {
        let url = args["url"].as_str().unwrap_or_default();
        let now = super::timestamp();
        Ok(json!({
            "type": "extract_result",
            "url": url,
            "content": format!("Extracted content from {url}"),
            "metadata": {
                "title": "Example Page",
                "author": "Example Author",
                "date": now,
            },
            "timestamp": now,
        }))
    }
}

#[derive(Debug, Default)]
pub struct SummarizeTool;

/// First `max_length` characters of `text`, with `...` appended when cut.
fn truncate(text: &str, max_length: usize) -> String {
    match text.char_indices().nth(max_length) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[async_trait]
impl NativeTool for SummarizeTool {
    fn name(&self) -> &str {
        "summarize"
    }

    fn description(&self) -> Option<&str> {
        Some("Summarize a block of text to at most max_length characters.")
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string" },
                "max_length": { "type": "integer", "description": "Default 200." }
            },
            "required": ["text"]
        })
    }

    async fn call(&self, args: Value) -> anyhow::Result<Value> {
        let text = args["text"].as_str().unwrap_or_default();
        let max_length = args["max_length"]
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(DEFAULT_SUMMARY_LENGTH);

        Ok(json!({
            "type": "summary_result",
            "original_length": text.chars().count(),
            "summary": truncate(text, max_length),
            "timestamp": super::timestamp(),
        }))
    }
}

#[derive(Debug, Default)]
pub struct AnalyzeTool;

#[async_trait]
impl NativeTool for AnalyzeTool {
    fn name(&self) -> &str {
        "analyze"
    }

    fn description(&self) -> Option<&str> {
        Some("Analyze structured data and return insights and recommendations.")
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "data": { "type": "object" },
                "type": { "type": "string", "description": "Analysis type. Default \"general\"." }
            }
        })
    }

    async fn call(&self, args: Value) -> anyhow::Result<Value> {
        let analysis_type = args["type"].as_str().unwrap_or("general");
        Ok(json!({
            "type": "analysis_result",
            "analysis_type": analysis_type,
            "insights": [
                "Insight 1: Data shows interesting pattern",
                "Insight 2: Further investigation recommended",
            ],
            "recommendations": [
                "Consider additional data sources",
                "Perform deeper analysis on specific areas",
            ],
            "timestamp": super::timestamp(),
        }))
    }
}
