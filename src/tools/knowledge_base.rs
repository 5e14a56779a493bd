use async_trait::async_trait;
use serde_json::{json, Value};

use crate::core::error::ToolError;
use crate::core::tool::*;

/// Mock knowledge-base search; never finds anything.
pub fn search_knowledge_base(query: &str) -> Value {
    json!({
        "query": query,
        "results": [],
        "count": 0,
    })
}

pub struct SearchKnowledgeBaseTool;

#[async_trait]
impl Tool for SearchKnowledgeBaseTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::single_string_arg(
            "search_knowledge_base",
            "Search the IT knowledge base for help articles.",
            "query",
            "Free-text search query",
        )
    }

    async fn run(&self, call: &ToolCall, _ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let query = call.string_arg("query")?;
        Ok(ToolResult::json(&search_knowledge_base(&query)))
    }
}
