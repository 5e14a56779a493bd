use async_trait::async_trait;
use serde_json::{json, Value};

use crate::core::error::ToolError;
use crate::core::tool::*;

/// Mock ticket desk lookup. Only ticket `5678` exists.
pub fn lookup_ticket(ticket_id: &str) -> Value {
    match ticket_id {
        "5678" => json!({
            "ticket_id": "5678",
            "status": "In Progress",
            "priority": "High",
            "user": "Alice Johnson",
            "issue": "Cannot access email",
        }),
        _ => json!({ "error": format!("Ticket {ticket_id} not found") }),
    }
}

pub struct LookupTicketTool;

#[async_trait]
impl Tool for LookupTicketTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::single_string_arg(
            "lookup_ticket",
            "Look up details for a support ticket.",
            "ticket_id",
            "Identifier of the support ticket, e.g. \"5678\"",
        )
    }

    async fn run(&self, call: &ToolCall, _ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let ticket_id = call.string_arg("ticket_id")?;
        Ok(ToolResult::json(&lookup_ticket(&ticket_id)))
    }
}
