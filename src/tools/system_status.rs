use async_trait::async_trait;
use serde_json::{json, Value};

use crate::core::error::ToolError;
use crate::core::tool::*;

/// Mock status page: every service is up.
pub fn check_system_status(service_name: &str) -> Value {
    json!({
        "service": service_name,
        "status": "operational",
        "uptime": "99.9%",
    })
}

pub struct CheckSystemStatusTool;

#[async_trait]
impl Tool for CheckSystemStatusTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::single_string_arg(
            "check_system_status",
            "Check the operational status of a service.",
            "service_name",
            "Name of the service to check, e.g. \"email\"",
        )
    }

    async fn run(&self, call: &ToolCall, _ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let service_name = call.string_arg("service_name")?;
        Ok(ToolResult::json(&check_system_status(&service_name)))
    }
}
