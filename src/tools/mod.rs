mod knowledge_base;
mod system_status;
mod ticket;

pub use knowledge_base::{search_knowledge_base, SearchKnowledgeBaseTool};
pub use system_status::{check_system_status, CheckSystemStatusTool};
pub use ticket::{lookup_ticket, LookupTicketTool};

use crate::core::tool::Tool;
use std::sync::Arc;


/// The mock IT-support tool set handed to the agent.
pub fn create_all_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(LookupTicketTool),
        Arc::new(SearchKnowledgeBaseTool),
        Arc::new(CheckSystemStatusTool),
    ]
}
