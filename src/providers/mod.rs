mod openai;

#[cfg(test)]
mod tests;

pub use openai::OpenAiProvider;

use crate::core::config::AppConfig;
use crate::core::error::ProbeError;
use crate::core::model::{self, ModelId};
use crate::core::provider::Provider;
use std::sync::Arc;

/// Create the chat-completions provider for the configured (or overridden)
/// model. Fails before any network work if the credential is missing.
pub fn create_provider(
    config: &AppConfig,
    model_id: Option<&ModelId>,
) -> Result<Arc<dyn Provider>, ProbeError> {
    let api_key = config.require_api_key()?;
    let model_id = model_id.unwrap_or(&config.model);
    let model = model::resolve_model(model_id)?;

    if !model.capabilities.supports_tool_use {
        tracing::warn!(model = %model.id, "model does not advertise tool support");
    }

    Ok(Arc::new(OpenAiProvider::new(
        api_key.to_string(),
        model,
        config.base_url.clone(),
        config.max_tokens,
    )))
}
