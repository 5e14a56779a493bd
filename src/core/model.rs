use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::core::error::ProviderError;

/// Route prefix understood by the OpenAI-compatible provider.
pub const OPENAI_ROUTE: &str = "openai";

pub const DEFAULT_MODEL: &str = "openai/gpt-5-nano";

/// Model reference as written by the user, e.g. `openai/gpt-5-nano`.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ModelId(pub String);

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ModelId {
    fn from(s: &str) -> Self {
        ModelId(s.to_string())
    }
}

impl ModelId {
    /// Split into `(route, api_name)`. A bare name routes to OpenAI.
    pub fn route(&self) -> (&str, &str) {
        match self.0.split_once('/') {
            Some((route, name)) => (route, name),
            None => (OPENAI_ROUTE, self.0.as_str()),
        }
    }

    /// Name sent in the `model` field of the request body.
    pub fn api_name(&self) -> Result<&str, ProviderError> {
        let (route, name) = self.route();
        if route != OPENAI_ROUTE || name.is_empty() {
            return Err(ProviderError::UnsupportedModel(self.0.clone()));
        }
        Ok(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCapabilities {
    pub supports_tool_use: bool,
    pub supports_streaming: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub id: ModelId,
    pub api_name: String,
    pub display_name: String,
    pub context_window: u64,
    pub max_output_tokens: u64,
    pub capabilities: ModelCapabilities,
}

fn entry(api_name: &str, display_name: &str, context_window: u64, max_output_tokens: u64) -> Model {
    Model {
        id: ModelId(format!("{OPENAI_ROUTE}/{api_name}")),
        api_name: api_name.into(),
        display_name: display_name.into(),
        context_window,
        max_output_tokens,
        capabilities: ModelCapabilities {
            supports_tool_use: true,
            supports_streaming: true,
        },
    }
}

/// Known OpenAI chat models, keyed by API name.
pub fn builtin_models() -> HashMap<String, Model> {
    [
        entry("gpt-5", "GPT-5", 400_000, 128_000),
        entry("gpt-5-mini", "GPT-5 mini", 400_000, 128_000),
        entry("gpt-5-nano", "GPT-5 nano", 400_000, 128_000),
        entry("gpt-4.1", "GPT-4.1", 1_047_576, 32_768),
        entry("gpt-4.1-mini", "GPT-4.1 mini", 1_047_576, 32_768),
        entry("gpt-4o-mini", "GPT-4o mini", 128_000, 16_384),
    ]
    .into_iter()
    .map(|m| (m.api_name.clone(), m))
    .collect()
}

/// Resolve a model reference. Unknown names on the OpenAI route get a
/// generic entry so custom deployments still work.
pub fn resolve_model(id: &ModelId) -> Result<Model, ProviderError> {
    let api_name = id.api_name()?;
    let mut model = builtin_models()
        .remove(api_name)
        .unwrap_or_else(|| Model {
            id: id.clone(),
            api_name: api_name.to_string(),
            display_name: api_name.to_string(),
            context_window: 128_000,
            max_output_tokens: 16_384,
            capabilities: ModelCapabilities {
                supports_tool_use: true,
                supports_streaming: true,
            },
        });
    model.id = id.clone();
    Ok(model)
}
