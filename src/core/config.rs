use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::error::ConfigError;
use crate::core::model::{ModelId, DEFAULT_MODEL};

/// OpenAI API base URL (the provider appends `/v1/chat/completions`)
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub const MODEL_ENV: &str = "AGENT_PROBE_MODEL";

const CONFIG_DIR_NAME: &str = "agent-probe";
const LOCAL_CONFIG_FILE: &str = "agent-probe.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,

    /// Credential for the chat-completions endpoint
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: ModelId,

    /// Sent as `max_completion_tokens` when set
    #[serde(default)]
    pub max_tokens: Option<u64>,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub session: SessionConfig,

    /// Use the SSE endpoint and surface partial events
    #[serde(default)]
    pub streaming: bool,

    #[serde(default)]
    pub debug: bool,
}

fn default_working_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}

fn default_model() -> ModelId {
    ModelId(DEFAULT_MODEL.into())
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            working_dir: default_working_dir(),
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            max_tokens: None,
            agent: AgentConfig::default(),
            session: SessionConfig::default(),
            streaming: false,
            debug: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_name")]
    pub name: String,

    #[serde(default = "default_description")]
    pub description: String,

    #[serde(default = "default_instruction")]
    pub instruction: String,

    /// Upper bound on model calls in one invocation
    #[serde(default = "default_max_llm_calls")]
    pub max_llm_calls: u32,
}

fn default_agent_name() -> String {
    "it_support_agent".into()
}

fn default_description() -> String {
    "An IT support agent".into()
}

fn default_instruction() -> String {
    "You are an IT support agent. Use the tools to help users.".into()
}

fn default_max_llm_calls() -> u32 {
    20
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            description: default_description(),
            instruction: default_instruction(),
            max_llm_calls: default_max_llm_calls(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,

    #[serde(default = "default_user_id")]
    pub user_id: String,

    #[serde(default = "default_session_id")]
    pub session_id: String,
}

fn default_app_name() -> String {
    "it_support_test".into()
}

fn default_user_id() -> String {
    "debug_user".into()
}

fn default_session_id() -> String {
    "debug_session".into()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            user_id: default_user_id(),
            session_id: default_session_id(),
        }
    }
}

pub fn load_config(working_dir: Option<PathBuf>) -> Result<AppConfig, ConfigError> {
    let wd = working_dir.unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    // Global config first, project-local overrides it
    let mut layers = Vec::new();
    if let Some(config_dir) = dirs::config_dir() {
        let global_path = config_dir.join(CONFIG_DIR_NAME).join("config.json");
        if global_path.exists() {
            layers.push(read_config_file(&global_path)?);
        }
    }

    let local_path = wd.join(LOCAL_CONFIG_FILE);
    if local_path.exists() {
        layers.push(read_config_file(&local_path)?);
    }

    let mut config = config_from_layers(layers)?;
    config.working_dir = wd;
    apply_env(&mut config, |var| std::env::var(var).ok());

    Ok(config)
}

/// Read one config file as raw JSON. It must hold an object.
pub fn read_config_file(path: &Path) -> Result<serde_json::Value, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::File(format!("{}: {e}", path.display())))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| ConfigError::Invalid(format!("{}: {e}", path.display())))?;
    if !value.is_object() {
        return Err(ConfigError::Invalid(format!(
            "{}: expected a JSON object",
            path.display()
        )));
    }
    Ok(value)
}

/// Fold config layers in order and fill the gaps with defaults. Any key a
/// later layer sets wins, including one set back to its default value.
pub fn config_from_layers(
    layers: impl IntoIterator<Item = serde_json::Value>,
) -> Result<AppConfig, ConfigError> {
    let mut merged = serde_json::Value::Object(serde_json::Map::new());
    for layer in layers {
        merge_config(&mut merged, layer);
    }
    serde_json::from_value(merged).map_err(|e| ConfigError::Invalid(e.to_string()))
}

/// Overlay `overlay` onto `base` key by key. Nested objects merge; anything
/// else replaces.
pub fn merge_config(base: &mut serde_json::Value, overlay: serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base), serde_json::Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_config(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Environment overrides. Empty values count as unset.
pub fn apply_env(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    let non_empty = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

    if let Some(key) = non_empty(API_KEY_ENV) {
        config.api_key = Some(key);
    }
    if let Some(url) = non_empty(BASE_URL_ENV) {
        config.base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(model) = non_empty(MODEL_ENV) {
        config.model = ModelId(model);
    }
}

impl AppConfig {
    /// The credential, or `MissingCredential` naming the variable to set.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        match self.api_key.as_deref() {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(ConfigError::MissingCredential(API_KEY_ENV.into())),
        }
    }
}
