use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Agent '{agent}' exceeded {limit} model calls in one invocation")]
    LlmCallLimit { agent: String, limit: u32 },

    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProbeError {
    /// Name of the unset credential variable, when that is what failed.
    pub fn missing_credential(&self) -> Option<&str> {
        match self {
            Self::Config(ConfigError::MissingCredential(var)) => Some(var.as_str()),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),
}

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session not found: {app_name}/{user_id}/{session_id}")]
    NotFound {
        app_name: String,
        user_id: String,
        session_id: String,
    },

    #[error("Session already exists: {0}")]
    AlreadyExists(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file error: {0}")]
    File(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("{0} not set")]
    MissingCredential(String),
}
