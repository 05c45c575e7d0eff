use thiserror::Error;

/// Failures the core can report. Everything else in the bot is plain `anyhow`.
#[derive(Error, Debug)]
pub(crate) enum BotError {
    #[error("{entity} '{key}' not found")]
    NotFound { entity: &'static str, key: String },

    /// Network, HTTP or payload failure. Retried on the next natural cycle only.
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("{entity} '{key}' already exists")]
    AlreadyExists { entity: &'static str, key: String },

    #[error("not allowed")]
    Unauthorized,
}

impl BotError {
    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub(crate) fn already_exists(entity: &'static str, key: impl ToString) -> Self {
        Self::AlreadyExists {
            entity,
            key: key.to_string(),
        }
    }

    pub(crate) fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub(crate) fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<reqwest::Error> for BotError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transient(err.to_string())
    }
}

impl From<serde_json::Error> for BotError {
    fn from(err: serde_json::Error) -> Self {
        Self::Transient(format!("malformed payload: {}", err))
    }
}
