use std::fmt;

/// Errors surfaced to the UI layer. `Clone` is required because a single
/// failed token refresh is shared with every request that awaited it.
#[derive(Clone, Debug)]
pub enum AppError {
    Config(String),
    Network(String),
    Timeout(String),
    Http {
        status: u16,
        message: String,
        code: Option<String>,
    },
    Parse(String),
    Serialization(String),
    Storage(String),
}

impl AppError {
    /// Picks the message shown to the user for a failed operation: the
    /// server-provided message when one exists, otherwise the operation's
    /// fallback text.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            AppError::Http { message, .. } if !message.trim().is_empty() => message.clone(),
            AppError::Timeout(message) | AppError::Network(message)
                if !message.trim().is_empty() =>
            {
                message.clone()
            }
            _ => fallback.to_string(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(message) => write!(formatter, "Config error: {message}"),
            AppError::Network(message) => write!(formatter, "Network error: {message}"),
            AppError::Timeout(message) => write!(formatter, "Timeout: {message}"),
            AppError::Http {
                status, message, ..
            } => {
                write!(formatter, "Request failed ({status}): {message}")
            }
            AppError::Parse(message) => write!(formatter, "Response error: {message}"),
            AppError::Serialization(message) => {
                write!(formatter, "Request error: {message}")
            }
            AppError::Storage(message) => write!(formatter, "Storage error: {message}"),
        }
    }
}

impl std::error::Error for AppError {}
