use thiserror::Error;

const SUBSCRIPTION_HINT: &str =
    "Make sure the GitHub account has an active Copilot subscription: https://github.com/features/copilot";

/// Errors raised across the credential lifecycle.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("Protocol error: {message}")]
    Protocol {
        code: Option<String>,
        message: String,
    },
    #[error("Device code expired before authorization completed")]
    Expired,
    #[error("Authorization denied by user")]
    Denied,
    #[error("GitHub token is invalid or does not have Copilot access")]
    Unauthorized,
    #[error("Copilot API not available for this account")]
    NotFound,
    #[error("Operation canceled")]
    Canceled,
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Broad failure class, used by callers to decide how to report or retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Protocol,
    AuthExpired,
    AuthDenied,
    Auth,
    NotFound,
    Canceled,
    Storage,
    Configuration,
}

impl AuthError {
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            code: None,
            message: message.into(),
        }
    }

    /// Protocol error carrying an OAuth `error` code from the provider.
    pub fn provider(code: impl Into<String>, description: Option<String>) -> Self {
        let code = code.into();
        let message = match description {
            Some(description) if !description.is_empty() => format!("{code}: {description}"),
            _ => code.clone(),
        };
        Self::Protocol {
            code: Some(code),
            message,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) | Self::Http { .. } => ErrorKind::Network,
            Self::Protocol { .. } => ErrorKind::Protocol,
            Self::Expired => ErrorKind::AuthExpired,
            Self::Denied => ErrorKind::AuthDenied,
            Self::Unauthorized => ErrorKind::Auth,
            Self::NotFound => ErrorKind::NotFound,
            Self::Canceled => ErrorKind::Canceled,
            Self::Io(_) | Self::Serialization(_) => ErrorKind::Storage,
            Self::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Transport failures and throttling/server statuses are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Http { status, .. } => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }

    /// Actionable follow-up for the human running the flow, when there is one.
    pub fn guidance(&self) -> Option<&'static str> {
        match self.kind() {
            ErrorKind::Auth | ErrorKind::NotFound => Some(SUBSCRIPTION_HINT),
            ErrorKind::AuthExpired => Some("Run `copilot-auth login` again to get a new code."),
            ErrorKind::AuthDenied => Some("Approve the request in the browser to continue."),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::de::Error> for AuthError {
    fn from(error: toml::de::Error) -> Self {
        Self::Configuration(error.to_string())
    }
}
