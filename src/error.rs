//! Error types shared by the credential chain and the lookup providers.

use thiserror::Error;

/// Errors produced while parsing or rendering a placeholder template.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// The template text could not be parsed
    #[error("malformed template {template:?}: {reason}")]
    Malformed { template: String, reason: String },

    /// The template names a placeholder that can never be supplied
    #[error("unknown placeholder {{{name}}} in template {template:?}")]
    UnknownPlaceholder { name: String, template: String },

    /// A placeholder had no value at substitution time
    #[error("no value supplied for placeholder {{{0}}}")]
    MissingValue(String),

    /// Basic authentication needs a user name and optionally a password
    #[error("basic authentication expects 1 or 2 auth fields, found {0}")]
    InvalidAuthFields(usize),
}

/// Errors that prevent forming or completing a single lookup.
///
/// None of these escape `HttpProvider::lookup_ioc`; they are recorded in
/// the returned `LookupResult` instead.
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Provider does not support this type {0}.")]
    UnsupportedType(String),

    #[error("Unsupported verb {0}")]
    UnsupportedVerb(String),

    #[error("Unknown auth type {0}")]
    UnsupportedAuth(String),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("invalid request url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("unable to decode response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request failed: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl LookupError {
    /// Short type name recorded alongside the message in a failed result.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::UnsupportedType(_) => "UnsupportedTypeError",
            Self::UnsupportedVerb(_) => "UnsupportedVerbError",
            Self::UnsupportedAuth(_) => "UnsupportedAuthError",
            Self::Template(_) => "TemplateSubstitutionError",
            Self::InvalidUrl(_) => "InvalidUrlError",
            Self::Json(_) => "JSONDecodeError",
            Self::Transport(_) => "NetworkError",
        }
    }
}

impl From<reqwest::Error> for LookupError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(Box::new(e))
    }
}

/// Raised when a provider instance cannot be built.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error(
        "Parameter values missing for Provider '{provider}'. Missing parameters are: {}",
        quoted_list(.missing)
    )]
    MissingParameters {
        provider: String,
        missing: Vec<String>,
    },

    #[error("Provider '{provider}' has an invalid query definition '{key}': {source}")]
    InvalidTemplate {
        provider: String,
        key: String,
        #[source]
        source: TemplateError,
    },

    #[error("unable to create HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

fn quoted_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("'{item}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Raised from `connect` when no usable credential pair can be produced.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("unknown Azure cloud '{0}'")]
    UnknownCloud(String),

    #[error("Could not obtain credentials from any of [{}]: {message}", .attempted.join(", "))]
    ChainExhausted {
        attempted: Vec<String>,
        message: String,
    },

    #[error(transparent)]
    Credential(#[from] azure_core::Error),
}
