use thiserror::Error;

/// Failures that stop a run before any row is processed.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("environment variable '{0}' is required but not set")]
    MissingEnv(&'static str),

    #[error("invalid setting {name}: {message}")]
    InvalidSetting { name: &'static str, message: String },

    #[error("invalid buying power '{0}'")]
    InvalidCapital(String),

    #[error("{service} returned status {status}: {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("no spreadsheet named '{0}' is shared with these credentials")]
    SpreadsheetNotFound(String),

    #[error("google auth: {0}")]
    Auth(#[from] gcp_auth::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure to place a single order. Recorded against the symbol; the run
/// continues.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("order rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}
