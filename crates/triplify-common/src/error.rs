use thiserror::Error;

#[derive(Debug, Error)]
pub enum TriplifyError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tabular parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Triplestore answered {status}: {body}")]
    Store { status: u16, body: String },

    #[error("Malformed SPARQL results: {0}")]
    Results(String),

    #[error("Invalid query description: {0}")]
    Query(String),

    #[error("Turtle error: {0}")]
    Turtle(String),

    #[error("Conversion error: {0}")]
    Convert(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("authentication required")]
    Unauthorized,

    #[error("account is blocked")]
    Locked,

    #[error("admin access required")]
    Forbidden,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TriplifyError>;
