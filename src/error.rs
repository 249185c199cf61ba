use miette::Diagnostic;
use thiserror::Error;

pub type GbResult<T> = Result<T, GbError>;

/// Fatal failures: the system itself could not complete an operation.
///
/// Content problems (dangling references, invalid enums, orphan nodes) are
/// never errors of this type; they are reported as [`crate::Diagnostic`]
/// values so callers always receive the complete list.
#[derive(Debug, Error, Diagnostic)]
pub enum GbError {
    #[error("io error: {0}")]
    #[diagnostic(code("gb.io"))]
    Io(#[from] std::io::Error),

    #[error("{file}: csv parse failure: {message}")]
    #[diagnostic(
        code("gb.csv_parse"),
        help("The file could not be tokenized at all; fix the malformed row and retry")
    )]
    CsvParse { file: String, message: String },

    #[error("json error: {0}")]
    #[diagnostic(code("gb.json"))]
    Json(#[from] serde_json::Error),

    #[error("config parse error: {0}")]
    #[diagnostic(code("gb.config"))]
    Config(#[from] toml::de::Error),

    #[error("invalid story package: {0}")]
    #[diagnostic(code("gb.package"))]
    Package(String),
}
