use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config at {path}: {detail}")]
    ConfigInvalid { path: String, detail: String },

    #[error("external tool is missing: {tool}. Install it with `pip install -U yt-dlp` or your package manager")]
    ExternalToolMissing { tool: String },

    #[error("external tool failed: {tool} (code={code:?}) {stderr}")]
    ExternalToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("external tool timed out after {seconds}s: {tool}")]
    ExternalToolTimedOut { tool: String, seconds: u64 },

    #[error("unusable extractor metadata for {url}: {detail}")]
    ExtractorOutput { url: String, detail: String },

    #[error("request failed for {url}: {detail}")]
    Request { url: String, detail: String },

    #[error("http {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("downloaded body is empty for {url}")]
    EmptyBody { url: String },
}

pub type Result<T> = std::result::Result<T, EngineError>;
