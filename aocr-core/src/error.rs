use thiserror::Error;

/// All errors produced by aocr-core.
#[derive(Debug, Error)]
pub enum OcrError {
    /// Malformed property input, caught before anything reaches the native layer.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("engine is busy: {owner} is using it; create one engine per thread")]
    EngineBusy { owner: String },

    #[error("engine is not running")]
    NotRunning,

    #[error("engine failed to start: {0}")]
    EngineStartFailure(String),

    #[error("failed to load native OCR library: {message}\n{diagnostics}")]
    NativeLoadFailure {
        message: String,
        diagnostics: String,
    },

    #[error("recognition failed: {0}")]
    RecognitionFailure(String),

    #[error("one-time setup failed with code {code}")]
    Setup { code: i32 },

    #[error("failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("image error: {0}")]
    Image(String),

    #[error("worker pool has been shut down")]
    PoolShutdown,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OcrError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub(crate) fn argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// True for errors raised before the native layer was touched.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfiguration(_)
                | Self::InvalidArgument(_)
                | Self::EngineBusy { .. }
                | Self::NotRunning
        )
    }
}

pub type Result<T> = std::result::Result<T, OcrError>;
