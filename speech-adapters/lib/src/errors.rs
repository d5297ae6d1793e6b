use std::path::PathBuf;

/// Errors that can occur while constructing or calling a speech adapter.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum TtsError {
    /// A required API key was not provided.
    #[error("Missing API key for {provider}")]
    MissingApiKey {
        /// The provider that needs the key.
        provider: String,
    },

    /// The HTTP request could not be completed.
    #[error("HTTP request to {provider} failed: {message}")]
    HttpError {
        /// The provider that was being contacted.
        provider: String,
        /// Description of the transport failure.
        message: String,
    },

    /// The remote API answered with a non-success status.
    #[error("{provider} API returned {status}: {message}")]
    ApiError {
        /// The provider that answered.
        provider: String,
        /// The HTTP status code.
        status: u16,
        /// The response body (or a summary of it).
        message: String,
    },

    /// The voice catalog was empty so no voice can ever be selected.
    #[error("No voices available from {provider}")]
    NoVoicesAvailable {
        /// The provider whose catalog was empty.
        provider: String,
    },

    /// Pretrained model artifacts could not be resolved.
    #[error("Failed to load model '{model}': {message}")]
    ModelLoadFailed {
        /// The model identifier (hub id or local path).
        model: String,
        /// Description of the failure.
        message: String,
    },

    /// The inference program could not be started.
    #[error("Failed to spawn {provider} process")]
    ProcessSpawnFailed {
        /// The provider whose program failed to start.
        provider: String,
        /// The underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The inference program exited unsuccessfully.
    #[error("{provider} process failed: {stderr}")]
    ProcessFailed {
        /// The provider whose program failed.
        provider: String,
        /// Captured error output.
        stderr: String,
    },

    /// A scratch directory or file could not be created.
    #[error("Failed to create temporary file")]
    TempFileError {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Generated audio could not be read back.
    #[error("Failed to decode audio at {}: {message}", path.display())]
    AudioDecodeFailed {
        /// The file that was being decoded.
        path: PathBuf,
        /// Description of the decode failure.
        message: String,
    },

    /// The external toolkit has not been provisioned yet.
    #[error("Toolkit directory {} does not exist; run the setup step first", path.display())]
    ToolkitMissing {
        /// The expected toolkit directory.
        path: PathBuf,
    },

    /// A provisioning step failed.
    #[error("Provisioning step '{step}' failed: {message}")]
    ProvisionFailed {
        /// The step that failed (e.g. "clone").
        step: String,
        /// Description of the failure.
        message: String,
    },

    /// The configuration file could not be read or parsed.
    #[error("Invalid configuration at {}: {message}", path.display())]
    Config {
        /// The configuration file path.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },

    /// Generic I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TtsError {
    /// Returns the provider name attached to this error, if any.
    pub fn provider(&self) -> Option<&str> {
        match self {
            TtsError::MissingApiKey { provider }
            | TtsError::HttpError { provider, .. }
            | TtsError::ApiError { provider, .. }
            | TtsError::NoVoicesAvailable { provider }
            | TtsError::ProcessSpawnFailed { provider, .. }
            | TtsError::ProcessFailed { provider, .. } => Some(provider),
            _ => None,
        }
    }
}
