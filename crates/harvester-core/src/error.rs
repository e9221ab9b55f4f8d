use thiserror::Error;

/// Error types for the harvester engine and browser sessions.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// The browser could not be launched or a CDP command failed.
    #[error("Browser error: {0}")]
    Browser(String),

    /// Navigating the page to the resource URL failed.
    #[error("Navigation error: {0}")]
    Navigation(String),

    /// Navigation kept failing before the engine ever started.
    #[error("Failed to visit resource {url} after {attempts} attempts")]
    NavigationExhausted { url: String, attempts: u32 },

    /// Continuing or rewriting an intercepted request failed.
    #[error("Interception error: {0}")]
    Interception(String),

    /// A payload did not contain what the extraction paths expect.
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Operation timed out.
    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl HarvestError {
    /// Returns true if this error terminates the record stream.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HarvestError::NavigationExhausted { .. })
    }
}
