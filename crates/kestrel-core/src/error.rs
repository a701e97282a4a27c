/// Errors that can occur across the Kestrel toolkit.
///
/// Each variant wraps a specific error domain. Library crates use this type
/// directly; the binary crate converts to `miette::Error` at the boundary.
///
/// # Examples
///
/// ```
/// use kestrel_core::KestrelError;
///
/// let err = KestrelError::Config("missing bind address".into());
/// assert!(err.to_string().contains("missing bind address"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum KestrelError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Worker pool lifecycle or submission failure.
    #[error("pool error: {0}")]
    Pool(String),

    /// A review backend reported a failure for one file.
    #[error("review error: {0}")]
    Review(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: KestrelError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn config_error_displays_message() {
        let err = KestrelError::Config("bad value".into());
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn pool_error_displays_message() {
        let err = KestrelError::Pool("not started".into());
        assert_eq!(err.to_string(), "pool error: not started");
    }
}
