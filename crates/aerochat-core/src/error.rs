use thiserror::Error;

/// Top-level error type for aerochat.
///
/// Covers the failures shared by every crate: configuration and file I/O.
/// The chat engine defines its own `ChatError` and converts
/// from this type so that `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AeroError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown locale: {0}")]
    UnknownLocale(String),
}

impl From<toml::de::Error> for AeroError {
    fn from(err: toml::de::Error) -> Self {
        AeroError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for AeroError {
    fn from(err: toml::ser::Error) -> Self {
        AeroError::Config(err.to_string())
    }
}

/// A specialized `Result` type for aerochat operations.
pub type Result<T> = std::result::Result<T, AeroError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AeroError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");

        let err = AeroError::UnknownLocale("fr".to_string());
        assert_eq!(err.to_string(), "Unknown locale: fr");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let aero_err: AeroError = io_err.into();
        assert!(matches!(aero_err, AeroError::Io(_)));
        assert!(aero_err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let aero_err: AeroError = err.unwrap_err().into();
        assert!(matches!(aero_err, AeroError::Config(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let _value = io_result?;
            Ok("success".to_string())
        }

        assert_eq!(inner().unwrap(), "success");
    }

    #[test]
    fn test_io_error_display_includes_message() {
        let io_err =
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        let display = AeroError::from(io_err).to_string();
        assert!(display.starts_with("I/O error:"));
        assert!(display.contains("connection refused"));
    }
}
