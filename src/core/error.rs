use thiserror::Error;

/// Errors produced by the outbound side of the application, currently
/// the OpenAI insights client in `core::insights`.
///
/// The Mini App API has its own HTTP-shaped error type in
/// `telegram::webapp`; bot handlers report failures through `anyhow`.
/// This enum only carries what those layers consume from below.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP client errors (OpenAI and friends)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_errors_convert_and_display() {
        let err: AppError = serde_json::from_str::<i64>("not a number")
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::Json(_)));
        assert!(err.to_string().starts_with("JSON error:"));
    }

    #[test]
    fn validation_carries_its_message() {
        let err = AppError::Validation("empty completion from OpenAI".to_string());
        assert_eq!(
            err.to_string(),
            "Validation error: empty completion from OpenAI"
        );
    }
}
