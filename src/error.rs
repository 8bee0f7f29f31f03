use thiserror::Error;

/// Custom error types for the volskew library
#[derive(Error, Debug)]
pub enum SkewError {
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Evaluation left the mathematical domain (negative radicand, non-positive
    /// strike/spot, zero time to expiry).
    #[error("Domain error: {0}")]
    DomainError(String),

    /// SVI parameters rejected before any evaluation took place.
    #[error("Parameter error: {0}")]
    ParameterError(String),

    #[error("No candidate points to resolve against")]
    EmptyCandidates,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Plotting error: {0}")]
    PlotError(String),

    #[error("Polars error: {0}")]
    PolarsError(#[from] polars::prelude::PolarsError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serde error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, SkewError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_message() {
        let err = SkewError::DomainError("negative radicand".into());
        assert!(format!("{err}").contains("negative radicand"));

        let err = SkewError::ParameterError("rho out of range".into());
        assert!(format!("{err}").starts_with("Parameter error"));
    }

    #[test]
    fn serde_errors_convert() {
        let parsed: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: SkewError = parsed.unwrap_err().into();
        assert!(matches!(err, SkewError::SerdeError(_)));
    }
}
