use thiserror::Error;

/// Application-level error: a message plus the process exit code.
///
/// Exit codes:
/// - 2: invalid input, configuration or file access
/// - 3: insufficient or degenerate measurement data
/// - 4: runtime failure (terminal, internal)
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Errors raised by the hysteresis reconstruction.
///
/// Configuration errors are detected before any row is touched; data errors
/// abort the whole reconstruction. No partially computed table is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReconstructError {
    /// A required setting is missing, zero or non-finite.
    #[error("invalid setting `{field}`: {reason}")]
    InvalidSetting { field: &'static str, reason: String },

    /// Too few rows for a fixed-width window.
    #[error("insufficient data for {context}: need {needed} rows, have {available}")]
    InsufficientData {
        needed: usize,
        available: usize,
        context: &'static str,
    },

    /// The time column is not sampled at a constant increment.
    #[error("non-uniform sampling at row {row}: expected dt={expected:e}s, found {found:e}s")]
    NonUniformSampling { row: usize, expected: f64, found: f64 },

    /// A raw sample contains NaN or infinity.
    #[error("non-finite sample at row {row}")]
    NonFiniteSample { row: usize },

    /// The Vref error term is unbounded because Vref is (close to) zero.
    #[error("singular error term at row {row}: Vref={vref:e}V is below the error floor")]
    SingularErrorTerm { row: usize, vref: f64 },
}

impl ReconstructError {
    /// Whether the error stems from the settings rather than the measured data.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ReconstructError::InvalidSetting { .. })
    }
}

impl From<ReconstructError> for AppError {
    fn from(value: ReconstructError) -> Self {
        let code = if value.is_configuration() { 2 } else { 3 };
        AppError::new(code, format!("Reconstruction failed: {value}"))
    }
}
