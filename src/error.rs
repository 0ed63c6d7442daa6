use thiserror::Error;

/// Failure of the orthogonal-distance line solver on a single point set.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LineFitError {
    /// Fewer than two points are masked in.
    #[error("need at least 2 kept points to fit a line, got {0}")]
    NotEnoughPoints(usize),
    /// The slope search exhausted its evaluation budget.
    #[error("solver did not converge within {iterations} evaluations")]
    NoConvergence { iterations: usize },
    /// The objective or the parameters became NaN/inf.
    #[error("solver produced non-finite parameters")]
    NonFinite,
}

/// Error kinds raised by the calibration core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalibError {
    /// Band layout does not form complete quadruples, or fewer than 2 bands.
    #[error("invalid input shape: {0}")]
    InputShape(String),
    /// A point set has fewer than 2 complete rows.
    #[error("{pair}: only {n} complete measurement(s), need at least 2")]
    InsufficientPoints { pair: String, n: usize },
    #[error("{pair}: fit failed: {source}")]
    FitFailure {
        pair: String,
        #[source]
        source: LineFitError,
    },
    #[error("{pair} is already frozen")]
    AlreadyFrozen { pair: String },
    #[error("{pair}: {reason}")]
    InvalidMaskOperation { pair: String, reason: String },
}

impl CalibError {
    /// Errors an interactive session reports and then ignores.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CalibError::AlreadyFrozen { .. } | CalibError::InvalidMaskOperation { .. }
        )
    }
}

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

impl From<CalibError> for AppError {
    fn from(err: CalibError) -> Self {
        let exit_code = match err {
            CalibError::InputShape(_) => 2,
            CalibError::InsufficientPoints { .. } => 3,
            CalibError::FitFailure { .. } => 4,
            CalibError::AlreadyFrozen { .. } | CalibError::InvalidMaskOperation { .. } => 5,
        };
        AppError::new(exit_code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calib_errors_map_to_exit_codes() {
        let shape: AppError = CalibError::InputShape("1 band".to_string()).into();
        assert_eq!(shape.exit_code(), 2);

        let fit: AppError = CalibError::FitFailure {
            pair: "Equation[2]".to_string(),
            source: LineFitError::NoConvergence { iterations: 200 },
        }
        .into();
        assert_eq!(fit.exit_code(), 4);
        assert!(fit.to_string().contains("Equation[2]"));
    }

    #[test]
    fn only_session_errors_are_recoverable() {
        assert!(CalibError::AlreadyFrozen { pair: "p".into() }.is_recoverable());
        assert!(!CalibError::InsufficientPoints { pair: "p".into(), n: 1 }.is_recoverable());
    }
}
