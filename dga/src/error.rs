// SPDX-License-Identifier: AGPL-3.0-only

//! Typed errors for the DΓA pipeline and its solvers.
//!
//! Public APIs return `Result<_, DgaError>` so callers can tell a bad input
//! file from a frequency box that is too small or a solver that ran out of
//! iterations, instead of parsing opaque strings.

use std::fmt;

/// Errors arising from data loading, configuration, or numerical solvers.
#[derive(Debug)]
pub enum DgaError {
    /// Data file loading or writing failed (path, underlying IO or parse error).
    DataLoad(String),

    /// Configuration file is missing, malformed, or inconsistent.
    Config(String),

    /// Array dimensions do not agree (expected vs. found).
    Shape {
        /// What was being built or combined.
        context: String,
        /// Expected length or dimension.
        expected: usize,
        /// Length or dimension that was found.
        found: usize,
    },

    /// A Matsubara frequency box is too small for the requested operation.
    FrequencyBox(String),

    /// A matrix that must be inverted is numerically singular.
    SingularMatrix(String),

    /// An iterative solver exhausted its iteration budget.
    NoConvergence {
        /// Solver name.
        solver: &'static str,
        /// Iterations performed before giving up.
        iterations: usize,
    },

    /// A NaN appeared in an iterative quantity.
    NotANumber(String),

    /// A function argument is outside its valid domain.
    InvalidArgument(String),
}

impl fmt::Display for DgaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DataLoad(msg) => write!(f, "Data loading failed: {msg}"),
            Self::Config(msg) => write!(f, "Invalid configuration: {msg}"),
            Self::Shape {
                context,
                expected,
                found,
            } => write!(
                f,
                "Shape mismatch in {context}: expected {expected}, found {found}"
            ),
            Self::FrequencyBox(msg) => write!(f, "Frequency box too small: {msg}"),
            Self::SingularMatrix(msg) => write!(f, "Singular matrix: {msg}"),
            Self::NoConvergence { solver, iterations } => {
                write!(f, "{solver} did not converge after {iterations} iterations")
            }
            Self::NotANumber(msg) => write!(f, "NaN encountered: {msg}"),
            Self::InvalidArgument(msg) => write!(f, "Invalid argument: {msg}"),
        }
    }
}

impl std::error::Error for DgaError {}

impl From<std::io::Error> for DgaError {
    fn from(e: std::io::Error) -> Self {
        Self::DataLoad(e.to_string())
    }
}

impl From<serde_json::Error> for DgaError {
    fn from(e: serde_json::Error) -> Self {
        Self::DataLoad(format!("JSON: {e}"))
    }
}

impl From<serde_yaml::Error> for DgaError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Config(format!("YAML: {e}"))
    }
}

/// Shorthand used throughout the crate.
pub type Result<T> = std::result::Result<T, DgaError>;

/// Fails with [`DgaError::Shape`] when two lengths differ.
pub(crate) fn ensure_len(context: &str, expected: usize, found: usize) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(DgaError::Shape {
            context: context.to_string(),
            expected,
            found,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_data_load() {
        let err = DgaError::DataLoad("missing file".into());
        assert_eq!(err.to_string(), "Data loading failed: missing file");
    }

    #[test]
    fn display_shape() {
        let err = DgaError::Shape {
            context: "bubble".into(),
            expected: 8,
            found: 6,
        };
        assert_eq!(
            err.to_string(),
            "Shape mismatch in bubble: expected 8, found 6"
        );
    }

    #[test]
    fn display_no_convergence() {
        let err = DgaError::NoConvergence {
            solver: "Newton optimizer",
            iterations: 20_000,
        };
        assert!(err.to_string().contains("Newton optimizer"));
        assert!(err.to_string().contains("20000"));
    }

    #[test]
    fn io_error_converts_to_data_load() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "nope");
        let err: DgaError = io.into();
        assert!(matches!(err, DgaError::DataLoad(_)));
    }

    #[test]
    fn ensure_len_reports_mismatch() {
        assert!(ensure_len("x", 3, 3).is_ok());
        let err = ensure_len("gchi0", 4, 5);
        assert!(matches!(
            err,
            Err(DgaError::Shape {
                expected: 4,
                found: 5,
                ..
            })
        ));
    }

    #[test]
    fn error_trait_works() {
        let err = DgaError::SingularMatrix("gchi_aux".into());
        let dyn_err: &dyn std::error::Error = &err;
        assert_eq!(dyn_err.to_string(), "Singular matrix: gchi_aux");
    }
}
