// SPDX-License-Identifier: AGPL-3.0-only

//! Validation harness for the `validate_*` binaries.
//!
//! A validation binary builds a reference problem with a known answer (RPA
//! ladder, synthetic spectrum, separable pairing kernel), runs the production
//! code path on it and records each comparison here. The process exits with
//! code 0 when every check passed and 1 otherwise, so the binaries can gate
//! scripted runs.

use std::fmt::Write as _;
use std::process;

use num_complex::Complex64;

/// A single recorded comparison.
#[derive(Debug, Clone)]
pub struct Check {
    /// Human-readable label
    pub label: String,
    /// Section the check was recorded under
    pub section: String,
    /// Whether this check passed
    pub passed: bool,
    /// Observed value (for complex checks: the modulus of the deviation)
    pub observed: f64,
    /// Expected value or threshold
    pub expected: f64,
    /// Tolerance used
    pub tolerance: f64,
    /// How the tolerance was applied
    pub mode: ToleranceMode,
}

/// How a tolerance threshold is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToleranceMode {
    /// |observed - expected| < tolerance
    Absolute,
    /// |observed - expected| / |expected| < tolerance
    Relative,
    /// observed < threshold
    UpperBound,
    /// observed > threshold
    LowerBound,
    /// |z_observed - z_expected| < tolerance for complex values
    ComplexDistance,
    /// plain pass/fail
    Boolean,
}

impl std::fmt::Display for ToleranceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absolute => write!(f, "abs"),
            Self::Relative => write!(f, "rel"),
            Self::UpperBound => write!(f, "<"),
            Self::LowerBound => write!(f, ">"),
            Self::ComplexDistance => write!(f, "|dz|"),
            Self::Boolean => write!(f, "bool"),
        }
    }
}

/// Accumulates checks and produces a summary with exit code.
#[derive(Debug, Default)]
#[must_use]
pub struct ValidationHarness {
    /// Name of the validation binary
    pub name: String,
    /// All checks performed
    pub checks: Vec<Check>,
    section: String,
}

impl ValidationHarness {
    /// Create a new harness for a named validation binary.
    #[must_use = "validation harness must be used to run checks"]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            checks: Vec::new(),
            section: String::from("main"),
        }
    }

    /// Start a new section; subsequent checks are grouped under it.
    pub fn section(&mut self, title: &str) {
        println!("── {title} ──");
        self.section = title.to_string();
    }

    fn push(&mut self, label: &str, passed: bool, observed: f64, expected: f64, tolerance: f64, mode: ToleranceMode) {
        self.checks.push(Check {
            label: label.to_string(),
            section: self.section.clone(),
            passed,
            observed,
            expected,
            tolerance,
            mode,
        });
    }

    /// |observed - expected| < tolerance
    pub fn check_abs(&mut self, label: &str, observed: f64, expected: f64, tolerance: f64) {
        let passed = (observed - expected).abs() < tolerance;
        self.push(label, passed, observed, expected, tolerance, ToleranceMode::Absolute);
    }

    /// |observed - expected| / |expected| < tolerance, absolute near zero.
    pub fn check_rel(&mut self, label: &str, observed: f64, expected: f64, tolerance: f64) {
        let passed = if expected.abs() > crate::tolerances::NEAR_ZERO_EXPECTED {
            ((observed - expected) / expected).abs() < tolerance
        } else {
            observed.abs() < tolerance
        };
        self.push(label, passed, observed, expected, tolerance, ToleranceMode::Relative);
    }

    /// observed < threshold
    pub fn check_upper(&mut self, label: &str, observed: f64, threshold: f64) {
        self.push(label, observed < threshold, observed, threshold, threshold, ToleranceMode::UpperBound);
    }

    /// observed > threshold
    pub fn check_lower(&mut self, label: &str, observed: f64, threshold: f64) {
        self.push(label, observed > threshold, observed, threshold, threshold, ToleranceMode::LowerBound);
    }

    /// |observed - expected| < tolerance in the complex plane.
    pub fn check_complex(&mut self, label: &str, observed: Complex64, expected: Complex64, tolerance: f64) {
        let dist = (observed - expected).norm();
        self.push(label, dist < tolerance, dist, 0.0, tolerance, ToleranceMode::ComplexDistance);
    }

    /// Largest element-wise complex deviation between two arrays.
    pub fn check_max_deviation(&mut self, label: &str, observed: &[Complex64], expected: &[Complex64], tolerance: f64) {
        let dist = if observed.len() == expected.len() {
            observed
                .iter()
                .zip(expected)
                .map(|(a, b)| (a - b).norm())
                .fold(0.0_f64, f64::max)
        } else {
            f64::INFINITY
        };
        self.push(label, dist < tolerance, dist, 0.0, tolerance, ToleranceMode::ComplexDistance);
    }

    /// Plain pass/fail check.
    pub fn check_bool(&mut self, label: &str, passed: bool) {
        self.push(label, passed, f64::from(u8::from(passed)), 1.0, 0.0, ToleranceMode::Boolean);
    }

    /// Number of checks that passed.
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    /// Total number of checks.
    #[must_use]
    pub const fn total_count(&self) -> usize {
        self.checks.len()
    }

    /// Whether all checks passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// Render the summary table.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut s = String::new();
        let _ = writeln!(
            s,
            "═══ {} validation: {}/{} checks passed ═══",
            self.name,
            self.passed_count(),
            self.total_count()
        );
        let mut current = "";
        for check in &self.checks {
            if check.section != current {
                let _ = writeln!(s, " [{}]", check.section);
                current = &check.section;
            }
            let icon = if check.passed { "✓" } else { "✗" };
            let _ = writeln!(
                s,
                "  {icon} {}: observed={:.6e}, expected={:.6e}, tol={:.2e} ({})",
                check.label, check.observed, check.expected, check.tolerance, check.mode
            );
        }
        s
    }

    /// Print summary and exit 0 if all checks pass, 1 otherwise.
    pub fn finish(&self) -> ! {
        println!();
        print!("{}", self.summary());
        if self.all_passed() {
            println!("ALL CHECKS PASSED");
            process::exit(0);
        }
        let failed: Vec<&str> = self
            .checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.label.as_str())
            .collect();
        println!("FAILED CHECKS: {}", failed.join(", "));
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn harness_tracks_pass_fail() {
        let mut h = ValidationHarness::new("test");
        h.check_abs("exact", 1.0, 1.0, 1e-10);
        h.check_rel("close", 1.0001, 1.0, 1e-3);
        h.check_abs("far", 2.0, 1.0, 1e-3);
        assert_eq!(h.passed_count(), 2);
        assert_eq!(h.total_count(), 3);
        assert!(!h.all_passed());
    }

    #[test]
    fn complex_checks_use_distance() {
        let mut h = ValidationHarness::new("complex");
        h.check_complex("near", Complex64::new(1.0, 1.0), Complex64::new(1.0, 1.0 + 1e-12), 1e-10);
        h.check_max_deviation(
            "array",
            &[Complex64::new(0.0, 0.0), Complex64::new(1.0, 0.0)],
            &[Complex64::new(0.0, 0.0), Complex64::new(1.5, 0.0)],
            0.1,
        );
        h.check_max_deviation("length", &[Complex64::new(0.0, 0.0)], &[], 1.0);
        assert_eq!(h.passed_count(), 1);
    }

    #[test]
    fn summary_groups_by_section() {
        let mut h = ValidationHarness::new("sections");
        h.section("vertex");
        h.check_bool("gamma", true);
        h.section("ladder");
        h.check_upper("residual", 1e-9, 1e-6);
        h.check_lower("chi", 0.2, 0.0);
        let s = h.summary();
        assert!(s.contains("3/3 checks passed"));
        assert!(s.contains("[vertex]"));
        assert!(s.contains("[ladder]"));
        assert!(h.all_passed());
    }

    #[test]
    fn relative_falls_back_to_absolute_near_zero() {
        let mut h = ValidationHarness::new("zero");
        h.check_rel("zero", 1e-12, 0.0, 1e-10);
        assert!(h.all_passed());
    }
}
