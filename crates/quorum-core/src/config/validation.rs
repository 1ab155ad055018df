//! Configuration validation utilities

use crate::QuorumError;
use std::fmt;

/// Configuration validation result
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Value is out of acceptable range
    OutOfRange {
        field: String,
        min: Option<String>,
        max: Option<String>,
        actual: String,
    },
    /// Custom validation failed
    Custom { field: String, message: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::OutOfRange {
                field,
                min,
                max,
                actual,
            } => {
                let range_desc = match (min, max) {
                    (Some(min), Some(max)) => format!("between {min} and {max}"),
                    (Some(min), None) => format!("at least {min}"),
                    (None, Some(max)) => format!("at most {max}"),
                    (None, None) => "in valid range".to_string(),
                };
                write!(f, "Field '{field}' must be {range_desc} (got {actual})")
            }
            ValidationError::Custom { field, message } => {
                write!(f, "Field '{field}': {message}")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for QuorumError {
    fn from(err: ValidationError) -> Self {
        QuorumError::invalid(err.to_string())
    }
}

/// Configuration validator that accumulates validation failures
#[derive(Debug, Default)]
pub struct ConfigValidator {
    errors: Vec<ValidationError>,
}

impl ConfigValidator {
    /// Create a new validator
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate that a number is within range
    pub fn range<T>(&mut self, field: &str, value: T, min: Option<T>, max: Option<T>) -> &mut Self
    where
        T: PartialOrd + Copy + fmt::Display,
    {
        let below = min.is_some_and(|m| value < m);
        let above = max.is_some_and(|m| value > m);
        if below || above {
            self.errors.push(ValidationError::OutOfRange {
                field: field.to_string(),
                min: min.map(|m| m.to_string()),
                max: max.map(|m| m.to_string()),
                actual: value.to_string(),
            });
        }
        self
    }

    /// Validate using a custom predicate
    pub fn custom(&mut self, field: &str, ok: bool, message: &str) -> &mut Self {
        if !ok {
            self.errors.push(ValidationError::Custom {
                field: field.to_string(),
                message: message.to_string(),
            });
        }
        self
    }

    /// Finish validation, returning every accumulated error
    pub fn finish(&mut self) -> ValidationResult {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_all_failures() {
        let mut v = ConfigValidator::new();
        let errors = v
            .range("a", 0u32, Some(1), None)
            .range("b", 5u32, Some(1), Some(10))
            .custom("c", false, "nope")
            .finish()
            .unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].to_string(), "Field 'a' must be at least 1 (got 0)");
        assert_eq!(errors[1].to_string(), "Field 'c': nope");
    }
}
