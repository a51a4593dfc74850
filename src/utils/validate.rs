// src/utils/validate.rs

use uuid::Uuid;

use crate::{
    config::{MAX_PERCENT, MIN_PERCENT},
    error::AppError,
};

/// Parses an opaque identifier coming from a path or body.
/// The nil UUID is rejected, it never names a stored record.
pub fn parse_id(field: &str, raw: &str) -> Result<Uuid, AppError> {
    match Uuid::parse_str(raw.trim()) {
        Ok(id) if !id.is_nil() => Ok(id),
        _ => Err(AppError::InvalidArgument(format!(
            "Invalid {}: '{}'",
            field, raw
        ))),
    }
}

pub fn check_percent(field: &str, value: f64) -> Result<f64, AppError> {
    if value.is_finite() && (MIN_PERCENT..=MAX_PERCENT).contains(&value) {
        Ok(value)
    } else {
        Err(AppError::InvalidArgument(format!(
            "{} must be between {} and {}",
            field, MIN_PERCENT, MAX_PERCENT
        )))
    }
}

pub fn check_non_negative(field: &str, value: i64) -> Result<i64, AppError> {
    if value >= 0 {
        Ok(value)
    } else {
        Err(AppError::InvalidArgument(format!("{} cannot be negative", field)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id("course_id", &id.to_string()).unwrap(), id);
        assert!(parse_id("course_id", "not-a-uuid").is_err());
        assert!(parse_id("course_id", "").is_err());
        assert!(parse_id("course_id", &Uuid::nil().to_string()).is_err());
    }

    #[test]
    fn test_check_percent_bounds() {
        assert!(check_percent("percent", 0.0).is_ok());
        assert!(check_percent("percent", 100.0).is_ok());
        assert!(check_percent("percent", 100.01).is_err());
        assert!(check_percent("percent", -1.0).is_err());
        assert!(check_percent("percent", f64::NAN).is_err());
    }

    #[test]
    fn test_check_non_negative() {
        assert_eq!(check_non_negative("delta", 0).unwrap(), 0);
        assert!(check_non_negative("delta", -5).is_err());
    }
}
