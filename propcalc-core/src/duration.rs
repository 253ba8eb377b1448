//! Parsing of flexible duration strings.
//!
//! Time fields accept any of the following, all giving a result in hours:
//!
//! | Input | Hours |
//! |-------|-------|
//! | `1.5` | 1.5 |
//! | `1:30` | 1.5 |
//! | `1:30:36` | 1.51 |
//! | `1h30m`, `1 hr 30 min` | 1.5 |
//! | `90m`, `90 minutes` | 1.5 |
//! | `5400s` | 1.5 |

use thiserror::Error;

use crate::units::convert;

/// Error type for duration parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationError {
    #[error("empty duration")]
    Empty,
    #[error("invalid number in duration: '{0}'")]
    InvalidNumber(String),
    #[error("unknown duration unit: '{0}'")]
    UnknownUnit(String),
    #[error("duration must not be negative")]
    Negative,
}

fn parse_number(s: &str) -> Result<f64, DurationError> {
    let s = s.trim();
    match s.parse::<f64>() {
        Ok(x) if x.is_finite() => Ok(x),
        _ => Err(DurationError::InvalidNumber(s.to_string())),
    }
}

/// Length in hours of one of a time unit.
fn unit_hours(unit: &str) -> Result<f64, DurationError> {
    convert(1.0, &unit.to_ascii_lowercase(), "h")
        .map_err(|_| DurationError::UnknownUnit(unit.to_string()))
}

fn parse_sexagesimal(s: &str) -> Result<f64, DurationError> {
    let mut hours = 0.0;
    let mut scale = 1.0;
    for part in s.split(':') {
        let value = parse_number(part)?;
        if value.is_sign_negative() {
            return Err(DurationError::Negative);
        }
        hours += value * scale;
        scale /= 60.0;
    }
    Ok(hours)
}

fn parse_with_units(s: &str) -> Result<f64, DurationError> {
    let mut hours = 0.0;
    let mut chars = s.chars().peekable();

    while chars.peek().is_some() {
        let number: String = std::iter::from_fn(|| {
            chars.next_if(|c| c.is_ascii_digit() || *c == '.' || c.is_whitespace())
        })
        .collect();
        let unit: String =
            std::iter::from_fn(|| chars.next_if(|c| c.is_alphabetic() || c.is_whitespace()))
                .collect();

        if number.trim().is_empty() {
            return Err(DurationError::InvalidNumber(unit.trim().to_string()));
        }
        let unit = unit.trim();
        if unit.is_empty() {
            return Err(DurationError::UnknownUnit(String::new()));
        }
        hours += parse_number(&number)? * unit_hours(unit)?;

        // Stop on anything that is neither a number nor a unit.
        if let Some(c) = chars.peek() {
            if !(c.is_ascii_digit() || *c == '.') {
                return Err(DurationError::InvalidNumber(c.to_string()));
            }
        }
    }

    Ok(hours)
}

/// Parse a duration, returning hours.
pub fn parse_hours(s: &str) -> Result<f64, DurationError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(DurationError::Empty);
    }
    if s.starts_with('-') {
        return Err(DurationError::Negative);
    }

    if let Ok(hours) = s.parse::<f64>() {
        if !hours.is_finite() {
            return Err(DurationError::InvalidNumber(s.to_string()));
        }
        return Ok(hours);
    }
    if s.contains(':') {
        return parse_sexagesimal(s);
    }
    parse_with_units(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;

    #[test]
    fn test_plain_hours() {
        assert_eq!(parse_hours("1.5").unwrap(), 1.5);
        assert_eq!(parse_hours(" 2 ").unwrap(), 2.0);
    }

    #[test]
    fn test_sexagesimal() {
        assert!(is_close!(parse_hours("1:30").unwrap(), 1.5));
        assert!(is_close!(parse_hours("0:45:00").unwrap(), 0.75));
        assert!(is_close!(parse_hours("1:30:36").unwrap(), 1.51));
    }

    #[test]
    fn test_with_units() {
        assert!(is_close!(parse_hours("1h30m").unwrap(), 1.5));
        assert!(is_close!(parse_hours("1 hr 30 min").unwrap(), 1.5));
        assert!(is_close!(parse_hours("90 minutes").unwrap(), 1.5));
        assert!(is_close!(parse_hours("5400s").unwrap(), 1.5));
        assert!(is_close!(parse_hours("2H").unwrap(), 2.0));
    }

    #[test]
    fn test_invalid() {
        assert_eq!(parse_hours(""), Err(DurationError::Empty));
        assert_eq!(parse_hours("-1"), Err(DurationError::Negative));
        assert_eq!(
            parse_hours("3 fortnights"),
            Err(DurationError::UnknownUnit("fortnights".to_string()))
        );
        assert!(parse_hours("1:x").is_err());
        assert!(parse_hours("h").is_err());
        assert!(parse_hours("10").is_ok());
        assert!(parse_hours("10 $").is_err());
        assert_eq!(
            parse_hours("2 deg"),
            Err(DurationError::UnknownUnit("deg".to_string()))
        );
        assert!(parse_hours("inf").is_err());
    }

    #[test]
    fn test_sexagesimal_components_must_be_finite_and_positive() {
        assert_eq!(
            parse_hours("nan:00"),
            Err(DurationError::InvalidNumber("nan".to_string()))
        );
        assert_eq!(
            parse_hours("inf:0"),
            Err(DurationError::InvalidNumber("inf".to_string()))
        );
        assert_eq!(parse_hours("1:-30"), Err(DurationError::Negative));
        assert_eq!(parse_hours("1:-0"), Err(DurationError::Negative));
        assert!(is_close!(parse_hours("0:0:36").unwrap(), 0.01));
    }
}
