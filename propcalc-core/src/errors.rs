use crate::sectioned_list::SectionError;
use crate::units::UnitError;
use crate::value::Mode;
use thiserror::Error;

/// Error type for calculator operations.
///
/// The variants fall into the kinds a caller has to tell apart:
///
/// - schema errors ([`UnknownMode`](CalcError::UnknownMode),
///   [`UnknownVersion`](CalcError::UnknownVersion)) are integration bugs,
/// - [`User`](CalcError::User) carries a message for the end user,
/// - everything else is an internal defect.
#[derive(Error, Debug)]
pub enum CalcError {
    #[error("Unknown calculator mode: {0}")]
    UnknownMode(Mode),
    #[error("Unknown calculator version: {0}")]
    UnknownVersion(u32),
    #[error("{0}")]
    User(String),
    #[error("{0}")]
    Internal(String),
    #[error("Missing value for field '{0}'")]
    MissingField(String),
    #[error("Unexpected field '{0}' in calculator input")]
    UnexpectedField(String),
    #[error("Wrong type for field '{code}'. Expected {expected}, got {found}")]
    WrongType {
        code: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error(transparent)]
    Section(#[from] SectionError),
}

impl CalcError {
    /// Build a user-facing error from any message.
    pub fn user(message: impl Into<String>) -> Self {
        CalcError::User(message.into())
    }

    /// Build an internal consistency error from any message.
    pub fn internal(message: impl Into<String>) -> Self {
        CalcError::Internal(message.into())
    }

    /// Whether this error should be shown to the end user as an input problem.
    pub fn is_user_error(&self) -> bool {
        matches!(self, CalcError::User(_))
    }

    /// Whether this error comes from asking for a mode or version the calculator
    /// does not declare.
    pub fn is_schema_error(&self) -> bool {
        matches!(self, CalcError::UnknownMode(_) | CalcError::UnknownVersion(_))
    }
}

/// Conversions between fixed units only fail through a coding error.
impl From<UnitError> for CalcError {
    fn from(err: UnitError) -> Self {
        CalcError::Internal(err.to_string())
    }
}

/// Convenience type for `Result<T, CalcError>`.
pub type CalcResult<T> = Result<T, CalcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert!(CalcError::user("Bad value").is_user_error());
        assert!(!CalcError::internal("oops").is_user_error());
        assert!(CalcError::UnknownMode(7).is_schema_error());
        assert!(CalcError::UnknownVersion(3).is_schema_error());
        assert!(!CalcError::MissingField("tau".into()).is_schema_error());
    }

    #[test]
    fn test_user_message_is_preserved() {
        let err = CalcError::user("Declination should be between -90 and 90.");
        assert_eq!(err.to_string(), "Declination should be between -90 and 90.");
    }

    #[test]
    fn test_unit_error_is_internal() {
        let err: CalcError = UnitError::UnknownUnit("furlong".to_string()).into();
        assert!(matches!(err, CalcError::Internal(_)));
        assert!(!err.is_user_error());
    }

    #[test]
    fn test_section_error_converts() {
        let err: CalcError = SectionError::NoMatchingItem.into();
        assert!(matches!(err, CalcError::Section(SectionError::NoMatchingItem)));
    }
}
