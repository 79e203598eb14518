use thiserror::Error;

/// Errors raised by the grouping pipeline
///
/// Every variant renders as the message shown to the user, so callers can
/// surface `err.to_string()` directly. Causes of import and export failures
/// are kept for logging but never displayed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GroupError {
    /// No items left after parsing the input
    #[error("Please enter at least one item")]
    EmptyInput,

    /// Group size missing, non-numeric, zero or negative
    #[error("Group size must be a positive integer")]
    InvalidGroupSize,

    /// Shuffle requested on blank input
    #[error("Please enter items first")]
    NothingToShuffle,

    /// Import file extension not recognized
    #[error("Unsupported file format. Please use .txt, .csv, .xlsx, or .xls")]
    UnsupportedFormat(String),

    /// File read or spreadsheet parse failed
    #[error("Failed to read file. Please try again.")]
    ImportFailed(String),

    /// Export requested before any groups were generated
    #[error("Please generate groups first")]
    NoGroupsToExport,

    /// The document or spreadsheet writer failed
    #[error("Failed to export groups: {0}")]
    ExportFailed(String),
}

impl GroupError {
    /// Underlying cause, for logs
    pub fn detail(&self) -> Option<&str> {
        match self {
            GroupError::UnsupportedFormat(detail)
            | GroupError::ImportFailed(detail)
            | GroupError::ExportFailed(detail) => Some(detail),
            _ => None,
        }
    }
}

/// Errors raised by the authentication layer
#[cfg(feature = "web")]
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Email, name and password cannot be empty")]
    MissingFields,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email address is already registered")]
    EmailTaken,

    #[error("Identity provider returned an invalid profile: {0}")]
    InvalidIdentity(String),

    #[error("Google sign-in is not configured")]
    ProviderNotConfigured,

    #[error("Identity provider request failed: {0}")]
    Provider(String),

    #[error("Sign-in state did not match")]
    StateMismatch,

    #[error("User store error: {0}")]
    Store(String),

    #[error("Password hashing failed")]
    Hash,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_the_user_facing_text() {
        assert_eq!(
            GroupError::EmptyInput.to_string(),
            "Please enter at least one item"
        );
        assert_eq!(
            GroupError::InvalidGroupSize.to_string(),
            "Group size must be a positive integer"
        );
        assert_eq!(
            GroupError::UnsupportedFormat("pdf".into()).to_string(),
            "Unsupported file format. Please use .txt, .csv, .xlsx, or .xls"
        );
        assert_eq!(
            GroupError::ImportFailed("zip error".into()).to_string(),
            "Failed to read file. Please try again."
        );
        assert_eq!(
            GroupError::NoGroupsToExport.to_string(),
            "Please generate groups first"
        );
    }

    #[test]
    fn detail_is_kept_out_of_the_message() {
        let err = GroupError::ImportFailed("invalid zip header".into());
        assert_eq!(err.detail(), Some("invalid zip header"));
        assert!(!err.to_string().contains("zip"));
        assert_eq!(GroupError::EmptyInput.detail(), None);
    }
}
