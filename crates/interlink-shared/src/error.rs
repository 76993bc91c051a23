use thiserror::Error;

/// Why a session credential or the account behind it was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authentication error: No token provided")]
    MissingCredential,

    #[error("Authentication error: Malformed token")]
    Malformed,

    #[error("Authentication error: Token expired")]
    Expired,

    #[error("Authentication error: Invalid token")]
    InvalidSignature,

    #[error("Authentication error: User not found")]
    AccountNotFound,

    #[error("Authentication error: Role does not match account")]
    RoleMismatch,

    #[error("Authentication error: Account is deactivated")]
    AccountInactive,
}

/// A string that does not name any variant of a closed enumeration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
