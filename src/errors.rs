use thiserror::Error;

/// Failures reported by the managed backend or its transport.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Network(String),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("unique constraint violated on {0}")]
    UniqueViolation(String),
    #[error("row-level policy refused the request: {0}")]
    PolicyViolation(String),
    #[error("malformed row: {0}")]
    Decode(String),
    #[error("remote function `{name}` failed: {message}")]
    Rpc { name: &'static str, message: String },
}

impl GatewayError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        GatewayError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Decode(err.to_string())
    }
}

/// Input rejected before any gateway call; `field` names the offending input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Reasons an invitation cannot be redeemed. Each maps to its own message.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InvitationError {
    #[error("invitation not found")]
    NotFound,
    #[error("invitation expired")]
    Expired,
    #[error("invitation already used")]
    Exhausted,
    #[error("invitation email mismatch")]
    EmailMismatch,
    #[error("already a member of this family")]
    AlreadyMember,
}

impl InvitationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            InvitationError::NotFound => {
                "This invitation does not exist. Check the link or ask for a new one."
            }
            InvitationError::Expired => {
                "This invitation has expired. Ask a family administrator to send a new one."
            }
            InvitationError::Exhausted => "This invitation has already been used.",
            InvitationError::EmailMismatch => {
                "This invitation was sent to a different email address. Sign in with the invited address."
            }
            InvitationError::AlreadyMember => "You are already a member of this family.",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn invitation_messages_are_distinct() {
        let all = [
            InvitationError::NotFound,
            InvitationError::Expired,
            InvitationError::Exhausted,
            InvitationError::EmailMismatch,
            InvitationError::AlreadyMember,
        ];
        let messages: HashSet<_> = all.iter().map(|err| err.user_message()).collect();
        assert_eq!(messages.len(), all.len());
    }

    #[test]
    fn validation_error_names_field() {
        let err = ValidationError::new("amount", "must be greater than zero");
        assert_eq!(err.to_string(), "amount: must be greater than zero");
    }
}
