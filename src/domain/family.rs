//! Families, memberships, join requests, and invitations.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::currency::CurrencyCode;
use crate::domain::common::{Identifiable, NamedEntity};
use crate::domain::member::Role;
use crate::errors::{InvitationError, ValidationError};

pub const PUBLIC_ID_LEN: usize = 8;
/// Unambiguous alphabet for public codes (no 0/O, 1/I).
pub const PUBLIC_ID_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const INVITATION_TOKEN_LEN: usize = 32;

/// The signed-in identity as reported by the external identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
}

impl Identity {
    pub fn new(id: Uuid, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
        }
    }

    pub fn normalized_email(&self) -> String {
        normalize_email(&self.email)
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Family {
    pub id: Uuid,
    pub name: String,
    pub public_id: String,
    pub currency: CurrencyCode,
    pub timezone: String,
}

impl Identifiable for Family {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for Family {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Derives a public code from random bytes using [`PUBLIC_ID_ALPHABET`].
pub fn public_id_from(seed: Uuid) -> String {
    seed.as_bytes()
        .iter()
        .take(PUBLIC_ID_LEN)
        .map(|byte| PUBLIC_ID_ALPHABET[*byte as usize % PUBLIC_ID_ALPHABET.len()] as char)
        .collect()
}

/// Uppercases and checks a user-entered public code.
pub fn normalize_public_id(raw: &str) -> Result<String, ValidationError> {
    let candidate = raw.trim().to_ascii_uppercase();
    let valid = candidate.len() == PUBLIC_ID_LEN
        && candidate.bytes().all(|byte| PUBLIC_ID_ALPHABET.contains(&byte));
    if valid {
        Ok(candidate)
    } else {
        Err(ValidationError::new(
            "public_id",
            format!("`{}` is not a valid family code", raw.trim()),
        ))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Active,
    Inactive,
}

/// Grants an identity a role within one family.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Membership {
    pub id: Uuid,
    pub identity_id: Uuid,
    pub family_id: Uuid,
    pub role: Role,
    pub status: MembershipStatus,
    pub created_at: DateTime<Utc>,
}

impl Membership {
    pub fn new(identity_id: Uuid, family_id: Uuid, role: Role, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity_id,
            family_id,
            role,
            status: MembershipStatus::Active,
            created_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Active
    }
}

impl Identifiable for Membership {
    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JoinRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl JoinRequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JoinRequestStatus::Pending)
    }
}

impl fmt::Display for JoinRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JoinRequestStatus::Pending => "pending",
            JoinRequestStatus::Approved => "approved",
            JoinRequestStatus::Rejected => "rejected",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JoinRequest {
    pub id: Uuid,
    pub family_id: Uuid,
    pub requester_id: Uuid,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub status: JoinRequestStatus,
    pub created_at: DateTime<Utc>,
}

impl JoinRequest {
    pub fn new(
        family_id: Uuid,
        requester: &Identity,
        message: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            family_id,
            requester_id: requester.id,
            email: requester.normalized_email(),
            message: message
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty()),
            status: JoinRequestStatus::Pending,
            created_at: now,
        }
    }

    /// Moves a pending request to a terminal state; resolved requests are frozen.
    pub fn resolve(&mut self, approve: bool) -> Result<(), JoinRequestStatus> {
        if self.status.is_terminal() {
            return Err(self.status);
        }
        self.status = if approve {
            JoinRequestStatus::Approved
        } else {
            JoinRequestStatus::Rejected
        };
        Ok(())
    }
}

impl Identifiable for JoinRequest {
    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invitation {
    pub id: Uuid,
    pub family_id: Uuid,
    pub email: String,
    pub token: String,
    pub suggested_role: Role,
    pub expires_at: DateTime<Utc>,
    pub uses_remaining: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Invitation {
    pub fn new(
        family_id: Uuid,
        email: &str,
        suggested_role: Role,
        expires_at: DateTime<Utc>,
        uses: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            family_id,
            email: normalize_email(email),
            token: generate_token(),
            suggested_role,
            expires_at,
            uses_remaining: uses,
            used_at: None,
            created_at: now,
        }
    }

    /// Checks every redemption precondition without mutating the invitation.
    pub fn check_redeemable(
        &self,
        claimed_email: &str,
        now: DateTime<Utc>,
    ) -> Result<(), InvitationError> {
        if now >= self.expires_at {
            return Err(InvitationError::Expired);
        }
        if self.uses_remaining == 0 {
            return Err(InvitationError::Exhausted);
        }
        if normalize_email(claimed_email) != self.email {
            return Err(InvitationError::EmailMismatch);
        }
        Ok(())
    }

    pub fn consume(&mut self, now: DateTime<Utc>) {
        self.uses_remaining = self.uses_remaining.saturating_sub(1);
        self.used_at = Some(now);
    }
}

impl Identifiable for Invitation {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// Opaque, unguessable invitation token (32 lowercase hex characters).
pub fn generate_token() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn validate_token_format(token: &str) -> Result<(), ValidationError> {
    let well_formed = token.len() == INVITATION_TOKEN_LEN
        && token
            .chars()
            .all(|ch| ch.is_ascii_digit() || ('a'..='f').contains(&ch));
    if well_formed {
        Ok(())
    } else {
        Err(ValidationError::new(
            "token",
            "invitation link is malformed; ask for a new one",
        ))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn public_id_roundtrips_through_normalization() {
        let code = public_id_from(Uuid::new_v4());
        assert_eq!(code.len(), PUBLIC_ID_LEN);
        assert_eq!(normalize_public_id(&code.to_lowercase()).unwrap(), code);
        assert!(normalize_public_id("ABC").is_err());
        assert!(normalize_public_id("ABCDEFG0").is_err());
    }

    #[test]
    fn join_request_resolves_once() {
        let identity = Identity::new(Uuid::new_v4(), "Sam@Example.com");
        let mut request = JoinRequest::new(Uuid::new_v4(), &identity, Some("  ".into()), Utc::now());
        assert_eq!(request.email, "sam@example.com");
        assert!(request.message.is_none());
        assert!(request.resolve(true).is_ok());
        assert_eq!(request.status, JoinRequestStatus::Approved);
        assert_eq!(request.resolve(false), Err(JoinRequestStatus::Approved));
    }

    #[test]
    fn invitation_checks_reasons_in_order() {
        let now = Utc::now();
        let mut invitation = Invitation::new(
            Uuid::new_v4(),
            "Guest@Example.com",
            Role::Editor,
            now + Duration::days(1),
            1,
            now,
        );
        assert_eq!(
            invitation.check_redeemable("other@example.com", now),
            Err(InvitationError::EmailMismatch)
        );
        assert!(invitation.check_redeemable(" guest@example.COM ", now).is_ok());
        assert_eq!(
            invitation.check_redeemable("guest@example.com", now + Duration::days(2)),
            Err(InvitationError::Expired)
        );
        invitation.consume(now);
        assert_eq!(
            invitation.check_redeemable("guest@example.com", now),
            Err(InvitationError::Exhausted)
        );
    }

    #[test]
    fn token_format_is_validated() {
        assert!(validate_token_format(&generate_token()).is_ok());
        assert!(validate_token_format("not-a-token").is_err());
        assert!(validate_token_format(&"A".repeat(INVITATION_TOKEN_LEN)).is_err());
    }
}
