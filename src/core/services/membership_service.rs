//! Family creation, join requests, invitations, and role changes.
//!
//! Multi-row transitions (approval, redemption, family creation) are single
//! gateway calls so a failure can never leave a membership without its
//! profile. Email is always best-effort and never fails the transition.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::time::Clock;
use crate::currency::CurrencyCode;
use crate::domain::family::{normalize_email, normalize_public_id, validate_token_format};
use crate::domain::member::name_from_email;
use crate::domain::{Family, Identity, Invitation, JoinRequest, Membership, Role};
use crate::errors::ValidationError;
use crate::storage::{
    Gateway, GatewayResult, JoinDecision, JoinResolution, Mailer, MembershipBundle, NewFamily,
    Redemption,
};
use crate::utils::escape_html;

use super::{Actor, ServiceError, ServiceResult};

pub const DEFAULT_INVITATION_DAYS: i64 = 7;
pub const DEFAULT_INVITATION_USES: u32 = 1;

/// Result of a best-effort notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EmailOutcome {
    Sent { message_id: Option<String> },
    Failed { reason: String },
    /// Nobody to notify.
    Skipped,
}

impl EmailOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, EmailOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinSubmission {
    pub request: JoinRequest,
    pub notification: EmailOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssuedInvitation {
    pub invitation: Invitation,
    pub notification: EmailOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvitationOptions {
    pub role: Role,
    pub valid_for: Duration,
    pub uses: u32,
}

impl Default for InvitationOptions {
    fn default() -> Self {
        Self {
            role: Role::default(),
            valid_for: Duration::days(DEFAULT_INVITATION_DAYS),
            uses: DEFAULT_INVITATION_USES,
        }
    }
}

pub struct MembershipService<'a> {
    gateway: &'a dyn Gateway,
    mailer: &'a dyn Mailer,
    clock: &'a dyn Clock,
}

impl<'a> MembershipService<'a> {
    pub fn new(gateway: &'a dyn Gateway, mailer: &'a dyn Mailer, clock: &'a dyn Clock) -> Self {
        Self {
            gateway,
            mailer,
            clock,
        }
    }

    /// Creates a family of one: the owner becomes its admin and the default
    /// categories are seeded. A seeding failure is logged, not returned.
    pub fn create_family(
        &self,
        owner: &Identity,
        name: &str,
        currency: &str,
        timezone: &str,
        owner_name: Option<&str>,
    ) -> ServiceResult<MembershipBundle> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::new("name", "Family name is required").into());
        }
        let currency = CurrencyCode::new(currency);
        let code = currency.as_str();
        if code.len() != 3 || !code.chars().all(|ch| ch.is_ascii_alphabetic()) {
            return Err(
                ValidationError::new("currency", "Currency must be a 3-letter code").into(),
            );
        }
        let timezone = match timezone.trim() {
            "" => "UTC",
            tz => tz,
        };
        let owner_name = owner_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| name_from_email(&owner.email));

        let bundle = self.gateway.create_family_with_owner(
            owner,
            &NewFamily {
                name: name.to_string(),
                currency: code.to_string(),
                timezone: timezone.to_string(),
                owner_name,
            },
        )?;
        tracing::info!(
            family_id = %bundle.family.id,
            public_id = %bundle.family.public_id,
            "family created"
        );
        // Seeding is idempotent and retried when an admin loads the family.
        if let Err(err) = self.gateway.bootstrap_default_categories(bundle.family.id) {
            tracing::warn!(
                family_id = %bundle.family.id,
                error = %err,
                "default categories not seeded"
            );
        }
        Ok(bundle)
    }

    /// Families the identity actively belongs to, with its role in each.
    pub fn families(&self, identity_id: Uuid) -> ServiceResult<Vec<(Family, Membership)>> {
        let mut families = Vec::new();
        for membership in self.gateway.memberships_for(identity_id)? {
            if membership.is_active() {
                families.push((self.gateway.family(membership.family_id)?, membership));
            }
        }
        families.sort_by(|a, b| a.0.name.cmp(&b.0.name));
        Ok(families)
    }

    pub fn submit_join_request(
        &self,
        requester: &Identity,
        public_id: &str,
        message: Option<String>,
    ) -> ServiceResult<JoinSubmission> {
        let public_id = normalize_public_id(public_id)?;
        let family = self
            .gateway
            .family_by_public_id(&public_id)?
            .ok_or_else(|| ServiceError::FamilyNotFound(public_id.clone()))?;

        let already_member = self
            .gateway
            .memberships_for(requester.id)?
            .iter()
            .any(|m| m.family_id == family.id && m.is_active());
        if already_member {
            return Err(ServiceError::AlreadyMember);
        }
        let pending = self
            .gateway
            .list_join_requests(requester.id, family.id)?
            .iter()
            .any(|r| r.requester_id == requester.id && !r.status.is_terminal());
        if pending {
            return Err(ServiceError::DuplicateRequest);
        }

        let request = JoinRequest::new(family.id, requester, message, self.clock.now());
        let request = self.gateway.insert_join_request(&request)?;
        tracing::info!(family_id = %family.id, request_id = %request.id, "join request submitted");

        let subject = format!("New request to join {}", family.name);
        let html = format!(
            "<p>{} asked to join <strong>{}</strong>.</p>{}",
            escape_html(&request.email),
            escape_html(&family.name),
            request
                .message
                .as_deref()
                .map(|m| format!("<blockquote>{}</blockquote>", escape_html(m)))
                .unwrap_or_default()
        );
        let notification = self.notify_admins(family.id, &subject, &html);
        Ok(JoinSubmission {
            request,
            notification,
        })
    }

    pub fn pending_requests(&self, actor: &Actor, family_id: Uuid) -> ServiceResult<Vec<JoinRequest>> {
        actor.require(Role::can_manage_members, "review join requests")?;
        let mut pending: Vec<JoinRequest> = self
            .gateway
            .list_join_requests(actor.identity_id, family_id)?
            .into_iter()
            .filter(|r| !r.status.is_terminal())
            .collect();
        pending.sort_by_key(|r| r.created_at);
        Ok(pending)
    }

    /// Approves a pending request; `role` falls back to the default role.
    pub fn approve_join_request(
        &self,
        actor: &Actor,
        request_id: Uuid,
        role: Option<Role>,
    ) -> ServiceResult<JoinResolution> {
        let request = self.pending_request(actor, request_id, "approve join requests")?;
        let already_member = self
            .gateway
            .memberships_for(request.requester_id)?
            .iter()
            .any(|m| m.family_id == request.family_id && m.is_active());
        if already_member {
            return Err(ServiceError::AlreadyMember);
        }
        let role = role.unwrap_or_default();
        let resolution = self.gateway.resolve_join_request(
            actor.identity_id,
            request_id,
            JoinDecision::Approve { role },
        )?;
        tracing::info!(
            family_id = %request.family_id,
            request_id = %request_id,
            %role,
            "join request approved"
        );
        self.notify(
            &request.email,
            "Your join request was approved",
            "<p>You can now open the family dashboard.</p>",
        );
        Ok(resolution)
    }

    pub fn reject_join_request(
        &self,
        actor: &Actor,
        request_id: Uuid,
    ) -> ServiceResult<JoinResolution> {
        let request = self.pending_request(actor, request_id, "reject join requests")?;
        let resolution =
            self.gateway
                .resolve_join_request(actor.identity_id, request_id, JoinDecision::Reject)?;
        tracing::info!(family_id = %request.family_id, request_id = %request_id, "join request rejected");
        self.notify(
            &request.email,
            "Your join request was declined",
            "<p>An administrator declined your request.</p>",
        );
        Ok(resolution)
    }

    pub fn create_invitation(
        &self,
        actor: &Actor,
        family_id: Uuid,
        email: &str,
        options: InvitationOptions,
    ) -> ServiceResult<IssuedInvitation> {
        actor.require(Role::can_manage_members, "invite members")?;
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(ValidationError::new("email", "A valid email is required").into());
        }
        if options.uses == 0 {
            return Err(ValidationError::new("uses", "An invitation needs at least one use").into());
        }
        if options.valid_for <= Duration::zero() {
            return Err(ValidationError::new("expires_at", "Expiry must be in the future").into());
        }
        let now = self.clock.now();
        let invitation = Invitation::new(
            family_id,
            &email,
            options.role,
            now + options.valid_for,
            options.uses,
            now,
        );
        let invitation = self.gateway.insert_invitation(actor.identity_id, &invitation)?;
        let family = self.gateway.family(family_id)?;
        tracing::info!(family_id = %family_id, invitation_id = %invitation.id, "invitation created");

        let html = format!(
            "<p>You were invited to join <strong>{}</strong>.</p><p>Invitation code: <code>{}</code></p><p>Expires {}</p>",
            escape_html(&family.name),
            invitation.token,
            invitation.expires_at.format("%Y-%m-%d %H:%M UTC")
        );
        let notification = self.notify(&invitation.email, &format!("Join {}", family.name), &html);
        Ok(IssuedInvitation {
            invitation,
            notification,
        })
    }

    /// Validates and consumes the invitation in one gateway call. Failures
    /// come back as [`ServiceError::Invitation`] with the specific reason.
    pub fn redeem_invitation(&self, identity: &Identity, token: &str) -> ServiceResult<Redemption> {
        let token = token.trim();
        validate_token_format(token)?;
        match self.gateway.redeem_invitation(token, identity)? {
            Ok(redemption) => {
                tracing::info!(
                    family_id = %redemption.granted.family.id,
                    invitation_id = %redemption.invitation.id,
                    "invitation redeemed"
                );
                Ok(redemption)
            }
            Err(reason) => {
                tracing::warn!(?reason, "invitation refused");
                Err(reason.into())
            }
        }
    }

    pub fn change_role(
        &self,
        actor: &Actor,
        family_id: Uuid,
        membership_id: Uuid,
        role: Role,
    ) -> ServiceResult<Membership> {
        actor.require(Role::can_manage_members, "change roles")?;
        let memberships = self.gateway.list_memberships(family_id)?;
        let target = memberships
            .iter()
            .find(|m| m.id == membership_id)
            .ok_or(ServiceError::NotAMember)?;
        let active_admins = memberships
            .iter()
            .filter(|m| m.is_active() && m.role == Role::Admin)
            .count();
        if target.role == Role::Admin && role != Role::Admin && active_admins <= 1 {
            return Err(ServiceError::LastAdmin);
        }
        let updated = self
            .gateway
            .update_membership_role(actor.identity_id, membership_id, role)?;
        tracing::info!(family_id = %family_id, membership_id = %membership_id, %role, "role changed");
        Ok(updated)
    }

    fn pending_request(
        &self,
        actor: &Actor,
        request_id: Uuid,
        action: &str,
    ) -> ServiceResult<JoinRequest> {
        actor.require(Role::can_manage_members, action)?;
        let request = self.gateway.join_request(request_id)?;
        if request.status.is_terminal() {
            return Err(ServiceError::InvalidTransition {
                from: request.status,
            });
        }
        Ok(request)
    }

    /// Emails every active admin. Lookup failures are reported as a failed
    /// outcome, never as an error.
    fn notify_admins(&self, family_id: Uuid, subject: &str, html: &str) -> EmailOutcome {
        let recipients = match self.admin_emails(family_id) {
            Ok(recipients) => recipients,
            Err(err) => {
                tracing::warn!(
                    family_id = %family_id,
                    error = %err,
                    "admin lookup for notification failed"
                );
                return EmailOutcome::Failed {
                    reason: err.to_string(),
                };
            }
        };

        let mut outcome = EmailOutcome::Skipped;
        for to in recipients {
            let sent = self.notify(&to, subject, html);
            if sent.is_failed() || outcome == EmailOutcome::Skipped {
                outcome = sent;
            }
            if outcome.is_failed() {
                break;
            }
        }
        outcome
    }

    fn admin_emails(&self, family_id: Uuid) -> GatewayResult<Vec<String>> {
        let admins: Vec<Uuid> = self
            .gateway
            .list_memberships(family_id)?
            .into_iter()
            .filter(|m| m.is_active() && m.role == Role::Admin)
            .map(|m| m.identity_id)
            .collect();
        Ok(self
            .gateway
            .list_members(family_id)?
            .into_iter()
            .filter(|m| m.identity_id.is_some_and(|id| admins.contains(&id)))
            .filter_map(|m| m.email)
            .collect())
    }

    fn notify(&self, to: &str, subject: &str, html: &str) -> EmailOutcome {
        match self.mailer.send(to, subject, html) {
            Ok(receipt) if receipt.success => EmailOutcome::Sent {
                message_id: receipt.message_id,
            },
            Ok(_) => {
                tracing::warn!(%to, %subject, "email provider reported failure");
                EmailOutcome::Failed {
                    reason: "provider reported failure".into(),
                }
            }
            Err(err) => {
                tracing::warn!(%to, %subject, error = %err, "email delivery failed");
                EmailOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }
}
