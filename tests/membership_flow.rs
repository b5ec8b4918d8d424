mod common;

use chrono::Duration;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{date, identity, Backend, FlakyGateway};
use family_budget::{
    core::{
        services::{EmailOutcome, InvitationOptions, MembershipService, ServiceError},
        Clock, HouseholdManager,
    },
    domain::{family::generate_token, Expense, ExpenseDraft, JoinRequestStatus, Role},
    errors::{GatewayError, InvitationError},
    storage::{Gateway, MemoryMailer},
};

#[test]
fn family_creation_makes_a_family_of_one() {
    let backend = Backend::new();
    let owner = backend.owner_session("ana@example.com");

    let family = owner.family().expect("active family");
    assert_eq!(family.public_id.len(), 8);
    assert_eq!(owner.role(), Some(Role::Admin));
    let me = owner.current_member().expect("owner profile");
    assert_eq!(me.name, "Ana");
    assert_eq!(me.role, Role::Admin);
    assert!(!owner.data().unwrap().categories.is_empty());
    assert_eq!(owner.families().unwrap().len(), 1);
}

#[test]
fn join_request_lifecycle_is_terminal() {
    let backend = Backend::new();
    let mut owner = backend.owner_session("ana@example.com");
    let family = owner.family().unwrap().clone();

    let sam = identity("Sam@Example.com");
    let requester = backend.session(&sam);
    let submission = requester
        .membership()
        .submit_join_request(&sam, &family.public_id.to_lowercase(), Some("hi!".into()))
        .expect("submit");
    assert_eq!(submission.request.status, JoinRequestStatus::Pending);
    assert!(matches!(submission.notification, EmailOutcome::Sent { .. }));
    assert_eq!(backend.mailer.sent()[0].to, "ana@example.com");

    let duplicate = requester
        .membership()
        .submit_join_request(&sam, &family.public_id, None)
        .unwrap_err();
    assert!(matches!(duplicate, ServiceError::DuplicateRequest));

    let resolution = owner
        .approve_join_request(submission.request.id, Some(Role::Editor))
        .expect("approve");
    assert_eq!(resolution.request.status, JoinRequestStatus::Approved);
    let granted = resolution.granted.expect("membership granted");
    assert_eq!(granted.member.name, "sam");
    assert_eq!(granted.membership.role, Role::Editor);

    let memberships: Vec<_> = backend
        .gateway
        .list_memberships(family.id)
        .unwrap()
        .into_iter()
        .filter(|m| m.identity_id == sam.id)
        .collect();
    assert_eq!(memberships.len(), 1);
    let profiles = backend
        .gateway
        .list_members(family.id)
        .unwrap()
        .into_iter()
        .filter(|m| m.identity_id == Some(sam.id))
        .count();
    assert_eq!(profiles, 1);
    assert_eq!(owner.data().unwrap().members.len(), 2);

    let again = owner
        .approve_join_request(submission.request.id, None)
        .unwrap_err();
    assert!(matches!(
        again,
        ServiceError::InvalidTransition {
            from: JoinRequestStatus::Approved
        }
    ));
    let reject = owner.reject_join_request(submission.request.id).unwrap_err();
    assert!(matches!(reject, ServiceError::InvalidTransition { .. }));

    let member_again = requester
        .membership()
        .submit_join_request(&sam, &family.public_id, None)
        .unwrap_err();
    assert!(matches!(member_again, ServiceError::AlreadyMember));
}

#[test]
fn rejected_requests_grant_nothing() {
    let backend = Backend::new();
    let mut owner = backend.owner_session("ana@example.com");
    let family = owner.family().unwrap().clone();
    let sam = identity("sam@example.com");
    let request = backend
        .session(&sam)
        .membership()
        .submit_join_request(&sam, &family.public_id, None)
        .unwrap()
        .request;

    let resolution = owner.reject_join_request(request.id).unwrap();
    assert_eq!(resolution.request.status, JoinRequestStatus::Rejected);
    assert!(resolution.granted.is_none());
    assert!(backend.gateway.memberships_for(sam.id).unwrap().is_empty());
}

#[test]
fn email_failure_does_not_block_join_request() {
    let backend = Backend::with_mailer(MemoryMailer::failing());
    let owner = backend.owner_session("ana@example.com");
    let family = owner.family().unwrap().clone();
    let sam = identity("sam@example.com");

    let submission = backend
        .session(&sam)
        .membership()
        .submit_join_request(&sam, &family.public_id, None)
        .expect("request is created even if email fails");
    assert!(submission.notification.is_failed());

    let actor = owner.actor().unwrap();
    let pending = owner.membership().pending_requests(&actor, family.id).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, submission.request.id);
}

#[test]
fn unknown_or_malformed_family_codes_are_reported() {
    let backend = Backend::new();
    let sam = identity("sam@example.com");
    let session = backend.session(&sam);

    let unknown = session
        .membership()
        .submit_join_request(&sam, "ABCDEFGH", None)
        .unwrap_err();
    assert!(matches!(unknown, ServiceError::FamilyNotFound(_)));

    let malformed = session
        .membership()
        .submit_join_request(&sam, "x", None)
        .unwrap_err();
    assert_eq!(malformed.field(), Some("public_id"));
}

#[test]
fn invitation_is_single_use() {
    let backend = Backend::new();
    let owner = backend.owner_session("ana@example.com");
    let issued = owner
        .invite("Guest@Example.com", InvitationOptions::default())
        .expect("invite");
    assert_eq!(issued.invitation.uses_remaining, 1);
    assert_eq!(
        issued.invitation.expires_at - backend.clock.now(),
        Duration::days(7)
    );
    assert!(backend
        .mailer
        .sent()
        .iter()
        .any(|mail| mail.to == "guest@example.com" && mail.html.contains(&issued.invitation.token)));

    let guest_identity = identity("guest@example.com");
    let mut guest = backend.session(&guest_identity);
    let redemption = guest
        .redeem_invitation(&issued.invitation.token)
        .expect("first redemption");
    assert_eq!(redemption.invitation.uses_remaining, 0);
    assert_eq!(guest.role(), Some(Role::Editor));
    assert_eq!(guest.family().map(|f| f.id), owner.family().map(|f| f.id));

    let repeat = guest
        .redeem_invitation(&issued.invitation.token)
        .unwrap_err();
    assert!(matches!(
        repeat,
        ServiceError::Invitation(InvitationError::Exhausted)
    ));
}

#[test]
fn concurrent_redemptions_admit_exactly_one() {
    let backend = Backend::new();
    let owner = backend.owner_session("ana@example.com");
    let family_id = owner.family().unwrap().id;
    let token = owner
        .invite("guest@example.com", InvitationOptions::default())
        .unwrap()
        .invitation
        .token;

    let outcomes: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let token = token.clone();
                let backend = &backend;
                scope.spawn(move || {
                    let guest = identity("guest@example.com");
                    MembershipService::new(
                        backend.gateway.as_ref(),
                        backend.mailer.as_ref(),
                        backend.clock.as_ref(),
                    )
                    .redeem_invitation(&guest, &token)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("thread"))
            .collect()
    });

    let successes = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    assert_eq!(successes, 1);
    assert!(outcomes.iter().filter_map(|o| o.as_ref().err()).all(|err| matches!(
        err,
        ServiceError::Invitation(InvitationError::Exhausted)
    )));
    let guests = backend
        .gateway
        .list_members(family_id)
        .unwrap()
        .into_iter()
        .filter(|m| m.email.as_deref() == Some("guest@example.com"))
        .count();
    assert_eq!(guests, 1);
}

#[test]
fn invitation_failures_carry_specific_reasons() {
    let backend = Backend::new();
    let owner = backend.owner_session("ana@example.com");
    let options = InvitationOptions {
        role: Role::Visitor,
        valid_for: Duration::days(1),
        uses: 2,
    };
    let token = owner.invite("kid@example.com", options).unwrap().invitation.token;

    let mut stranger = backend.session(&identity("other@example.com"));
    let mismatch = stranger.redeem_invitation(&token).unwrap_err();
    assert!(matches!(
        mismatch,
        ServiceError::Invitation(InvitationError::EmailMismatch)
    ));

    let unknown = stranger.redeem_invitation(&generate_token()).unwrap_err();
    assert!(matches!(
        unknown,
        ServiceError::Invitation(InvitationError::NotFound)
    ));

    let malformed = stranger.redeem_invitation("not-a-token").unwrap_err();
    assert_eq!(malformed.field(), Some("token"));

    backend.clock.advance(Duration::days(2));
    let mut kid = backend.session(&identity("kid@example.com"));
    let expired = kid.redeem_invitation(&token).unwrap_err();
    assert!(matches!(
        expired,
        ServiceError::Invitation(InvitationError::Expired)
    ));
    assert_ne!(mismatch.user_message(), expired.user_message());
}

#[test]
fn only_admins_manage_members() {
    let backend = Backend::new();
    let mut owner = backend.owner_session("ana@example.com");
    let options = InvitationOptions {
        role: Role::Visitor,
        ..InvitationOptions::default()
    };
    let token = owner.invite("kid@example.com", options).unwrap().invitation.token;
    let mut kid = backend.session(&identity("kid@example.com"));
    kid.redeem_invitation(&token).unwrap();

    let err = kid
        .invite("friend@example.com", InvitationOptions::default())
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized(_)));

    let (_, own_membership) = owner.families().unwrap().remove(0);
    let last_admin = owner
        .change_role(own_membership.id, Role::Editor)
        .unwrap_err();
    assert!(matches!(last_admin, ServiceError::LastAdmin));

    let (_, kid_membership) = kid.families().unwrap().remove(0);
    let promoted = owner.change_role(kid_membership.id, Role::Editor).unwrap();
    assert_eq!(promoted.role, Role::Editor);
    owner.reload().unwrap();
    let kid_profile = owner
        .data()
        .unwrap()
        .members
        .iter()
        .find(|m| m.email.as_deref() == Some("kid@example.com"))
        .map(|m| m.role);
    assert_eq!(kid_profile, Some(Role::Editor));
}

#[test]
fn visitors_log_expenses_only_for_themselves() {
    let backend = Backend::new();
    let owner = backend.owner_session("ana@example.com");
    let owner_member = owner.current_member().unwrap().id;
    let options = InvitationOptions {
        role: Role::Visitor,
        ..InvitationOptions::default()
    };
    let token = owner.invite("kid@example.com", options).unwrap().invitation.token;
    let kid_identity = identity("kid@example.com");
    let mut kid = backend.session(&kid_identity);
    kid.redeem_invitation(&token).unwrap();
    assert_eq!(kid.role(), Some(Role::Visitor));

    let kid_member = kid.current_member().unwrap().id;
    let food = kid
        .data()
        .unwrap()
        .categories
        .iter()
        .find(|c| c.name == "Food")
        .map(|c| c.id)
        .unwrap();

    let own = kid
        .add_expense(ExpenseDraft::new(kid_member, food, 3_000.0, "Ice cream", date(2024, 6, 10)))
        .unwrap();
    assert_eq!(own.member_id, kid_member);
    assert!(kid.data().unwrap().expenses.iter().any(|e| e.id == own.id));

    let for_owner = kid
        .add_expense(ExpenseDraft::new(owner_member, food, 3_000.0, "Snacks", date(2024, 6, 10)))
        .unwrap_err();
    assert_eq!(for_owner.field(), Some("member_id"));

    let family_id = kid.family().unwrap().id;
    let forged = Expense::from_draft(
        family_id,
        ExpenseDraft::new(owner_member, food, 3_000.0, "Snacks", date(2024, 6, 10)),
        backend.clock.now(),
    );
    let refused = backend
        .gateway
        .insert_expense(kid_identity.id, &forged)
        .unwrap_err();
    assert!(matches!(refused, GatewayError::PolicyViolation(_)));

    let delete = kid.remove_expense(own.id).unwrap_err();
    assert!(matches!(delete, ServiceError::Unauthorized(_)));
}

#[test]
fn join_notification_escapes_requester_text() {
    let backend = Backend::new();
    let owner = backend.owner_session("ana@example.com");
    let family = owner.family().unwrap().clone();
    let sam = identity("sam@example.com");

    backend
        .session(&sam)
        .membership()
        .submit_join_request(
            &sam,
            &family.public_id,
            Some(r#"<a href="http://evil">click</a>"#.into()),
        )
        .unwrap();

    let sent = backend.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0]
        .html
        .contains("&lt;a href=&quot;http://evil&quot;&gt;click&lt;/a&gt;"));
    assert!(!sent[0].html.contains("<a href"));
}

#[test]
fn join_request_stands_when_admin_lookup_fails() {
    let backend = Backend::new();
    let owner = backend.owner_session("ana@example.com");
    let family = owner.family().unwrap().clone();
    let flaky = FlakyGateway::new(backend.gateway.clone());
    flaky.fail_membership_listing.store(true, Ordering::SeqCst);
    let sam = identity("sam@example.com");

    let service = MembershipService::new(&flaky, backend.mailer.as_ref(), backend.clock.as_ref());
    let submission = service
        .submit_join_request(&sam, &family.public_id, Some("hello".into()))
        .expect("request stored despite notification failure");

    assert_eq!(submission.request.status, JoinRequestStatus::Pending);
    assert!(submission.notification.is_failed());
    assert!(backend.mailer.sent().is_empty());
    let stored = backend.gateway.join_request(submission.request.id).unwrap();
    assert_eq!(stored.status, JoinRequestStatus::Pending);
}

#[test]
fn family_survives_failed_seeding_and_is_seeded_on_next_load() {
    let backend = Backend::new();
    let flaky = Arc::new(FlakyGateway::new(backend.gateway.clone()));
    flaky.fail_bootstrap.store(true, Ordering::SeqCst);
    let mut session = HouseholdManager::new(
        identity("ana@example.com"),
        flaky.clone(),
        backend.mailer.clone(),
        backend.clock.clone(),
    );

    let bundle = session
        .create_family("Rivera", "CLP", "UTC", None)
        .expect("family created without categories");
    assert!(session.data().unwrap().categories.is_empty());
    assert!(backend.gateway.list_categories(bundle.family.id).unwrap().is_empty());

    flaky.fail_bootstrap.store(false, Ordering::SeqCst);
    session.reload().unwrap();
    assert!(!session.data().unwrap().categories.is_empty());
    assert_eq!(
        backend.gateway.list_categories(bundle.family.id).unwrap().len(),
        session.data().unwrap().categories.len()
    );
}
