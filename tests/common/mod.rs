#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use family_budget::{
    core::{FixedClock, HouseholdManager},
    domain::{
        Budget, Category, Expense, ExpenseDraft, Family, FamilyMember, Identity, Invitation,
        JoinRequest, Membership, Period, Role,
    },
    errors::{GatewayError, InvitationError},
    storage::{
        CategoryReferences, Gateway, GatewayResult, JoinDecision, JoinResolution,
        MembershipBundle, MemoryGateway, MemoryMailer, NewFamily, Redemption,
    },
};
use uuid::Uuid;

/// One shared backend with a fixed clock and a recording mailer.
pub struct Backend {
    pub gateway: Arc<MemoryGateway>,
    pub mailer: Arc<MemoryMailer>,
    pub clock: Arc<FixedClock>,
}

impl Backend {
    pub fn new() -> Self {
        Self::with_mailer(MemoryMailer::new())
    }

    pub fn with_mailer(mailer: MemoryMailer) -> Self {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap(),
        ));
        Self {
            gateway: Arc::new(MemoryGateway::with_clock(clock.clone())),
            mailer: Arc::new(mailer),
            clock,
        }
    }

    pub fn session(&self, identity: &Identity) -> HouseholdManager {
        HouseholdManager::new(
            identity.clone(),
            self.gateway.clone(),
            self.mailer.clone(),
            self.clock.clone(),
        )
    }

    /// A session whose identity owns a freshly created family.
    pub fn owner_session(&self, email: &str) -> HouseholdManager {
        let mut session = self.session(&identity(email));
        session
            .create_family("Rivera", "CLP", "America/Santiago", Some("Ana"))
            .expect("create family");
        session
    }
}

pub fn identity(email: &str) -> Identity {
    Identity::new(Uuid::new_v4(), email)
}

pub fn june() -> Period {
    Period::new(2024, 6).expect("valid period")
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

pub fn category(family_id: Uuid, name: &str) -> Category {
    Category::new(family_id, name)
}

pub fn budget(family_id: Uuid, category_id: Uuid, member_id: Option<Uuid>, amount: f64) -> Budget {
    Budget::new(family_id, category_id, member_id, june(), amount)
}

pub fn expense(
    family_id: Uuid,
    category_id: Uuid,
    member_id: Uuid,
    amount: f64,
    on: NaiveDate,
) -> Expense {
    Expense::from_draft(
        family_id,
        ExpenseDraft::new(member_id, category_id, amount, "test expense", on),
        Utc::now(),
    )
}

/// Wraps a [`MemoryGateway`] and fails selected calls with a network error.
pub struct FlakyGateway {
    pub inner: Arc<MemoryGateway>,
    pub fail_membership_listing: AtomicBool,
    pub fail_bootstrap: AtomicBool,
}

impl FlakyGateway {
    pub fn new(inner: Arc<MemoryGateway>) -> Self {
        Self {
            inner,
            fail_membership_listing: AtomicBool::new(false),
            fail_bootstrap: AtomicBool::new(false),
        }
    }

    fn check(flag: &AtomicBool, call: &str) -> GatewayResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(GatewayError::Network(format!("{call} timed out")))
        } else {
            Ok(())
        }
    }
}

impl Gateway for FlakyGateway {
    fn list_categories(&self, family_id: Uuid) -> GatewayResult<Vec<Category>> {
        self.inner.list_categories(family_id)
    }
    fn insert_category(&self, actor: Uuid, category: &Category) -> GatewayResult<Category> {
        self.inner.insert_category(actor, category)
    }
    fn update_category(&self, actor: Uuid, category: &Category) -> GatewayResult<Category> {
        self.inner.update_category(actor, category)
    }
    fn delete_category(&self, actor: Uuid, category_id: Uuid) -> GatewayResult<()> {
        self.inner.delete_category(actor, category_id)
    }
    fn count_category_references(&self, category_id: Uuid) -> GatewayResult<CategoryReferences> {
        self.inner.count_category_references(category_id)
    }
    fn list_expenses(&self, family_id: Uuid) -> GatewayResult<Vec<Expense>> {
        self.inner.list_expenses(family_id)
    }
    fn insert_expense(&self, actor: Uuid, expense: &Expense) -> GatewayResult<Expense> {
        self.inner.insert_expense(actor, expense)
    }
    fn update_expense(&self, actor: Uuid, expense: &Expense) -> GatewayResult<Expense> {
        self.inner.update_expense(actor, expense)
    }
    fn delete_expense(&self, actor: Uuid, expense_id: Uuid) -> GatewayResult<()> {
        self.inner.delete_expense(actor, expense_id)
    }
    fn list_budgets(&self, family_id: Uuid) -> GatewayResult<Vec<Budget>> {
        self.inner.list_budgets(family_id)
    }
    fn upsert_budget(&self, actor: Uuid, budget: &Budget) -> GatewayResult<Budget> {
        self.inner.upsert_budget(actor, budget)
    }
    fn list_members(&self, family_id: Uuid) -> GatewayResult<Vec<FamilyMember>> {
        self.inner.list_members(family_id)
    }
    fn update_member(&self, actor: Uuid, member: &FamilyMember) -> GatewayResult<FamilyMember> {
        self.inner.update_member(actor, member)
    }
    fn family(&self, family_id: Uuid) -> GatewayResult<Family> {
        self.inner.family(family_id)
    }
    fn family_by_public_id(&self, public_id: &str) -> GatewayResult<Option<Family>> {
        self.inner.family_by_public_id(public_id)
    }
    fn memberships_for(&self, identity_id: Uuid) -> GatewayResult<Vec<Membership>> {
        self.inner.memberships_for(identity_id)
    }
    fn list_memberships(&self, family_id: Uuid) -> GatewayResult<Vec<Membership>> {
        Self::check(&self.fail_membership_listing, "list_memberships")?;
        self.inner.list_memberships(family_id)
    }
    fn update_membership_role(
        &self,
        actor: Uuid,
        membership_id: Uuid,
        role: Role,
    ) -> GatewayResult<Membership> {
        self.inner.update_membership_role(actor, membership_id, role)
    }
    fn insert_join_request(&self, request: &JoinRequest) -> GatewayResult<JoinRequest> {
        self.inner.insert_join_request(request)
    }
    fn join_request(&self, request_id: Uuid) -> GatewayResult<JoinRequest> {
        self.inner.join_request(request_id)
    }
    fn list_join_requests(&self, actor: Uuid, family_id: Uuid) -> GatewayResult<Vec<JoinRequest>> {
        self.inner.list_join_requests(actor, family_id)
    }
    fn insert_invitation(&self, actor: Uuid, invitation: &Invitation) -> GatewayResult<Invitation> {
        self.inner.insert_invitation(actor, invitation)
    }
    fn create_family_with_owner(
        &self,
        owner: &Identity,
        family: &NewFamily,
    ) -> GatewayResult<MembershipBundle> {
        self.inner.create_family_with_owner(owner, family)
    }
    fn bootstrap_default_categories(&self, family_id: Uuid) -> GatewayResult<Vec<Category>> {
        Self::check(&self.fail_bootstrap, "bootstrap_default_categories")?;
        self.inner.bootstrap_default_categories(family_id)
    }
    fn resolve_join_request(
        &self,
        actor: Uuid,
        request_id: Uuid,
        decision: JoinDecision,
    ) -> GatewayResult<JoinResolution> {
        self.inner.resolve_join_request(actor, request_id, decision)
    }
    fn redeem_invitation(
        &self,
        token: &str,
        identity: &Identity,
    ) -> GatewayResult<Result<Redemption, InvitationError>> {
        self.inner.redeem_invitation(token, identity)
    }
}
