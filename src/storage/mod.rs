//! Boundary to the managed backend: row collections, server-side functions,
//! and outbound email. Every call here is a suspension point in the real
//! deployment; nothing above this layer performs I/O.

pub mod mailer;
pub mod memory;
pub mod rows;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    Budget, Category, Expense, Family, FamilyMember, Identity, Invitation, JoinRequest,
    Membership, Role,
};
use crate::errors::{GatewayError, InvitationError};

pub use mailer::{EmailReceipt, LogMailer, Mailer, MemoryMailer, SentEmail};
pub use memory::MemoryGateway;

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Rows still pointing at a category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryReferences {
    pub expenses: usize,
    pub budgets: usize,
}

impl CategoryReferences {
    pub fn is_empty(&self) -> bool {
        self.expenses == 0 && self.budgets == 0
    }
}

/// Input for the family-creation function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFamily {
    pub name: String,
    pub currency: String,
    pub timezone: String,
    pub owner_name: String,
}

/// The rows created together when a family or a membership comes into being.
#[derive(Debug, Clone, PartialEq)]
pub struct MembershipBundle {
    pub family: Family,
    pub membership: Membership,
    pub member: FamilyMember,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinDecision {
    Approve { role: Role },
    Reject,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinResolution {
    pub request: JoinRequest,
    /// Present only for approvals.
    pub granted: Option<MembershipBundle>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Redemption {
    pub invitation: Invitation,
    pub granted: MembershipBundle,
}

/// CRUD over the five row collections plus the server-side functions.
///
/// Mutations take the acting identity so the backend can apply its own
/// row-level policy; client-side role checks are a convenience only.
pub trait Gateway: Send + Sync {
    fn list_categories(&self, family_id: Uuid) -> GatewayResult<Vec<Category>>;
    fn insert_category(&self, actor: Uuid, category: &Category) -> GatewayResult<Category>;
    fn update_category(&self, actor: Uuid, category: &Category) -> GatewayResult<Category>;
    fn delete_category(&self, actor: Uuid, category_id: Uuid) -> GatewayResult<()>;
    fn count_category_references(&self, category_id: Uuid) -> GatewayResult<CategoryReferences>;

    fn list_expenses(&self, family_id: Uuid) -> GatewayResult<Vec<Expense>>;
    fn insert_expense(&self, actor: Uuid, expense: &Expense) -> GatewayResult<Expense>;
    fn update_expense(&self, actor: Uuid, expense: &Expense) -> GatewayResult<Expense>;
    fn delete_expense(&self, actor: Uuid, expense_id: Uuid) -> GatewayResult<()>;

    fn list_budgets(&self, family_id: Uuid) -> GatewayResult<Vec<Budget>>;
    /// Inserts or replaces the row with the same (category, member, year, month).
    fn upsert_budget(&self, actor: Uuid, budget: &Budget) -> GatewayResult<Budget>;

    fn list_members(&self, family_id: Uuid) -> GatewayResult<Vec<FamilyMember>>;
    fn update_member(&self, actor: Uuid, member: &FamilyMember) -> GatewayResult<FamilyMember>;

    fn family(&self, family_id: Uuid) -> GatewayResult<Family>;
    fn family_by_public_id(&self, public_id: &str) -> GatewayResult<Option<Family>>;
    fn memberships_for(&self, identity_id: Uuid) -> GatewayResult<Vec<Membership>>;
    fn list_memberships(&self, family_id: Uuid) -> GatewayResult<Vec<Membership>>;
    fn update_membership_role(
        &self,
        actor: Uuid,
        membership_id: Uuid,
        role: Role,
    ) -> GatewayResult<Membership>;

    fn insert_join_request(&self, request: &JoinRequest) -> GatewayResult<JoinRequest>;
    fn join_request(&self, request_id: Uuid) -> GatewayResult<JoinRequest>;
    fn list_join_requests(&self, actor: Uuid, family_id: Uuid) -> GatewayResult<Vec<JoinRequest>>;
    fn insert_invitation(&self, actor: Uuid, invitation: &Invitation)
        -> GatewayResult<Invitation>;

    /// Creates the family, the owner's admin membership and profile in one unit.
    fn create_family_with_owner(
        &self,
        owner: &Identity,
        family: &NewFamily,
    ) -> GatewayResult<MembershipBundle>;
    /// Seeds the default category set when the family has none; returns what was created.
    fn bootstrap_default_categories(&self, family_id: Uuid) -> GatewayResult<Vec<Category>>;
    /// Resolves a pending request; approval creates membership and profile in one unit.
    fn resolve_join_request(
        &self,
        actor: Uuid,
        request_id: Uuid,
        decision: JoinDecision,
    ) -> GatewayResult<JoinResolution>;
    /// Validates and consumes an invitation in one unit.
    fn redeem_invitation(
        &self,
        token: &str,
        identity: &Identity,
    ) -> GatewayResult<Result<Redemption, InvitationError>>;
}
