use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use crate::core::time::{Clock, SystemClock};
use crate::currency::CurrencyCode;
use crate::domain::{
    category::default_categories_for, family::public_id_from, member::name_from_email, Budget,
    Category, Expense, Family, FamilyMember, Identity, Invitation, JoinRequest, Membership, Role,
};
use crate::errors::{GatewayError, InvitationError};

use super::rows::{BudgetRow, Snapshot};
use super::{
    CategoryReferences, Gateway, GatewayResult, JoinDecision, JoinResolution, MembershipBundle,
    NewFamily, Redemption,
};

#[derive(Debug, Default)]
struct Tables {
    families: Vec<Family>,
    categories: Vec<Category>,
    expenses: Vec<Expense>,
    budgets: Vec<Budget>,
    members: Vec<FamilyMember>,
    memberships: Vec<Membership>,
    join_requests: Vec<JoinRequest>,
    invitations: Vec<Invitation>,
}

impl Tables {
    fn role_of(&self, actor: Uuid, family_id: Uuid) -> Option<Role> {
        self.memberships
            .iter()
            .find(|m| m.identity_id == actor && m.family_id == family_id && m.is_active())
            .map(|m| m.role)
    }

    fn require(
        &self,
        actor: Uuid,
        family_id: Uuid,
        allowed: fn(&Role) -> bool,
        action: &str,
    ) -> GatewayResult<Role> {
        match self.role_of(actor, family_id) {
            Some(role) if allowed(&role) => Ok(role),
            Some(role) => Err(GatewayError::PolicyViolation(format!(
                "{role} may not {action}"
            ))),
            None => Err(GatewayError::PolicyViolation(format!(
                "not a member of family {family_id}"
            ))),
        }
    }

    /// Any member may write rows for their own profile; only admins for others.
    fn require_expense_writer(&self, actor: Uuid, expense: &Expense) -> GatewayResult<()> {
        let role = self.require(actor, expense.family_id, |_| true, "record expenses")?;
        let own_profile = self
            .members
            .iter()
            .any(|m| m.id == expense.member_id && m.identity_id == Some(actor));
        if own_profile || role.can_log_for_others() {
            Ok(())
        } else {
            Err(GatewayError::PolicyViolation(
                "expenses for other members require admin".into(),
            ))
        }
    }

    fn unique_public_id(&self) -> String {
        loop {
            let candidate = public_id_from(Uuid::new_v4());
            if !self.families.iter().any(|f| f.public_id == candidate) {
                return candidate;
            }
        }
    }

    fn grant(
        &mut self,
        identity_id: Uuid,
        email: &str,
        name: Option<&str>,
        family_id: Uuid,
        role: Role,
        now: chrono::DateTime<chrono::Utc>,
    ) -> GatewayResult<MembershipBundle> {
        let family = self
            .families
            .iter()
            .find(|f| f.id == family_id)
            .cloned()
            .ok_or_else(|| GatewayError::not_found("family", family_id))?;
        let membership = Membership::new(identity_id, family_id, role, now);
        let display_name = name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| name_from_email(email));
        let member =
            FamilyMember::new(family_id, display_name, role).for_identity(identity_id, email);
        self.memberships.push(membership.clone());
        self.members.push(member.clone());
        Ok(MembershipBundle {
            family,
            membership,
            member,
        })
    }
}

/// In-process backend honouring the same contract as the managed service:
/// row policies, the budget conflict key, and atomic server functions.
pub struct MemoryGateway {
    tables: Mutex<Tables>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            clock,
        }
    }

    pub fn from_snapshot(snapshot: Snapshot, clock: Arc<dyn Clock>) -> GatewayResult<Self> {
        let tables = Tables {
            families: snapshot.families.into_iter().map(Family::from).collect(),
            categories: snapshot.categories.into_iter().map(Category::from).collect(),
            expenses: snapshot
                .expenses
                .into_iter()
                .map(Expense::try_from)
                .collect::<GatewayResult<_>>()?,
            budgets: snapshot
                .budgets
                .into_iter()
                .filter_map(BudgetRow::into_budget)
                .collect(),
            members: snapshot
                .family_members
                .into_iter()
                .map(FamilyMember::try_from)
                .collect::<GatewayResult<_>>()?,
            memberships: snapshot.memberships,
            join_requests: snapshot.join_requests,
            invitations: snapshot.invitations,
        };
        Ok(Self {
            tables: Mutex::new(tables),
            clock,
        })
    }

    pub fn from_json(json: &str, clock: Arc<dyn Clock>) -> GatewayResult<Self> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        Self::from_snapshot(snapshot, clock)
    }

    pub fn snapshot(&self) -> GatewayResult<Snapshot> {
        let tables = self.lock()?;
        Ok(Snapshot {
            families: tables.families.iter().map(Into::into).collect(),
            categories: tables.categories.iter().map(Into::into).collect(),
            expenses: tables.expenses.iter().map(Into::into).collect(),
            budgets: tables.budgets.iter().map(Into::into).collect(),
            family_members: tables.members.iter().map(Into::into).collect(),
            memberships: tables.memberships.clone(),
            join_requests: tables.join_requests.clone(),
            invitations: tables.invitations.clone(),
        })
    }

    fn lock(&self) -> GatewayResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| GatewayError::Network("backend state poisoned".into()))
    }
}

impl Gateway for MemoryGateway {
    fn list_categories(&self, family_id: Uuid) -> GatewayResult<Vec<Category>> {
        let tables = self.lock()?;
        let mut rows: Vec<Category> = tables
            .categories
            .iter()
            .filter(|c| c.family_id == family_id && c.active)
            .cloned()
            .collect();
        rows.sort_by_key(|c| c.order);
        Ok(rows)
    }

    fn insert_category(&self, actor: Uuid, category: &Category) -> GatewayResult<Category> {
        let mut tables = self.lock()?;
        tables.require(actor, category.family_id, Role::can_edit, "create categories")?;
        if tables.categories.iter().any(|c| c.id == category.id) {
            return Err(GatewayError::UniqueViolation("categories.id".into()));
        }
        tables.categories.push(category.clone());
        tracing::debug!(category_id = %category.id, "category inserted");
        Ok(category.clone())
    }

    fn update_category(&self, actor: Uuid, category: &Category) -> GatewayResult<Category> {
        let mut tables = self.lock()?;
        tables.require(actor, category.family_id, Role::can_edit, "edit categories")?;
        let slot = tables
            .categories
            .iter_mut()
            .find(|c| c.id == category.id)
            .ok_or_else(|| GatewayError::not_found("category", category.id))?;
        *slot = category.clone();
        Ok(category.clone())
    }

    fn delete_category(&self, actor: Uuid, category_id: Uuid) -> GatewayResult<()> {
        let mut tables = self.lock()?;
        let family_id = tables
            .categories
            .iter()
            .find(|c| c.id == category_id)
            .map(|c| c.family_id)
            .ok_or_else(|| GatewayError::not_found("category", category_id))?;
        tables.require(actor, family_id, Role::can_delete, "delete categories")?;
        let referenced = tables.expenses.iter().any(|e| e.category_id == category_id)
            || tables.budgets.iter().any(|b| b.category_id == category_id)
            || tables
                .categories
                .iter()
                .any(|c| c.parent_id == Some(category_id));
        if referenced {
            return Err(GatewayError::PolicyViolation(format!(
                "category {category_id} is still referenced"
            )));
        }
        tables.categories.retain(|c| c.id != category_id);
        Ok(())
    }

    fn count_category_references(&self, category_id: Uuid) -> GatewayResult<CategoryReferences> {
        let tables = self.lock()?;
        Ok(CategoryReferences {
            expenses: tables
                .expenses
                .iter()
                .filter(|e| e.category_id == category_id)
                .count(),
            budgets: tables
                .budgets
                .iter()
                .filter(|b| b.category_id == category_id)
                .count(),
        })
    }

    fn list_expenses(&self, family_id: Uuid) -> GatewayResult<Vec<Expense>> {
        let tables = self.lock()?;
        Ok(tables
            .expenses
            .iter()
            .filter(|e| e.family_id == family_id)
            .cloned()
            .collect())
    }

    fn insert_expense(&self, actor: Uuid, expense: &Expense) -> GatewayResult<Expense> {
        let mut tables = self.lock()?;
        tables.require_expense_writer(actor, expense)?;
        if tables.expenses.iter().any(|e| e.id == expense.id) {
            return Err(GatewayError::UniqueViolation("expenses.id".into()));
        }
        tables.expenses.push(expense.clone());
        tracing::debug!(expense_id = %expense.id, "expense inserted");
        Ok(expense.clone())
    }

    fn update_expense(&self, actor: Uuid, expense: &Expense) -> GatewayResult<Expense> {
        let mut tables = self.lock()?;
        tables.require_expense_writer(actor, expense)?;
        let now = self.clock.now();
        let slot = tables
            .expenses
            .iter_mut()
            .find(|e| e.id == expense.id)
            .ok_or_else(|| GatewayError::not_found("expense", expense.id))?;
        let created_at = slot.created_at;
        *slot = expense.clone();
        slot.created_at = created_at;
        slot.updated_at = now;
        Ok(slot.clone())
    }

    fn delete_expense(&self, actor: Uuid, expense_id: Uuid) -> GatewayResult<()> {
        let mut tables = self.lock()?;
        let family_id = tables
            .expenses
            .iter()
            .find(|e| e.id == expense_id)
            .map(|e| e.family_id)
            .ok_or_else(|| GatewayError::not_found("expense", expense_id))?;
        tables.require(actor, family_id, Role::can_delete, "delete expenses")?;
        tables.expenses.retain(|e| e.id != expense_id);
        Ok(())
    }

    fn list_budgets(&self, family_id: Uuid) -> GatewayResult<Vec<Budget>> {
        let tables = self.lock()?;
        Ok(tables
            .budgets
            .iter()
            .filter(|b| b.family_id == family_id)
            .cloned()
            .collect())
    }

    fn upsert_budget(&self, actor: Uuid, budget: &Budget) -> GatewayResult<Budget> {
        let mut tables = self.lock()?;
        tables.require(actor, budget.family_id, Role::can_edit, "set budgets")?;
        let key = budget.key();
        if let Some(existing) = tables
            .budgets
            .iter_mut()
            .find(|b| b.family_id == budget.family_id && b.key() == key)
        {
            existing.amount = budget.amount;
            existing.currency = budget.currency.clone();
            tracing::debug!(budget_id = %existing.id, "budget replaced on conflict");
            return Ok(existing.clone());
        }
        tables.budgets.push(budget.clone());
        Ok(budget.clone())
    }

    fn list_members(&self, family_id: Uuid) -> GatewayResult<Vec<FamilyMember>> {
        let tables = self.lock()?;
        Ok(tables
            .members
            .iter()
            .filter(|m| m.family_id == family_id)
            .cloned()
            .collect())
    }

    fn update_member(&self, actor: Uuid, member: &FamilyMember) -> GatewayResult<FamilyMember> {
        let mut tables = self.lock()?;
        let is_self = member.identity_id == Some(actor);
        if !is_self {
            tables.require(actor, member.family_id, Role::can_manage_members, "edit members")?;
        }
        let slot = tables
            .members
            .iter_mut()
            .find(|m| m.id == member.id)
            .ok_or_else(|| GatewayError::not_found("family member", member.id))?;
        if is_self && slot.role != member.role {
            return Err(GatewayError::PolicyViolation(
                "members cannot change their own role".into(),
            ));
        }
        *slot = member.clone();
        Ok(member.clone())
    }

    fn family(&self, family_id: Uuid) -> GatewayResult<Family> {
        let tables = self.lock()?;
        tables
            .families
            .iter()
            .find(|f| f.id == family_id)
            .cloned()
            .ok_or_else(|| GatewayError::not_found("family", family_id))
    }

    fn family_by_public_id(&self, public_id: &str) -> GatewayResult<Option<Family>> {
        let tables = self.lock()?;
        Ok(tables
            .families
            .iter()
            .find(|f| f.public_id.eq_ignore_ascii_case(public_id))
            .cloned())
    }

    fn memberships_for(&self, identity_id: Uuid) -> GatewayResult<Vec<Membership>> {
        let tables = self.lock()?;
        Ok(tables
            .memberships
            .iter()
            .filter(|m| m.identity_id == identity_id)
            .cloned()
            .collect())
    }

    fn list_memberships(&self, family_id: Uuid) -> GatewayResult<Vec<Membership>> {
        let tables = self.lock()?;
        Ok(tables
            .memberships
            .iter()
            .filter(|m| m.family_id == family_id)
            .cloned()
            .collect())
    }

    fn update_membership_role(
        &self,
        actor: Uuid,
        membership_id: Uuid,
        role: Role,
    ) -> GatewayResult<Membership> {
        let mut tables = self.lock()?;
        let (identity_id, family_id) = tables
            .memberships
            .iter()
            .find(|m| m.id == membership_id)
            .map(|m| (m.identity_id, m.family_id))
            .ok_or_else(|| GatewayError::not_found("membership", membership_id))?;
        tables.require(actor, family_id, Role::can_manage_members, "change roles")?;
        for member in tables
            .members
            .iter_mut()
            .filter(|m| m.family_id == family_id && m.identity_id == Some(identity_id))
        {
            member.role = role;
        }
        let membership = tables
            .memberships
            .iter_mut()
            .find(|m| m.id == membership_id)
            .ok_or_else(|| GatewayError::not_found("membership", membership_id))?;
        membership.role = role;
        Ok(membership.clone())
    }

    fn insert_join_request(&self, request: &JoinRequest) -> GatewayResult<JoinRequest> {
        let mut tables = self.lock()?;
        if !tables.families.iter().any(|f| f.id == request.family_id) {
            return Err(GatewayError::not_found("family", request.family_id));
        }
        tables.join_requests.push(request.clone());
        Ok(request.clone())
    }

    fn join_request(&self, request_id: Uuid) -> GatewayResult<JoinRequest> {
        let tables = self.lock()?;
        tables
            .join_requests
            .iter()
            .find(|r| r.id == request_id)
            .cloned()
            .ok_or_else(|| GatewayError::not_found("join request", request_id))
    }

    fn list_join_requests(&self, actor: Uuid, family_id: Uuid) -> GatewayResult<Vec<JoinRequest>> {
        let tables = self.lock()?;
        let own: Vec<JoinRequest> = tables
            .join_requests
            .iter()
            .filter(|r| r.family_id == family_id)
            .cloned()
            .collect();
        match tables.role_of(actor, family_id) {
            Some(role) if role.can_manage_members() => Ok(own),
            _ => Ok(own.into_iter().filter(|r| r.requester_id == actor).collect()),
        }
    }

    fn insert_invitation(&self, actor: Uuid, invitation: &Invitation) -> GatewayResult<Invitation> {
        let mut tables = self.lock()?;
        tables.require(
            actor,
            invitation.family_id,
            Role::can_manage_members,
            "invite members",
        )?;
        if tables.invitations.iter().any(|i| i.token == invitation.token) {
            return Err(GatewayError::UniqueViolation("invitations.token".into()));
        }
        tables.invitations.push(invitation.clone());
        Ok(invitation.clone())
    }

    fn create_family_with_owner(
        &self,
        owner: &Identity,
        family: &NewFamily,
    ) -> GatewayResult<MembershipBundle> {
        let now = self.clock.now();
        let mut tables = self.lock()?;
        let public_id = tables.unique_public_id();
        let created = Family {
            id: Uuid::new_v4(),
            name: family.name.trim().to_string(),
            public_id,
            currency: CurrencyCode::new(&family.currency),
            timezone: family.timezone.clone(),
        };
        let family_id = created.id;
        tables.families.push(created);
        tables.grant(
            owner.id,
            &owner.normalized_email(),
            Some(&family.owner_name),
            family_id,
            Role::Admin,
            now,
        )
    }

    fn bootstrap_default_categories(&self, family_id: Uuid) -> GatewayResult<Vec<Category>> {
        let mut tables = self.lock()?;
        if !tables.families.iter().any(|f| f.id == family_id) {
            return Err(GatewayError::not_found("family", family_id));
        }
        if tables.categories.iter().any(|c| c.family_id == family_id) {
            return Ok(Vec::new());
        }
        let seeded = default_categories_for(family_id);
        tables.categories.extend(seeded.iter().cloned());
        Ok(seeded)
    }

    fn resolve_join_request(
        &self,
        actor: Uuid,
        request_id: Uuid,
        decision: JoinDecision,
    ) -> GatewayResult<JoinResolution> {
        let now = self.clock.now();
        let mut tables = self.lock()?;
        let index = tables
            .join_requests
            .iter()
            .position(|r| r.id == request_id)
            .ok_or_else(|| GatewayError::not_found("join request", request_id))?;
        let family_id = tables.join_requests[index].family_id;
        tables.require(
            actor,
            family_id,
            Role::can_manage_members,
            "resolve join requests",
        )?;
        let mut request = tables.join_requests[index].clone();
        if let Err(status) = request.resolve(matches!(decision, JoinDecision::Approve { .. })) {
            return Err(GatewayError::Rpc {
                name: "resolve_join_request",
                message: format!("request is already {status}"),
            });
        }

        let granted = match decision {
            JoinDecision::Approve { role } => {
                if tables.role_of(request.requester_id, family_id).is_some() {
                    return Err(GatewayError::Rpc {
                        name: "resolve_join_request",
                        message: "requester is already a member".into(),
                    });
                }
                Some(tables.grant(
                    request.requester_id,
                    &request.email,
                    None,
                    family_id,
                    role,
                    now,
                )?)
            }
            JoinDecision::Reject => None,
        };
        tables.join_requests[index] = request.clone();
        Ok(JoinResolution { request, granted })
    }

    fn redeem_invitation(
        &self,
        token: &str,
        identity: &Identity,
    ) -> GatewayResult<Result<Redemption, InvitationError>> {
        let now = self.clock.now();
        let mut tables = self.lock()?;
        let Some(index) = tables.invitations.iter().position(|i| i.token == token) else {
            return Ok(Err(InvitationError::NotFound));
        };
        if let Err(reason) = tables.invitations[index].check_redeemable(&identity.email, now) {
            return Ok(Err(reason));
        }
        let family_id = tables.invitations[index].family_id;
        if tables.role_of(identity.id, family_id).is_some() {
            return Ok(Err(InvitationError::AlreadyMember));
        }
        let role = tables.invitations[index].suggested_role;
        let granted = tables.grant(
            identity.id,
            &identity.normalized_email(),
            None,
            family_id,
            role,
            now,
        )?;
        let invitation = &mut tables.invitations[index];
        invitation.consume(now);
        Ok(Ok(Redemption {
            invitation: invitation.clone(),
            granted,
        }))
    }
}
