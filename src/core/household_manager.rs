use std::sync::Arc;

use uuid::Uuid;

use crate::core::reconcile::{apply, Change};
use crate::core::services::{
    Actor, AlertService, AlertThresholds, BudgetAlert, BudgetInput, BudgetService,
    CategoryService, ExpenseQuery, ExpenseService, InvitationOptions, IssuedInvitation,
    MembershipService, ProgressService, ServiceError, ServiceResult,
};
use crate::core::time::Clock;
use crate::domain::member::current_member;
use crate::domain::{
    Budget, BudgetProgress, Category, CategoryFamilyBreakdown, DailyBurn, DashboardKpis, Expense,
    ExpenseDraft, Family, FamilyMember, HierarchicalProgress, Identity, Membership, MonthTrend,
    Period, Role, StatusThresholds,
};
use crate::errors::ValidationError;
use crate::storage::{Gateway, JoinResolution, Mailer, MembershipBundle, Redemption};

/// The four collections loaded for the active family.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FamilyData {
    pub categories: Vec<Category>,
    pub expenses: Vec<Expense>,
    pub budgets: Vec<Budget>,
    pub members: Vec<FamilyMember>,
}

#[derive(Debug, Clone)]
struct ActiveFamily {
    family: Family,
    membership: Membership,
    data: FamilyData,
}

/// Session facade: owns the signed-in identity, the gateway handle and the
/// in-memory collections of the current family. Every mutation goes through
/// a service and then merges the returned row locally; a failed call leaves
/// local state untouched.
pub struct HouseholdManager {
    identity: Identity,
    gateway: Arc<dyn Gateway>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    thresholds: StatusThresholds,
    alert_thresholds: AlertThresholds,
    current: Option<ActiveFamily>,
}

impl HouseholdManager {
    pub fn new(
        identity: Identity,
        gateway: Arc<dyn Gateway>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            identity,
            gateway,
            mailer,
            clock,
            thresholds: StatusThresholds::default(),
            alert_thresholds: AlertThresholds::default(),
            current: None,
        }
    }

    pub fn with_alert_thresholds(mut self, thresholds: AlertThresholds) -> Self {
        self.alert_thresholds = thresholds;
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn gateway(&self) -> &dyn Gateway {
        self.gateway.as_ref()
    }

    pub fn membership(&self) -> MembershipService<'_> {
        MembershipService::new(
            self.gateway.as_ref(),
            self.mailer.as_ref(),
            self.clock.as_ref(),
        )
    }

    pub fn families(&self) -> ServiceResult<Vec<(Family, Membership)>> {
        self.membership().families(self.identity.id)
    }

    /// Creates a family owned by the signed-in identity and makes it current.
    pub fn create_family(
        &mut self,
        name: &str,
        currency: &str,
        timezone: &str,
        owner_name: Option<&str>,
    ) -> ServiceResult<MembershipBundle> {
        let bundle =
            self.membership()
                .create_family(&self.identity, name, currency, timezone, owner_name)?;
        self.switch_family(bundle.family.id)?;
        Ok(bundle)
    }

    /// Loads the four collections for `family_id`. The previous family stays
    /// current if any load fails. An admin opening a family with no
    /// categories seeds the default set.
    pub fn switch_family(&mut self, family_id: Uuid) -> ServiceResult<&FamilyData> {
        let membership = self
            .gateway
            .memberships_for(self.identity.id)?
            .into_iter()
            .find(|m| m.family_id == family_id && m.is_active())
            .ok_or(ServiceError::NotAMember)?;
        let family = self.gateway.family(family_id)?;
        let mut categories = self.gateway.list_categories(family_id)?;
        if categories.is_empty() && membership.role == Role::Admin {
            match self.gateway.bootstrap_default_categories(family_id) {
                Ok(seeded) => categories = seeded,
                Err(err) => tracing::warn!(
                    family_id = %family_id,
                    error = %err,
                    "default categories not seeded"
                ),
            }
        }
        let data = FamilyData {
            categories,
            expenses: self.gateway.list_expenses(family_id)?,
            budgets: self.gateway.list_budgets(family_id)?,
            members: self.gateway.list_members(family_id)?,
        };
        tracing::debug!(
            family_id = %family_id,
            categories = data.categories.len(),
            expenses = data.expenses.len(),
            budgets = data.budgets.len(),
            members = data.members.len(),
            "family data loaded"
        );
        let active = self.current.insert(ActiveFamily {
            family,
            membership,
            data,
        });
        Ok(&active.data)
    }

    pub fn reload(&mut self) -> ServiceResult<&FamilyData> {
        let family_id = self.active()?.family.id;
        self.switch_family(family_id)
    }

    pub fn family(&self) -> Option<&Family> {
        self.current.as_ref().map(|active| &active.family)
    }

    pub fn data(&self) -> Option<&FamilyData> {
        self.current.as_ref().map(|active| &active.data)
    }

    pub fn role(&self) -> Option<Role> {
        self.current.as_ref().map(|active| active.membership.role)
    }

    pub fn current_member(&self) -> Option<&FamilyMember> {
        let active = self.current.as_ref()?;
        current_member(&active.data.members, self.identity.id)
    }

    pub fn actor(&self) -> ServiceResult<Actor> {
        let active = self.active()?;
        Ok(Actor {
            identity_id: self.identity.id,
            member_id: current_member(&active.data.members, self.identity.id).map(|m| m.id),
            role: active.membership.role,
        })
    }

    // Mutations

    pub fn add_category(&mut self, category: Category) -> ServiceResult<Category> {
        let actor = self.actor()?;
        let active = self.current.as_mut().ok_or(ServiceError::NoActiveFamily)?;
        let category = Category {
            family_id: active.family.id,
            ..category
        };
        let stored = CategoryService::add(
            self.gateway.as_ref(),
            &actor,
            &active.data.categories,
            category,
        )?;
        apply(&mut active.data.categories, Change::Created(stored.clone()));
        Ok(stored)
    }

    pub fn edit_category(&mut self, id: Uuid, changes: Category) -> ServiceResult<Category> {
        let actor = self.actor()?;
        let active = self.current.as_mut().ok_or(ServiceError::NoActiveFamily)?;
        let stored = CategoryService::edit(
            self.gateway.as_ref(),
            &actor,
            &active.data.categories,
            id,
            changes,
        )?;
        apply(&mut active.data.categories, Change::Updated(stored.clone()));
        Ok(stored)
    }

    pub fn remove_category(&mut self, id: Uuid) -> ServiceResult<()> {
        let actor = self.actor()?;
        let active = self.current.as_mut().ok_or(ServiceError::NoActiveFamily)?;
        CategoryService::remove(self.gateway.as_ref(), &actor, &active.data.categories, id)?;
        apply(&mut active.data.categories, Change::Deleted(id));
        Ok(())
    }

    pub fn add_expense(&mut self, draft: ExpenseDraft) -> ServiceResult<Expense> {
        let actor = self.actor()?;
        let now = self.clock.now();
        let active = self.current.as_mut().ok_or(ServiceError::NoActiveFamily)?;
        let stored = ExpenseService::add(
            self.gateway.as_ref(),
            &actor,
            active.family.id,
            &active.data.members,
            &active.data.categories,
            draft,
            now,
        )?;
        apply(&mut active.data.expenses, Change::Created(stored.clone()));
        Ok(stored)
    }

    pub fn edit_expense(&mut self, id: Uuid, draft: ExpenseDraft) -> ServiceResult<Expense> {
        let actor = self.actor()?;
        let now = self.clock.now();
        let active = self.current.as_mut().ok_or(ServiceError::NoActiveFamily)?;
        let existing = active
            .data
            .expenses
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| ValidationError::new("expense_id", "Expense not found"))?;
        let stored = ExpenseService::edit(
            self.gateway.as_ref(),
            &actor,
            &active.data.members,
            &active.data.categories,
            &existing,
            draft,
            now,
        )?;
        apply(&mut active.data.expenses, Change::Updated(stored.clone()));
        Ok(stored)
    }

    pub fn remove_expense(&mut self, id: Uuid) -> ServiceResult<()> {
        let actor = self.actor()?;
        let active = self.current.as_mut().ok_or(ServiceError::NoActiveFamily)?;
        ExpenseService::remove(self.gateway.as_ref(), &actor, id)?;
        apply(&mut active.data.expenses, Change::Deleted(id));
        Ok(())
    }

    pub fn set_budget(&mut self, input: BudgetInput) -> ServiceResult<Budget> {
        let actor = self.actor()?;
        let active = self.current.as_mut().ok_or(ServiceError::NoActiveFamily)?;
        let stored = BudgetService::set(
            self.gateway.as_ref(),
            &actor,
            active.family.id,
            &active.data.categories,
            &active.data.members,
            input,
        )?;
        apply(&mut active.data.budgets, Change::Upserted(stored.clone()));
        Ok(stored)
    }

    pub fn copy_budgets(&mut self, from: Period, to: Period) -> ServiceResult<Vec<Budget>> {
        let actor = self.actor()?;
        let active = self.current.as_mut().ok_or(ServiceError::NoActiveFamily)?;
        let copied = BudgetService::copy_period(
            self.gateway.as_ref(),
            &actor,
            &active.data.budgets,
            from,
            to,
        )?;
        for budget in &copied {
            apply(&mut active.data.budgets, Change::Upserted(budget.clone()));
        }
        Ok(copied)
    }

    pub fn invite(&self, email: &str, options: InvitationOptions) -> ServiceResult<IssuedInvitation> {
        let actor = self.actor()?;
        let family_id = self.active()?.family.id;
        self.membership()
            .create_invitation(&actor, family_id, email, options)
    }

    pub fn approve_join_request(
        &mut self,
        request_id: Uuid,
        role: Option<Role>,
    ) -> ServiceResult<JoinResolution> {
        let actor = self.actor()?;
        let resolution = self
            .membership()
            .approve_join_request(&actor, request_id, role)?;
        if let (Some(granted), Some(active)) = (&resolution.granted, self.current.as_mut()) {
            if granted.family.id == active.family.id {
                apply(&mut active.data.members, Change::Created(granted.member.clone()));
            }
        }
        Ok(resolution)
    }

    pub fn reject_join_request(&mut self, request_id: Uuid) -> ServiceResult<JoinResolution> {
        let actor = self.actor()?;
        self.membership().reject_join_request(&actor, request_id)
    }

    pub fn change_role(&mut self, membership_id: Uuid, role: Role) -> ServiceResult<Membership> {
        let actor = self.actor()?;
        let family_id = self.active()?.family.id;
        let updated = self
            .membership()
            .change_role(&actor, family_id, membership_id, role)?;
        let own_identity = self.identity.id;
        let active = self.current.as_mut().ok_or(ServiceError::NoActiveFamily)?;
        for member in active
            .data
            .members
            .iter_mut()
            .filter(|m| m.identity_id == Some(updated.identity_id))
        {
            member.role = role;
        }
        if updated.identity_id == own_identity {
            active.membership = updated.clone();
        }
        Ok(updated)
    }

    /// Redeems an invitation and opens the family it grants.
    pub fn redeem_invitation(&mut self, token: &str) -> ServiceResult<Redemption> {
        let redemption = self.membership().redeem_invitation(&self.identity, token)?;
        self.switch_family(redemption.granted.family.id)?;
        Ok(redemption)
    }

    // Derived views, recomputed on every call.

    pub fn category_progress(&self, period: Period) -> ServiceResult<Vec<BudgetProgress>> {
        let data = &self.active()?.data;
        Ok(ProgressService::category_progress_with(
            &data.categories,
            &data.budgets,
            &data.expenses,
            period,
            &self.thresholds,
        ))
    }

    pub fn hierarchical_progress(&self, period: Period) -> ServiceResult<Vec<HierarchicalProgress>> {
        let data = &self.active()?.data;
        Ok(ProgressService::hierarchical_progress_with(
            &data.categories,
            &data.budgets,
            &data.expenses,
            period,
            &self.thresholds,
        ))
    }

    pub fn dashboard_kpis(&self, period: Period) -> ServiceResult<DashboardKpis> {
        let data = &self.active()?.data;
        Ok(ProgressService::dashboard_kpis_with(
            &data.budgets,
            &data.expenses,
            period,
            &self.thresholds,
        ))
    }

    pub fn family_breakdown(&self, period: Period) -> ServiceResult<Vec<CategoryFamilyBreakdown>> {
        let data = &self.active()?.data;
        Ok(ProgressService::family_data_by_category(
            &data.categories,
            &data.budgets,
            &data.expenses,
            &data.members,
            period,
        ))
    }

    pub fn alerts(&self, period: Period) -> ServiceResult<Vec<BudgetAlert>> {
        let rows = self.category_progress(period)?;
        Ok(AlertService::derive(&rows, &self.alert_thresholds))
    }

    pub fn year_trend(&self, year: i32) -> ServiceResult<Vec<MonthTrend>> {
        let data = &self.active()?.data;
        Ok(ProgressService::year_trend(&data.budgets, &data.expenses, year))
    }

    pub fn daily_burn(&self, period: Period) -> ServiceResult<Vec<DailyBurn>> {
        let data = &self.active()?.data;
        Ok(ProgressService::daily_burn(&data.budgets, &data.expenses, period))
    }

    pub fn expenses(&self, query: &ExpenseQuery) -> ServiceResult<Vec<&Expense>> {
        let data = &self.active()?.data;
        Ok(query.apply(&data.expenses, &data.categories))
    }

    fn active(&self) -> ServiceResult<&ActiveFamily> {
        self.current.as_ref().ok_or(ServiceError::NoActiveFamily)
    }
}
