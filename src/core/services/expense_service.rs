use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Category, Expense, ExpenseDraft, FamilyMember, PaymentMethod, Period, Role};
use crate::errors::ValidationError;
use crate::storage::Gateway;

use super::category_service::CategoryService;
use super::{Actor, ServiceError, ServiceResult};

pub struct ExpenseService;

impl ExpenseService {
    pub fn add(
        gateway: &dyn Gateway,
        actor: &Actor,
        family_id: Uuid,
        members: &[FamilyMember],
        categories: &[Category],
        draft: ExpenseDraft,
        now: DateTime<Utc>,
    ) -> ServiceResult<Expense> {
        Self::validate(actor, members, categories, &draft)?;
        let expense = Expense::from_draft(family_id, draft, now);
        let stored = gateway.insert_expense(actor.identity_id, &expense)?;
        tracing::info!(expense_id = %stored.id, amount = stored.amount, "expense recorded");
        Ok(stored)
    }

    pub fn edit(
        gateway: &dyn Gateway,
        actor: &Actor,
        members: &[FamilyMember],
        categories: &[Category],
        existing: &Expense,
        draft: ExpenseDraft,
        now: DateTime<Utc>,
    ) -> ServiceResult<Expense> {
        if Some(existing.member_id) != actor.member_id && !actor.role.can_log_for_others() {
            return Err(ServiceError::Unauthorized(
                "edit other members' expenses".into(),
            ));
        }
        Self::validate(actor, members, categories, &draft)?;
        let mut updated = existing.clone();
        updated.apply(draft, now);
        Ok(gateway.update_expense(actor.identity_id, &updated)?)
    }

    pub fn remove(gateway: &dyn Gateway, actor: &Actor, id: Uuid) -> ServiceResult<()> {
        actor.require(Role::can_delete, "delete expenses")?;
        gateway.delete_expense(actor.identity_id, id)?;
        tracing::info!(expense_id = %id, "expense deleted");
        Ok(())
    }

    fn validate(
        actor: &Actor,
        members: &[FamilyMember],
        categories: &[Category],
        draft: &ExpenseDraft,
    ) -> ServiceResult<()> {
        if !draft.amount.is_finite() || draft.amount <= 0.0 {
            return Err(ValidationError::new("amount", "Amount must be greater than zero").into());
        }
        if draft.description.trim().is_empty() {
            return Err(ValidationError::new("description", "Description is required").into());
        }
        if !categories.iter().any(|c| c.id == draft.category_id) {
            return Err(ValidationError::new("category_id", "Category not found").into());
        }
        if !members.iter().any(|m| m.id == draft.member_id && m.active) {
            return Err(ValidationError::new("member_id", "Member not found").into());
        }
        if Some(draft.member_id) != actor.member_id && !actor.role.can_log_for_others() {
            return Err(ValidationError::new(
                "member_id",
                "Only administrators can record expenses for other members",
            )
            .into());
        }
        Ok(())
    }
}

/// Filters for the expense list. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpenseQuery {
    #[serde(default)]
    pub period: Option<Period>,
    #[serde(default)]
    pub member_id: Option<Uuid>,
    /// Matches the category and its sub-categories.
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl ExpenseQuery {
    pub fn for_period(period: Period) -> Self {
        Self {
            period: Some(period),
            ..Self::default()
        }
    }

    /// Matching expenses, newest first.
    pub fn apply<'a>(&self, expenses: &'a [Expense], categories: &[Category]) -> Vec<&'a Expense> {
        let category_ids = self
            .category_id
            .map(|id| CategoryService::with_descendants(categories, id));
        let needle = self
            .text
            .as_deref()
            .map(|text| text.trim().to_lowercase())
            .filter(|text| !text.is_empty());

        let mut matched: Vec<&Expense> = expenses
            .iter()
            .filter(|e| self.period.map_or(true, |p| p.contains(e.date)))
            .filter(|e| self.member_id.map_or(true, |id| e.member_id == id))
            .filter(|e| category_ids.as_ref().map_or(true, |ids| ids.contains(&e.category_id)))
            .filter(|e| self.payment_method.map_or(true, |m| e.payment_method == m))
            .filter(|e| self.tag.as_ref().map_or(true, |tag| e.tags.contains(tag)))
            .filter(|e| {
                needle.as_ref().map_or(true, |needle| {
                    e.description.to_lowercase().contains(needle)
                        || e
                            .merchant
                            .as_deref()
                            .is_some_and(|m| m.to_lowercase().contains(needle))
                })
            })
            .collect();
        matched.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
        matched
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::domain::Identity;
    use crate::storage::{MemoryGateway, NewFamily};

    struct Fixture {
        gateway: MemoryGateway,
        admin: Actor,
        family_id: Uuid,
        members: Vec<FamilyMember>,
        categories: Vec<Category>,
    }

    fn fixture() -> Fixture {
        let gateway = MemoryGateway::new();
        let owner = Identity::new(Uuid::new_v4(), "owner@example.com");
        let bundle = gateway
            .create_family_with_owner(
                &owner,
                &NewFamily {
                    name: "Home".into(),
                    currency: "CLP".into(),
                    timezone: "UTC".into(),
                    owner_name: "Owner".into(),
                },
            )
            .unwrap();
        let categories = gateway
            .bootstrap_default_categories(bundle.family.id)
            .unwrap();
        Fixture {
            admin: Actor {
                identity_id: owner.id,
                member_id: Some(bundle.member.id),
                role: Role::Admin,
            },
            family_id: bundle.family.id,
            members: vec![bundle.member],
            categories,
            gateway,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn rejects_non_positive_amounts() {
        let f = fixture();
        let member = f.members[0].id;
        let draft = ExpenseDraft::new(member, f.categories[0].id, 0.0, "Bread", day(1));
        let err = ExpenseService::add(
            &f.gateway,
            &f.admin,
            f.family_id,
            &f.members,
            &f.categories,
            draft,
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("amount"));
    }

    #[test]
    fn editors_log_only_for_themselves() {
        let f = fixture();
        let editor = Actor {
            member_id: Some(Uuid::new_v4()),
            role: Role::Editor,
            ..f.admin
        };
        let draft = ExpenseDraft::new(f.members[0].id, f.categories[0].id, 10.0, "Bread", day(1));
        let err = ExpenseService::add(
            &f.gateway,
            &editor,
            f.family_id,
            &f.members,
            &f.categories,
            draft,
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("member_id"));
    }

    #[test]
    fn query_matches_subcategories_and_text() {
        let f = fixture();
        let food = f.categories.iter().find(|c| c.name == "Food").unwrap();
        let groceries = f.categories.iter().find(|c| c.name == "Groceries").unwrap();
        let rent = f.categories.iter().find(|c| c.name == "Rent").unwrap();
        let member = f.members[0].id;
        let now = Utc::now();
        let expenses = vec![
            Expense::from_draft(
                f.family_id,
                ExpenseDraft::new(member, groceries.id, 30.0, "Supermarket", day(3))
                    .with_merchant("Lider"),
                now,
            ),
            Expense::from_draft(
                f.family_id,
                ExpenseDraft::new(member, rent.id, 500.0, "June rent", day(1)),
                now,
            ),
        ];

        let by_parent = ExpenseQuery {
            category_id: Some(food.id),
            ..ExpenseQuery::default()
        };
        assert_eq!(by_parent.apply(&expenses, &f.categories).len(), 1);

        let by_merchant = ExpenseQuery {
            text: Some("lider".into()),
            ..ExpenseQuery::default()
        };
        assert_eq!(by_merchant.apply(&expenses, &f.categories)[0].amount, 30.0);

        let all = ExpenseQuery::for_period(Period::new(2024, 6).unwrap());
        let listed = all.apply(&expenses, &f.categories);
        assert_eq!(listed[0].date, day(3));
        assert_eq!(listed.len(), 2);
    }
}
