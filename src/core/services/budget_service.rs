use uuid::Uuid;

use crate::currency::CurrencyCode;
use crate::domain::{Budget, Category, FamilyMember, Period, Role};
use crate::errors::ValidationError;
use crate::storage::Gateway;

use super::{Actor, ServiceResult};

/// Fields of a budget cell as entered by the user.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetInput {
    pub category_id: Uuid,
    pub member_id: Option<Uuid>,
    pub period: Period,
    pub amount: f64,
    pub currency: CurrencyCode,
}

pub struct BudgetService;

impl BudgetService {
    /// Sets the amount for one (category, member, month) cell. Writing the
    /// same cell twice leaves a single row holding the latest amount.
    pub fn set(
        gateway: &dyn Gateway,
        actor: &Actor,
        family_id: Uuid,
        categories: &[Category],
        members: &[FamilyMember],
        input: BudgetInput,
    ) -> ServiceResult<Budget> {
        actor.require(Role::can_edit, "set budgets")?;
        if !input.amount.is_finite() || input.amount < 0.0 {
            return Err(ValidationError::new("amount", "Budget cannot be negative").into());
        }
        if !categories.iter().any(|c| c.id == input.category_id) {
            return Err(ValidationError::new("category_id", "Category not found").into());
        }
        if let Some(member_id) = input.member_id {
            if !members.iter().any(|m| m.id == member_id) {
                return Err(ValidationError::new("member_id", "Member not found").into());
            }
        }
        let mut budget = Budget::new(
            family_id,
            input.category_id,
            input.member_id,
            input.period,
            input.amount,
        );
        budget.currency = input.currency;
        let stored = gateway.upsert_budget(actor.identity_id, &budget)?;
        tracing::info!(
            budget_id = %stored.id,
            period = %input.period,
            amount = stored.amount,
            "budget saved"
        );
        Ok(stored)
    }

    /// Copies every budget of `from` into `to`, overwriting matching cells.
    pub fn copy_period(
        gateway: &dyn Gateway,
        actor: &Actor,
        budgets: &[Budget],
        from: Period,
        to: Period,
    ) -> ServiceResult<Vec<Budget>> {
        actor.require(Role::can_edit, "set budgets")?;
        let mut copied = Vec::new();
        for source in budgets.iter().filter(|b| b.in_period(from)) {
            let mut budget = Budget::new(
                source.family_id,
                source.category_id,
                source.member_id,
                to,
                source.amount,
            );
            budget.currency = source.currency.clone();
            copied.push(gateway.upsert_budget(actor.identity_id, &budget)?);
        }
        tracing::info!(%from, %to, count = copied.len(), "budgets copied");
        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Identity;
    use crate::storage::{MemoryGateway, NewFamily};

    fn setup() -> (MemoryGateway, Actor, Uuid, Vec<Category>, Vec<FamilyMember>) {
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
        let actor = Actor {
            identity_id: owner.id,
            member_id: Some(bundle.member.id),
            role: Role::Admin,
        };
        (gateway, actor, bundle.family.id, categories, vec![bundle.member])
    }

    #[test]
    fn negative_amounts_are_rejected() {
        let (gateway, actor, family_id, categories, members) = setup();
        let input = BudgetInput {
            category_id: categories[0].id,
            member_id: None,
            period: Period::new(2024, 6).unwrap(),
            amount: -1.0,
            currency: CurrencyCode::default(),
        };
        let err =
            BudgetService::set(&gateway, &actor, family_id, &categories, &members, input).unwrap_err();
        assert_eq!(err.field(), Some("amount"));
    }

    #[test]
    fn copy_period_moves_amounts_forward() {
        let (gateway, actor, family_id, categories, members) = setup();
        let june = Period::new(2024, 6).unwrap();
        let input = BudgetInput {
            category_id: categories[0].id,
            member_id: Some(members[0].id),
            period: june,
            amount: 1000.0,
            currency: CurrencyCode::default(),
        };
        BudgetService::set(&gateway, &actor, family_id, &categories, &members, input).unwrap();
        let budgets = gateway.list_budgets(family_id).unwrap();
        let copied = BudgetService::copy_period(&gateway, &actor, &budgets, june, june.next()).unwrap();
        assert_eq!(copied.len(), 1);
        assert_eq!(copied[0].month, 7);
        assert_eq!(gateway.list_budgets(family_id).unwrap().len(), 2);
    }
}
