use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::currency::CurrencyCode;
use crate::domain::common::{Identifiable, Period};

/// A monthly spending allowance for a category, optionally scoped to one member.
///
/// At most one budget exists per [`BudgetKey`]; writing the same key again
/// replaces the stored amount.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Budget {
    pub id: Uuid,
    pub family_id: Uuid,
    pub category_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_id: Option<Uuid>,
    pub year: i32,
    pub month: u32,
    pub amount: f64,
    pub currency: CurrencyCode,
}

impl Budget {
    pub fn new(
        family_id: Uuid,
        category_id: Uuid,
        member_id: Option<Uuid>,
        period: Period,
        amount: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            family_id,
            category_id,
            member_id,
            year: period.year,
            month: period.month,
            amount,
            currency: CurrencyCode::default(),
        }
    }

    pub fn key(&self) -> BudgetKey {
        BudgetKey {
            category_id: self.category_id,
            member_id: self.member_id,
            year: self.year,
            month: self.month,
        }
    }

    pub fn in_period(&self, period: Period) -> bool {
        self.year == period.year && self.month == period.month
    }
}

impl Identifiable for Budget {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// Uniqueness tuple for budgets: `(category, member, year, month)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BudgetKey {
    pub category_id: Uuid,
    pub member_id: Option<Uuid>,
    pub year: i32,
    pub month: u32,
}
