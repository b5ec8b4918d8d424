//! JSON row shapes as the managed backend returns them, and their
//! conversions to domain values. Column names follow the backend schema.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::currency::CurrencyCode;
use crate::domain::{
    parse_date, Budget, Category, Expense, Family, FamilyMember, Invitation, JoinRequest,
    Membership, PaymentMethod, Role,
};
use crate::errors::GatewayError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryRow {
    pub id: Uuid,
    pub family_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub order_index: i32,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            family_id: row.family_id,
            name: row.name,
            icon: row.icon.unwrap_or_else(|| "tag".into()),
            color: row.color.unwrap_or_else(|| "#64748b".into()),
            parent_id: row.parent_id,
            order: row.order_index,
            active: row.active,
        }
    }
}

impl From<&Category> for CategoryRow {
    fn from(category: &Category) -> Self {
        CategoryRow {
            id: category.id,
            family_id: category.family_id,
            name: category.name.clone(),
            icon: Some(category.icon.clone()),
            color: Some(category.color.clone()),
            parent_id: category.parent_id,
            order_index: category.order,
            active: category.active,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpenseRow {
    pub id: Uuid,
    pub family_id: Uuid,
    pub member_id: Uuid,
    pub category_id: Uuid,
    pub amount: f64,
    pub currency: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub merchant: Option<String>,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub expense_date: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ExpenseRow> for Expense {
    type Error = GatewayError;

    fn try_from(row: ExpenseRow) -> Result<Self, Self::Error> {
        let date = parse_date("expense_date", &row.expense_date)
            .map_err(|err| GatewayError::Decode(format!("expense {}: {}", row.id, err)))?;
        Ok(Expense {
            id: row.id,
            family_id: row.family_id,
            member_id: row.member_id,
            category_id: row.category_id,
            amount: row.amount,
            currency: CurrencyCode::new(row.currency),
            description: row.description,
            merchant: row.merchant,
            payment_method: PaymentMethod::parse(&row.payment_method),
            tags: row.tags.into_iter().collect::<BTreeSet<_>>(),
            date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<&Expense> for ExpenseRow {
    fn from(expense: &Expense) -> Self {
        ExpenseRow {
            id: expense.id,
            family_id: expense.family_id,
            member_id: expense.member_id,
            category_id: expense.category_id,
            amount: expense.amount,
            currency: expense.currency.as_str().to_string(),
            description: expense.description.clone(),
            merchant: expense.merchant.clone(),
            payment_method: expense.payment_method.as_str().to_string(),
            tags: expense.tags.iter().cloned().collect(),
            expense_date: expense.date.format("%Y-%m-%d").to_string(),
            created_at: expense.created_at,
            updated_at: expense.updated_at,
        }
    }
}

/// The backend allows null category and month for annual or family-wide
/// plans; only monthly category budgets take part in aggregation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BudgetRow {
    pub id: Uuid,
    pub family_id: Uuid,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub member_id: Option<Uuid>,
    pub year: i32,
    #[serde(default)]
    pub month: Option<u32>,
    pub amount: f64,
    pub currency: String,
}

impl BudgetRow {
    pub fn into_budget(self) -> Option<Budget> {
        let category_id = self.category_id?;
        let month = self.month.filter(|month| (1..=12).contains(month))?;
        Some(Budget {
            id: self.id,
            family_id: self.family_id,
            category_id,
            member_id: self.member_id,
            year: self.year,
            month,
            amount: self.amount,
            currency: CurrencyCode::new(self.currency),
        })
    }
}

impl From<&Budget> for BudgetRow {
    fn from(budget: &Budget) -> Self {
        BudgetRow {
            id: budget.id,
            family_id: budget.family_id,
            category_id: Some(budget.category_id),
            member_id: budget.member_id,
            year: budget.year,
            month: Some(budget.month),
            amount: budget.amount,
            currency: budget.currency.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FamilyMemberRow {
    pub id: Uuid,
    pub family_id: Uuid,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: String,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl TryFrom<FamilyMemberRow> for FamilyMember {
    type Error = GatewayError;

    fn try_from(row: FamilyMemberRow) -> Result<Self, Self::Error> {
        let role = Role::parse(&row.role).ok_or_else(|| {
            GatewayError::Decode(format!("member {}: unknown role `{}`", row.id, row.role))
        })?;
        Ok(FamilyMember {
            id: row.id,
            family_id: row.family_id,
            identity_id: row.user_id,
            name: row.name,
            email: row.email,
            role,
            photo_url: row.photo_url,
            active: row.active,
        })
    }
}

impl From<&FamilyMember> for FamilyMemberRow {
    fn from(member: &FamilyMember) -> Self {
        FamilyMemberRow {
            id: member.id,
            family_id: member.family_id,
            user_id: member.identity_id,
            name: member.name.clone(),
            email: member.email.clone(),
            role: member.role.as_str().to_string(),
            photo_url: member.photo_url.clone(),
            active: member.active,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FamilyRow {
    pub id: Uuid,
    pub name: String,
    pub public_id: String,
    pub currency: String,
    pub timezone: String,
}

impl From<FamilyRow> for Family {
    fn from(row: FamilyRow) -> Self {
        Family {
            id: row.id,
            name: row.name,
            public_id: row.public_id,
            currency: CurrencyCode::new(row.currency),
            timezone: row.timezone,
        }
    }
}

impl From<&Family> for FamilyRow {
    fn from(family: &Family) -> Self {
        FamilyRow {
            id: family.id,
            name: family.name.clone(),
            public_id: family.public_id.clone(),
            currency: family.currency.as_str().to_string(),
            timezone: family.timezone.clone(),
        }
    }
}

/// Whole-backend dump used to seed or inspect a [`super::MemoryGateway`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    #[serde(default)]
    pub families: Vec<FamilyRow>,
    #[serde(default)]
    pub categories: Vec<CategoryRow>,
    #[serde(default)]
    pub expenses: Vec<ExpenseRow>,
    #[serde(default)]
    pub budgets: Vec<BudgetRow>,
    #[serde(default)]
    pub family_members: Vec<FamilyMemberRow>,
    #[serde(default)]
    pub memberships: Vec<Membership>,
    #[serde(default)]
    pub join_requests: Vec<JoinRequest>,
    #[serde(default)]
    pub invitations: Vec<Invitation>,
}

/// Decodes a JSON array of rows, failing on the first malformed row.
pub fn decode_rows<R, T>(json: &str) -> Result<Vec<T>, GatewayError>
where
    R: DeserializeOwned,
    T: TryFrom<R, Error = GatewayError>,
{
    let rows: Vec<R> = serde_json::from_str(json)?;
    rows.into_iter().map(T::try_from).collect()
}

pub fn decode_expenses(json: &str) -> Result<Vec<Expense>, GatewayError> {
    decode_rows::<ExpenseRow, Expense>(json)
}
