use std::{collections::BTreeSet, fmt};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::currency::CurrencyCode;
use crate::domain::common::{Displayable, Identifiable};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Debit,
    Credit,
    Transfer,
    Other,
}

impl PaymentMethod {
    /// Lenient parse used when decoding backend rows; unknown values map to `Other`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "cash" => PaymentMethod::Cash,
            "debit" => PaymentMethod::Debit,
            "credit" => PaymentMethod::Credit,
            "transfer" => PaymentMethod::Transfer,
            _ => PaymentMethod::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Debit => "debit",
            PaymentMethod::Credit => "credit",
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::Other => "other",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single recorded household expense.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Expense {
    pub id: Uuid,
    pub family_id: Uuid,
    pub member_id: Uuid,
    pub category_id: Uuid,
    pub amount: f64,
    pub currency: CurrencyCode,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant: Option<String>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Expense {
    pub fn from_draft(family_id: Uuid, draft: ExpenseDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            family_id,
            member_id: draft.member_id,
            category_id: draft.category_id,
            amount: draft.amount,
            currency: draft.currency,
            description: draft.description.trim().to_string(),
            merchant: draft
                .merchant
                .map(|merchant| merchant.trim().to_string())
                .filter(|merchant| !merchant.is_empty()),
            payment_method: draft.payment_method,
            tags: draft.tags,
            date: draft.date,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies editable fields from a draft, keeping identity and creation time.
    pub fn apply(&mut self, draft: ExpenseDraft, now: DateTime<Utc>) {
        let created_at = self.created_at;
        let id = self.id;
        let family_id = self.family_id;
        *self = Self::from_draft(family_id, draft, now);
        self.id = id;
        self.created_at = created_at;
    }
}

impl Identifiable for Expense {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Displayable for Expense {
    fn display_label(&self) -> String {
        match &self.merchant {
            Some(merchant) => format!("{} {} ({})", self.date, self.description, merchant),
            None => format!("{} {}", self.date, self.description),
        }
    }
}

/// User-supplied expense fields prior to validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpenseDraft {
    pub member_id: Uuid,
    pub category_id: Uuid,
    pub amount: f64,
    pub currency: CurrencyCode,
    pub description: String,
    #[serde(default)]
    pub merchant: Option<String>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub date: NaiveDate,
}

impl ExpenseDraft {
    pub fn new(
        member_id: Uuid,
        category_id: Uuid,
        amount: f64,
        description: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        Self {
            member_id,
            category_id,
            amount,
            currency: CurrencyCode::default(),
            description: description.into(),
            merchant: None,
            payment_method: PaymentMethod::default(),
            tags: BTreeSet::new(),
            date,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = method;
        self
    }

    pub fn with_merchant(mut self, merchant: impl Into<String>) -> Self {
        self.merchant = Some(merchant.into());
        self
    }
}
