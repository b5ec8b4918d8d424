//! Derived, never-persisted progress views produced by the aggregation engine.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Success,
    Warning,
    Danger,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::Success => "success",
            ProgressStatus::Warning => "warning",
            ProgressStatus::Danger => "danger",
        }
    }

    /// Raises `self` to at least the severity of `child`; never lowers it.
    pub fn escalate(self, child: ProgressStatus) -> ProgressStatus {
        self.max(child)
    }
}

/// Percentage cut-offs separating the three statuses.
///
/// `warning_at` is inclusive; `danger_above` is exclusive, so a category at
/// exactly 90% of budget still reads as a warning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StatusThresholds {
    pub warning_at: f64,
    pub danger_above: f64,
}

impl Default for StatusThresholds {
    fn default() -> Self {
        Self {
            warning_at: 75.0,
            danger_above: 90.0,
        }
    }
}

impl StatusThresholds {
    pub fn classify(&self, percentage: f64) -> ProgressStatus {
        if percentage > self.danger_above {
            ProgressStatus::Danger
        } else if percentage >= self.warning_at {
            ProgressStatus::Warning
        } else {
            ProgressStatus::Success
        }
    }
}

/// `spent / budget * 100`, or 0 when there is no positive budget.
pub fn percentage_of(spent: f64, budget: f64) -> f64 {
    if budget > 0.0 {
        spent / budget * 100.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BudgetProgress {
    pub category_id: Uuid,
    pub category_name: String,
    pub budget_amount: f64,
    pub spent_amount: f64,
    pub percentage: f64,
    pub status: ProgressStatus,
}

impl BudgetProgress {
    pub fn remaining(&self) -> f64 {
        self.budget_amount - self.spent_amount
    }

    /// Percentage clamped to `0..=100` for progress bars.
    pub fn display_percentage(&self) -> f64 {
        self.percentage.clamp(0.0, 100.0)
    }
}

/// A top-level category with its own progress and its sub-categories'.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HierarchicalProgress {
    #[serde(flatten)]
    pub progress: BudgetProgress,
    /// Status computed from the parent's own ratio before escalation.
    pub own_status: ProgressStatus,
    pub subcategories: Vec<BudgetProgress>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardKpis {
    pub total_budget: f64,
    pub total_spent: f64,
    pub remaining: f64,
    pub percentage: f64,
    pub status: ProgressStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemberBreakdown {
    pub member_id: Uuid,
    pub member_name: String,
    pub budget_amount: f64,
    pub spent_amount: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryFamilyBreakdown {
    pub category_id: Uuid,
    pub category_name: String,
    pub members: Vec<MemberBreakdown>,
    pub family_budget: f64,
    pub family_spent: f64,
    pub family_percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthTrend {
    pub month: u32,
    pub budgeted: f64,
    pub spent: f64,
    pub percentage: f64,
    pub cumulative_budgeted: f64,
    pub cumulative_spent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyBurn {
    pub day: u32,
    pub spent: f64,
    pub cumulative_spent: f64,
    /// Linear share of the monthly budget expected to be used by this day.
    pub expected_cumulative: f64,
    pub percentage_of_budget: f64,
}
