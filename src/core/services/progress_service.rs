//! Budget aggregation: pure reductions over in-memory collections.
//!
//! Every view is recomputed from the input slices on each call. Percentages
//! are never clamped here; a 150% overspend stays 150.

use std::collections::HashMap;

use chrono::Datelike;
use uuid::Uuid;

use crate::domain::{
    progress::percentage_of, Budget, BudgetProgress, Category, CategoryFamilyBreakdown, DailyBurn,
    DashboardKpis, Expense, FamilyMember, HierarchicalProgress, MemberBreakdown, MonthTrend,
    Period, StatusThresholds,
};

pub struct ProgressService;

impl ProgressService {
    /// Expenses whose date falls in `period`, compared by year and month components.
    pub fn filter_by_period(expenses: &[Expense], period: Period) -> Vec<&Expense> {
        expenses
            .iter()
            .filter(|expense| period.contains(expense.date))
            .collect()
    }

    pub fn category_progress(
        categories: &[Category],
        budgets: &[Budget],
        expenses: &[Expense],
        period: Period,
    ) -> Vec<BudgetProgress> {
        Self::category_progress_with(
            categories,
            budgets,
            expenses,
            period,
            &StatusThresholds::default(),
        )
    }

    /// One row per category with a positive budget in `period`, in input order.
    pub fn category_progress_with(
        categories: &[Category],
        budgets: &[Budget],
        expenses: &[Expense],
        period: Period,
        thresholds: &StatusThresholds,
    ) -> Vec<BudgetProgress> {
        let totals = PeriodTotals::collect(budgets, expenses, period);
        categories
            .iter()
            .filter_map(|category| totals.progress_for(category, thresholds))
            .collect()
    }

    pub fn hierarchical_progress(
        categories: &[Category],
        budgets: &[Budget],
        expenses: &[Expense],
        period: Period,
    ) -> Vec<HierarchicalProgress> {
        Self::hierarchical_progress_with(
            categories,
            budgets,
            expenses,
            period,
            &StatusThresholds::default(),
        )
    }

    /// Top-level rows carrying their sub-categories. A child can raise the
    /// parent's displayed status but never lower it. A parent without a
    /// budget of its own is kept when any child has one.
    pub fn hierarchical_progress_with(
        categories: &[Category],
        budgets: &[Budget],
        expenses: &[Expense],
        period: Period,
        thresholds: &StatusThresholds,
    ) -> Vec<HierarchicalProgress> {
        let totals = PeriodTotals::collect(budgets, expenses, period);
        categories
            .iter()
            .filter(|category| category.parent_id.is_none())
            .filter_map(|parent| {
                let subcategories: Vec<BudgetProgress> = categories
                    .iter()
                    .filter(|child| child.parent_id == Some(parent.id))
                    .filter_map(|child| totals.progress_for(child, thresholds))
                    .collect();
                // An unbudgeted parent still carries its budgeted children.
                let mut progress = match totals.progress_for(parent, thresholds) {
                    Some(progress) => progress,
                    None if !subcategories.is_empty() => totals.row_for(parent, thresholds),
                    None => return None,
                };
                let own_status = progress.status;
                progress.status = subcategories
                    .iter()
                    .fold(own_status, |status, child| status.escalate(child.status));
                Some(HierarchicalProgress {
                    progress,
                    own_status,
                    subcategories,
                })
            })
            .collect()
    }

    pub fn dashboard_kpis(budgets: &[Budget], expenses: &[Expense], period: Period) -> DashboardKpis {
        Self::dashboard_kpis_with(budgets, expenses, period, &StatusThresholds::default())
    }

    pub fn dashboard_kpis_with(
        budgets: &[Budget],
        expenses: &[Expense],
        period: Period,
        thresholds: &StatusThresholds,
    ) -> DashboardKpis {
        let total_budget: f64 = budgets
            .iter()
            .filter(|budget| budget.in_period(period))
            .map(|budget| budget.amount)
            .sum();
        let total_spent: f64 = Self::filter_by_period(expenses, period)
            .iter()
            .map(|expense| expense.amount)
            .sum();
        let percentage = percentage_of(total_spent, total_budget);
        DashboardKpis {
            total_budget,
            total_spent,
            remaining: total_budget - total_spent,
            percentage,
            status: thresholds.classify(percentage),
        }
    }

    /// Per-category, per-member breakdown. Family totals are straight sums
    /// over the member rows, so budgets without a member are not counted here.
    pub fn family_data_by_category(
        categories: &[Category],
        budgets: &[Budget],
        expenses: &[Expense],
        members: &[FamilyMember],
        period: Period,
    ) -> Vec<CategoryFamilyBreakdown> {
        let mut budget_by: HashMap<(Uuid, Uuid), f64> = HashMap::new();
        for budget in budgets.iter().filter(|budget| budget.in_period(period)) {
            if let Some(member_id) = budget.member_id {
                *budget_by.entry((budget.category_id, member_id)).or_default() += budget.amount;
            }
        }
        let mut spent_by: HashMap<(Uuid, Uuid), f64> = HashMap::new();
        for expense in Self::filter_by_period(expenses, period) {
            *spent_by
                .entry((expense.category_id, expense.member_id))
                .or_default() += expense.amount;
        }

        categories
            .iter()
            .filter_map(|category| {
                let rows: Vec<MemberBreakdown> = members
                    .iter()
                    .map(|member| {
                        let key = (category.id, member.id);
                        let budget_amount = budget_by.get(&key).copied().unwrap_or(0.0);
                        let spent_amount = spent_by.get(&key).copied().unwrap_or(0.0);
                        MemberBreakdown {
                            member_id: member.id,
                            member_name: member.name.clone(),
                            budget_amount,
                            spent_amount,
                            percentage: percentage_of(spent_amount, budget_amount),
                        }
                    })
                    .collect();
                let family_budget: f64 = rows.iter().map(|row| row.budget_amount).sum();
                if family_budget <= 0.0 {
                    return None;
                }
                let family_spent: f64 = rows.iter().map(|row| row.spent_amount).sum();
                Some(CategoryFamilyBreakdown {
                    category_id: category.id,
                    category_name: category.name.clone(),
                    members: rows,
                    family_budget,
                    family_spent,
                    family_percentage: percentage_of(family_spent, family_budget),
                })
            })
            .collect()
    }

    /// Twelve monthly points for `year`, with running totals.
    pub fn year_trend(budgets: &[Budget], expenses: &[Expense], year: i32) -> Vec<MonthTrend> {
        let mut budgeted = [0.0_f64; 12];
        let mut spent = [0.0_f64; 12];
        for budget in budgets.iter().filter(|budget| budget.year == year) {
            if let Some(slot) = budgeted.get_mut(budget.month.wrapping_sub(1) as usize) {
                *slot += budget.amount;
            }
        }
        for expense in expenses {
            let period = Period::of(expense.date);
            if period.year == year {
                spent[(period.month - 1) as usize] += expense.amount;
            }
        }

        let mut cumulative_budgeted = 0.0;
        let mut cumulative_spent = 0.0;
        (0..12)
            .map(|index| {
                cumulative_budgeted += budgeted[index];
                cumulative_spent += spent[index];
                MonthTrend {
                    month: index as u32 + 1,
                    budgeted: budgeted[index],
                    spent: spent[index],
                    percentage: percentage_of(spent[index], budgeted[index]),
                    cumulative_budgeted,
                    cumulative_spent,
                }
            })
            .collect()
    }

    /// Day-by-day spending for `period` against a linear burn of its budget.
    pub fn daily_burn(budgets: &[Budget], expenses: &[Expense], period: Period) -> Vec<DailyBurn> {
        let days = period.days_in_month();
        let total_budget: f64 = budgets
            .iter()
            .filter(|budget| budget.in_period(period))
            .map(|budget| budget.amount)
            .sum();
        let mut per_day = vec![0.0_f64; days as usize];
        for expense in Self::filter_by_period(expenses, period) {
            if let Some(slot) = per_day.get_mut(expense.date.day0() as usize) {
                *slot += expense.amount;
            }
        }

        let mut cumulative_spent = 0.0;
        per_day
            .into_iter()
            .enumerate()
            .map(|(index, spent)| {
                let day = index as u32 + 1;
                cumulative_spent += spent;
                let expected_cumulative = if days > 0 {
                    total_budget * f64::from(day) / f64::from(days)
                } else {
                    0.0
                };
                DailyBurn {
                    day,
                    spent,
                    cumulative_spent,
                    expected_cumulative,
                    percentage_of_budget: percentage_of(cumulative_spent, total_budget),
                }
            })
            .collect()
    }
}

/// Budget and spend sums per category for one period.
struct PeriodTotals {
    budgeted: HashMap<Uuid, f64>,
    spent: HashMap<Uuid, f64>,
}

impl PeriodTotals {
    fn collect(budgets: &[Budget], expenses: &[Expense], period: Period) -> Self {
        let mut budgeted: HashMap<Uuid, f64> = HashMap::new();
        for budget in budgets.iter().filter(|budget| budget.in_period(period)) {
            *budgeted.entry(budget.category_id).or_default() += budget.amount;
        }
        let mut spent: HashMap<Uuid, f64> = HashMap::new();
        for expense in ProgressService::filter_by_period(expenses, period) {
            *spent.entry(expense.category_id).or_default() += expense.amount;
        }
        Self { budgeted, spent }
    }

    fn progress_for(
        &self,
        category: &Category,
        thresholds: &StatusThresholds,
    ) -> Option<BudgetProgress> {
        let budget_amount = self.budgeted.get(&category.id).copied().unwrap_or(0.0);
        if budget_amount.is_nan() || budget_amount <= 0.0 {
            return None;
        }
        Some(self.row_for(category, thresholds))
    }

    /// Progress row without the zero-budget exclusion.
    fn row_for(&self, category: &Category, thresholds: &StatusThresholds) -> BudgetProgress {
        let budget_amount = self
            .budgeted
            .get(&category.id)
            .copied()
            .filter(|amount| *amount > 0.0)
            .unwrap_or(0.0);
        let spent_amount = self.spent.get(&category.id).copied().unwrap_or(0.0);
        let percentage = percentage_of(spent_amount, budget_amount);
        BudgetProgress {
            category_id: category.id,
            category_name: category.name.clone(),
            budget_amount,
            spent_amount,
            percentage,
            status: thresholds.classify(percentage),
        }
    }
}
