use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{BudgetProgress, HierarchicalProgress};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AlertThresholds {
    pub warn_at: f64,
    pub overspend_at: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            warn_at: 85.0,
            overspend_at: 100.0,
        }
    }
}

/// Severity ordering: `Overspending` sorts before `HighUsage`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Overspending,
    HighUsage,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BudgetAlert {
    pub kind: AlertKind,
    pub category_id: Uuid,
    pub category_name: String,
    pub percentage: f64,
    pub budget_amount: f64,
    pub spent_amount: f64,
    /// `budget - spent`; negative when overspent.
    pub variance: f64,
}

pub struct AlertService;

impl AlertService {
    /// Threshold notices for the given rows, most severe first.
    pub fn derive(rows: &[BudgetProgress], thresholds: &AlertThresholds) -> Vec<BudgetAlert> {
        let mut alerts: Vec<BudgetAlert> = rows
            .iter()
            .filter_map(|row| Self::alert_for(row, thresholds))
            .collect();
        alerts.sort_by(|a, b| {
            a.kind
                .cmp(&b.kind)
                .then_with(|| {
                    b.percentage
                        .partial_cmp(&a.percentage)
                        .unwrap_or(Ordering::Equal)
                })
                .then_with(|| a.category_name.cmp(&b.category_name))
        });
        alerts
    }

    /// Same as [`AlertService::derive`] over parents and their sub-categories.
    pub fn derive_from_hierarchy(
        rows: &[HierarchicalProgress],
        thresholds: &AlertThresholds,
    ) -> Vec<BudgetAlert> {
        let flat: Vec<BudgetProgress> = rows
            .iter()
            .flat_map(|row| std::iter::once(&row.progress).chain(row.subcategories.iter()))
            .cloned()
            .collect();
        Self::derive(&flat, thresholds)
    }

    fn alert_for(row: &BudgetProgress, thresholds: &AlertThresholds) -> Option<BudgetAlert> {
        let kind = if row.percentage >= thresholds.overspend_at {
            AlertKind::Overspending
        } else if row.percentage >= thresholds.warn_at {
            AlertKind::HighUsage
        } else {
            return None;
        };
        Some(BudgetAlert {
            kind,
            category_id: row.category_id,
            category_name: row.category_name.clone(),
            percentage: row.percentage,
            budget_amount: row.budget_amount,
            spent_amount: row.spent_amount,
            variance: row.budget_amount - row.spent_amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProgressStatus;

    fn row(name: &str, budget: f64, spent: f64) -> BudgetProgress {
        BudgetProgress {
            category_id: Uuid::new_v4(),
            category_name: name.into(),
            budget_amount: budget,
            spent_amount: spent,
            percentage: spent / budget * 100.0,
            status: ProgressStatus::Success,
        }
    }

    #[test]
    fn overspending_ranks_above_high_usage() {
        let rows = vec![
            row("Fuel", 100.0, 86.0),
            row("Food", 100.0, 120.0),
            row("Rent", 100.0, 50.0),
            row("Fun", 100.0, 100.0),
        ];
        let alerts = AlertService::derive(&rows, &AlertThresholds::default());

        let names: Vec<_> = alerts.iter().map(|a| a.category_name.as_str()).collect();
        assert_eq!(names, vec!["Food", "Fun", "Fuel"]);
        assert_eq!(alerts[0].kind, AlertKind::Overspending);
        assert_eq!(alerts[0].variance, -20.0);
        assert_eq!(alerts[2].kind, AlertKind::HighUsage);
        assert_eq!(alerts[2].variance, 14.0);
    }

    #[test]
    fn custom_thresholds_apply() {
        let rows = vec![row("Food", 100.0, 60.0)];
        let thresholds = AlertThresholds {
            warn_at: 50.0,
            overspend_at: 80.0,
        };
        let alerts = AlertService::derive(&rows, &thresholds);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::HighUsage);
    }
}
