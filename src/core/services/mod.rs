pub mod alert_service;
pub mod budget_service;
pub mod category_service;
pub mod expense_service;
pub mod membership_service;
pub mod progress_service;

pub use alert_service::{AlertKind, AlertService, AlertThresholds, BudgetAlert};
pub use budget_service::{BudgetInput, BudgetService};
pub use category_service::CategoryService;
pub use expense_service::{ExpenseQuery, ExpenseService};
pub use membership_service::{
    EmailOutcome, InvitationOptions, IssuedInvitation, JoinSubmission, MembershipService,
};
pub use progress_service::ProgressService;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{JoinRequestStatus, Role};
use crate::errors::{GatewayError, InvitationError, ValidationError};

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Invitation(#[from] InvitationError),
    #[error("category is referenced by {expenses} expense(s) and {budgets} budget(s)")]
    CategoryInUse { expenses: usize, budgets: usize },
    #[error("category has {0} sub-categories")]
    CategoryHasChildren(usize),
    #[error("not allowed: {0}")]
    Unauthorized(String),
    #[error("already a member of this family")]
    AlreadyMember,
    #[error("a join request for this family is already pending")]
    DuplicateRequest,
    #[error("family not found: {0}")]
    FamilyNotFound(String),
    #[error("join request is already {from}")]
    InvalidTransition { from: JoinRequestStatus },
    #[error("no family selected")]
    NoActiveFamily,
    #[error("not a member of this family")]
    NotAMember,
    #[error("a family needs at least one administrator")]
    LastAdmin,
}

impl ServiceError {
    /// Human-readable notice for the UI. Every gateway failure reads the same.
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::Validation(err) => err.message.clone(),
            ServiceError::Gateway(_) => {
                "Something went wrong while talking to the server. Please try again.".into()
            }
            ServiceError::Invitation(reason) => reason.user_message().into(),
            ServiceError::CategoryInUse { expenses, budgets } => {
                let mut parts = Vec::new();
                if *expenses > 0 {
                    parts.push(format!("{expenses} expense(s)"));
                }
                if *budgets > 0 {
                    parts.push(format!("{budgets} budget(s)"));
                }
                format!(
                    "This category cannot be deleted while {} still use it.",
                    parts.join(" and ")
                )
            }
            ServiceError::CategoryHasChildren(count) => format!(
                "This category has {count} sub-categories. Move or delete them first."
            ),
            ServiceError::Unauthorized(action) => {
                format!("Your role does not allow you to {action}.")
            }
            ServiceError::AlreadyMember => "You are already a member of this family.".into(),
            ServiceError::DuplicateRequest => {
                "You already have a pending request for this family.".into()
            }
            ServiceError::FamilyNotFound(_) => "No family matches that code.".into(),
            ServiceError::InvalidTransition { from } => {
                format!("This request was already {from}.")
            }
            ServiceError::NoActiveFamily => "Select a family first.".into(),
            ServiceError::NotAMember => "You are not a member of this family.".into(),
            ServiceError::LastAdmin => {
                "A family needs at least one administrator.".into()
            }
        }
    }

    /// The input field to highlight, for validation failures.
    pub fn field(&self) -> Option<&str> {
        match self {
            ServiceError::Validation(err) => Some(&err.field),
            _ => None,
        }
    }
}

/// Who is performing an operation within the active family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub identity_id: Uuid,
    pub member_id: Option<Uuid>,
    pub role: Role,
}

impl Actor {
    pub fn require(&self, allowed: fn(&Role) -> bool, action: &str) -> ServiceResult<()> {
        if allowed(&self.role) {
            Ok(())
        } else {
            Err(ServiceError::Unauthorized(action.to_string()))
        }
    }
}
