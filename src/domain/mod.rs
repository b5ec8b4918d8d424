pub mod budget;
pub mod category;
pub mod common;
pub mod expense;
pub mod family;
pub mod member;
pub mod progress;

pub use budget::{Budget, BudgetKey};
pub use category::Category;
pub use common::{parse_date, Displayable, Identifiable, NamedEntity, Period};
pub use expense::{Expense, ExpenseDraft, PaymentMethod};
pub use family::{
    Family, Identity, Invitation, JoinRequest, JoinRequestStatus, Membership, MembershipStatus,
};
pub use member::{FamilyMember, Role};
pub use progress::{
    BudgetProgress, CategoryFamilyBreakdown, DailyBurn, DashboardKpis, HierarchicalProgress,
    MemberBreakdown, MonthTrend, ProgressStatus, StatusThresholds,
};
