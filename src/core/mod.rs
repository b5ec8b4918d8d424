pub mod household_manager;
pub mod reconcile;
pub mod services;
pub mod time;

pub use household_manager::{FamilyData, HouseholdManager};
pub use reconcile::{reconcile, Change};
pub use time::{Clock, FixedClock, SystemClock};
