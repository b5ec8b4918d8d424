//! Static lookup tables consumed by the view layer.

pub mod icons;
pub mod navigation;

pub use icons::{icon_for, IconSpec, FALLBACK_ICON};
pub use navigation::{nav_items_for, NavItem, NAV_ITEMS};
