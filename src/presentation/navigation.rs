use serde::Serialize;

use crate::domain::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub path: &'static str,
    pub label: &'static str,
    pub icon: &'static str,
    /// Roles that see the entry.
    pub roles: &'static [Role],
}

const EVERYONE: &[Role] = &[Role::Admin, Role::Editor, Role::Visitor];
const WRITERS: &[Role] = &[Role::Admin, Role::Editor];
const ADMINS: &[Role] = &[Role::Admin];

pub const NAV_ITEMS: &[NavItem] = &[
    NavItem {
        path: "/dashboard",
        label: "Dashboard",
        icon: "home",
        roles: EVERYONE,
    },
    NavItem {
        path: "/expenses",
        label: "Expenses",
        icon: "shopping-cart",
        roles: EVERYONE,
    },
    NavItem {
        path: "/expenses/new",
        label: "Add expense",
        icon: "tag",
        roles: WRITERS,
    },
    NavItem {
        path: "/budgets",
        label: "Budgets",
        icon: "zap",
        roles: WRITERS,
    },
    NavItem {
        path: "/categories",
        label: "Categories",
        icon: "book",
        roles: WRITERS,
    },
    NavItem {
        path: "/reports",
        label: "Reports",
        icon: "film",
        roles: EVERYONE,
    },
    NavItem {
        path: "/family",
        label: "Family",
        icon: "heart",
        roles: ADMINS,
    },
    NavItem {
        path: "/settings",
        label: "Settings",
        icon: "tag",
        roles: EVERYONE,
    },
];

pub fn nav_items_for(role: Role) -> Vec<&'static NavItem> {
    NAV_ITEMS
        .iter()
        .filter(|item| item.roles.contains(&role))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visitors_see_read_only_entries() {
        let paths: Vec<&str> = nav_items_for(Role::Visitor)
            .iter()
            .map(|item| item.path)
            .collect();
        assert!(paths.contains(&"/dashboard"));
        assert!(!paths.contains(&"/budgets"));
        assert!(!paths.contains(&"/family"));
    }

    #[test]
    fn admins_see_everything() {
        assert_eq!(nav_items_for(Role::Admin).len(), NAV_ITEMS.len());
    }
}
