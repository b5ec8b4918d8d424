//! Domain types representing spending categories.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::common::*;

/// Groups expenses for budgeting. At most one level of nesting is allowed:
/// a category with a `parent_id` is a sub-category and is never a parent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: Uuid,
    pub family_id: Uuid,
    pub name: String,
    pub icon: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub order: i32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Category {
    pub fn new(family_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            family_id,
            name: name.into(),
            icon: "tag".into(),
            color: "#64748b".into(),
            parent_id: None,
            order: 0,
            active: true,
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>, color: impl Into<String>) -> Self {
        self.icon = icon.into();
        self.color = color.into();
        self
    }

    pub fn with_parent(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn is_subcategory(&self) -> bool {
        self.parent_id.is_some()
    }
}

impl Identifiable for Category {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for Category {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Displayable for Category {
    fn display_label(&self) -> String {
        if self.is_subcategory() {
            format!("  {}", self.name)
        } else {
            self.name.clone()
        }
    }
}

/// Lowercased, whitespace-collapsed form used for duplicate-name checks.
pub fn normalized_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// A seed entry for the default category set created for a new family.
#[derive(Debug, Clone, Copy)]
pub struct DefaultCategory {
    pub name: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
    pub children: &'static [&'static str],
}

pub const DEFAULT_CATEGORIES: &[DefaultCategory] = &[
    DefaultCategory {
        name: "Food",
        icon: "utensils",
        color: "#f97316",
        children: &["Groceries", "Restaurants"],
    },
    DefaultCategory {
        name: "Housing",
        icon: "home",
        color: "#0ea5e9",
        children: &["Rent", "Maintenance"],
    },
    DefaultCategory {
        name: "Utilities",
        icon: "zap",
        color: "#eab308",
        children: &["Electricity", "Water", "Internet"],
    },
    DefaultCategory {
        name: "Transport",
        icon: "car",
        color: "#6366f1",
        children: &["Fuel", "Public Transport"],
    },
    DefaultCategory {
        name: "Health",
        icon: "heart",
        color: "#ef4444",
        children: &[],
    },
    DefaultCategory {
        name: "Education",
        icon: "book",
        color: "#22c55e",
        children: &[],
    },
    DefaultCategory {
        name: "Entertainment",
        icon: "film",
        color: "#a855f7",
        children: &[],
    },
    DefaultCategory {
        name: "Other",
        icon: "tag",
        color: "#64748b",
        children: &[],
    },
];

/// Expands the default seed into concrete rows for a family, parents first.
pub fn default_categories_for(family_id: Uuid) -> Vec<Category> {
    let mut rows = Vec::new();
    for (index, seed) in DEFAULT_CATEGORIES.iter().enumerate() {
        let parent = Category::new(family_id, seed.name)
            .with_icon(seed.icon, seed.color)
            .with_order(index as i32 * 10);
        let parent_id = parent.id;
        rows.push(parent);
        for (child_index, child) in seed.children.iter().enumerate() {
            rows.push(
                Category::new(family_id, *child)
                    .with_icon(seed.icon, seed.color)
                    .with_parent(parent_id)
                    .with_order(index as i32 * 10 + child_index as i32 + 1),
            );
        }
    }
    rows
}
