use uuid::Uuid;

use crate::domain::category::{normalized_name, Category};
use crate::domain::Role;
use crate::errors::ValidationError;
use crate::storage::Gateway;

use super::{Actor, ServiceError, ServiceResult};

pub struct CategoryService;

impl CategoryService {
    pub fn add(
        gateway: &dyn Gateway,
        actor: &Actor,
        categories: &[Category],
        category: Category,
    ) -> ServiceResult<Category> {
        actor.require(Role::can_edit, "create categories")?;
        Self::validate(categories, None, &category)?;
        let stored = gateway.insert_category(actor.identity_id, &category)?;
        tracing::info!(category_id = %stored.id, name = %stored.name, "category created");
        Ok(stored)
    }

    pub fn edit(
        gateway: &dyn Gateway,
        actor: &Actor,
        categories: &[Category],
        id: Uuid,
        changes: Category,
    ) -> ServiceResult<Category> {
        actor.require(Role::can_edit, "edit categories")?;
        let current = categories
            .iter()
            .find(|category| category.id == id)
            .ok_or_else(|| ValidationError::new("category_id", "Category not found"))?;
        Self::validate(categories, Some(id), &changes)?;
        if changes.parent_id.is_some() && categories.iter().any(|c| c.parent_id == Some(id)) {
            return Err(ValidationError::new(
                "parent_id",
                "A category with sub-categories cannot become a sub-category",
            )
            .into());
        }
        let updated = Category {
            id,
            family_id: current.family_id,
            ..changes
        };
        Ok(gateway.update_category(actor.identity_id, &updated)?)
    }

    /// Deletes a category nothing points at. Blocking references are
    /// reported with their counts so the user can clean them up first.
    pub fn remove(
        gateway: &dyn Gateway,
        actor: &Actor,
        categories: &[Category],
        id: Uuid,
    ) -> ServiceResult<()> {
        actor.require(Role::can_delete, "delete categories")?;
        let children = categories
            .iter()
            .filter(|category| category.parent_id == Some(id))
            .count();
        if children > 0 {
            return Err(ServiceError::CategoryHasChildren(children));
        }
        let references = gateway.count_category_references(id)?;
        if !references.is_empty() {
            tracing::warn!(
                category_id = %id,
                expenses = references.expenses,
                budgets = references.budgets,
                "category delete blocked"
            );
            return Err(ServiceError::CategoryInUse {
                expenses: references.expenses,
                budgets: references.budgets,
            });
        }
        gateway.delete_category(actor.identity_id, id)?;
        tracing::info!(category_id = %id, "category deleted");
        Ok(())
    }

    /// Top-level categories in display order, each followed by its children.
    pub fn tree(categories: &[Category]) -> Vec<(&Category, Vec<&Category>)> {
        let mut parents: Vec<&Category> = categories
            .iter()
            .filter(|category| !category.is_subcategory())
            .collect();
        parents.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));
        parents
            .into_iter()
            .map(|parent| {
                let mut children: Vec<&Category> = categories
                    .iter()
                    .filter(|category| category.parent_id == Some(parent.id))
                    .collect();
                children.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));
                (parent, children)
            })
            .collect()
    }

    /// The category itself plus its sub-categories.
    pub fn with_descendants(categories: &[Category], id: Uuid) -> Vec<Uuid> {
        std::iter::once(id)
            .chain(
                categories
                    .iter()
                    .filter(|category| category.parent_id == Some(id))
                    .map(|category| category.id),
            )
            .collect()
    }

    fn validate(categories: &[Category], exclude: Option<Uuid>, candidate: &Category) -> ServiceResult<()> {
        Self::validate_name(categories, exclude, &candidate.name)?;
        if let Some(parent_id) = candidate.parent_id {
            Self::validate_parent(categories, parent_id, exclude)?;
        }
        Ok(())
    }

    fn validate_name(
        categories: &[Category],
        exclude: Option<Uuid>,
        candidate: &str,
    ) -> ServiceResult<()> {
        let normalized = normalized_name(candidate);
        if normalized.is_empty() {
            return Err(ValidationError::new("name", "Category name is required").into());
        }
        let duplicate = categories.iter().any(|category| {
            normalized_name(&category.name) == normalized
                && exclude.map_or(true, |id| category.id != id)
        });
        if duplicate {
            Err(ValidationError::new(
                "name",
                format!("Category `{}` already exists", candidate.trim()),
            )
            .into())
        } else {
            Ok(())
        }
    }

    fn validate_parent(
        categories: &[Category],
        parent_id: Uuid,
        exclude: Option<Uuid>,
    ) -> ServiceResult<()> {
        if exclude == Some(parent_id) {
            return Err(
                ValidationError::new("parent_id", "Category cannot be its own parent").into(),
            );
        }
        let parent = categories
            .iter()
            .find(|category| category.id == parent_id)
            .ok_or_else(|| ValidationError::new("parent_id", "Parent category not found"))?;
        if parent.is_subcategory() {
            return Err(ValidationError::new(
                "parent_id",
                "Sub-categories cannot have sub-categories",
            )
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Identity;
    use crate::storage::{MemoryGateway, NewFamily};

    fn setup() -> (MemoryGateway, Actor, Vec<Category>) {
        let gateway = MemoryGateway::new();
        let owner = Identity::new(Uuid::new_v4(), "owner@example.com");
        let bundle = gateway
            .create_family_with_owner(
                &owner,
                &NewFamily {
                    name: "Home".into(),
                    currency: "CLP".into(),
                    timezone: "UTC".into(),
                    owner_name: "Owner".into(),
                },
            )
            .unwrap();
        let categories = gateway
            .bootstrap_default_categories(bundle.family.id)
            .unwrap();
        let actor = Actor {
            identity_id: owner.id,
            member_id: Some(bundle.member.id),
            role: Role::Admin,
        };
        (gateway, actor, categories)
    }

    #[test]
    fn duplicate_names_are_rejected_case_insensitively() {
        let (gateway, actor, categories) = setup();
        let family_id = categories[0].family_id;
        let err = CategoryService::add(
            &gateway,
            &actor,
            &categories,
            Category::new(family_id, "  food "),
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("name"));
    }

    #[test]
    fn subcategories_cannot_nest() {
        let (gateway, actor, categories) = setup();
        let child = categories
            .iter()
            .find(|c| c.is_subcategory())
            .unwrap()
            .clone();
        let grandchild = Category::new(child.family_id, "Snacks").with_parent(child.id);
        let err = CategoryService::add(&gateway, &actor, &categories, grandchild).unwrap_err();
        assert_eq!(err.field(), Some("parent_id"));
    }

    #[test]
    fn parents_with_children_cannot_be_removed() {
        let (gateway, actor, categories) = setup();
        let parent = categories.iter().find(|c| c.name == "Food").unwrap();
        let err = CategoryService::remove(&gateway, &actor, &categories, parent.id).unwrap_err();
        assert!(matches!(err, ServiceError::CategoryHasChildren(2)));
    }

    #[test]
    fn visitors_cannot_create() {
        let (gateway, actor, categories) = setup();
        let visitor = Actor {
            role: Role::Visitor,
            ..actor
        };
        let err = CategoryService::add(
            &gateway,
            &visitor,
            &categories,
            Category::new(categories[0].family_id, "Pets"),
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[test]
    fn tree_groups_children_under_parents() {
        let (_, _, categories) = setup();
        let tree = CategoryService::tree(&categories);
        let (food, children) = tree.iter().find(|(parent, _)| parent.name == "Food").unwrap();
        assert!(!food.is_subcategory());
        assert_eq!(children.len(), 2);
    }
}
