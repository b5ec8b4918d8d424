//! Family member profiles and the role model shared with memberships.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::common::{Displayable, Identifiable, NamedEntity};

/// Role of an identity inside a family. The profile vocabulary
/// (`adult`, `kid`) is accepted as an alias of the membership vocabulary.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    #[default]
    #[serde(alias = "adult")]
    Editor,
    #[serde(alias = "kid")]
    Visitor,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "editor" | "adult" => Some(Role::Editor),
            "visitor" | "kid" => Some(Role::Visitor),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::Visitor => "visitor",
        }
    }

    pub fn can_edit(&self) -> bool {
        matches!(self, Role::Admin | Role::Editor)
    }

    pub fn can_delete(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn can_manage_members(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn can_log_for_others(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display profile of a person inside a family.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FamilyMember {
    pub id: Uuid,
    pub family_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_id: Option<Uuid>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub active: bool,
}

impl FamilyMember {
    pub fn new(family_id: Uuid, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            family_id,
            identity_id: None,
            name: name.into(),
            email: None,
            role,
            photo_url: None,
            active: true,
        }
    }

    pub fn for_identity(mut self, identity_id: Uuid, email: impl Into<String>) -> Self {
        self.identity_id = Some(identity_id);
        self.email = Some(email.into());
        self
    }
}

impl Identifiable for FamilyMember {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for FamilyMember {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Displayable for FamilyMember {
    fn display_label(&self) -> String {
        format!("{} ({})", self.name, self.role)
    }
}

/// Display name derived from the local part of an email address.
pub fn name_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default().trim();
    if local.is_empty() {
        email.trim().to_string()
    } else {
        local.to_string()
    }
}

/// First active profile bound to `identity_id`, in collection order.
pub fn current_member(members: &[FamilyMember], identity_id: Uuid) -> Option<&FamilyMember> {
    members
        .iter()
        .find(|member| member.active && member.identity_id == Some(identity_id))
}
