//! Role gates for dashboard sections and user-management actions.
//!
//! - No IO
//! - No panics
//! - The API remains the authority; these checks only decide what a client
//!   offers to its user.

use serde::Serialize;
use thiserror::Error;

use crate::{Role, UserIdentity};

/// Navigable areas of the admin dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Dashboard,
    Profile,
    Reports,
    Users,
    Settings,
}

impl Section {
    pub const ALL: [Section; 5] = [
        Section::Dashboard,
        Section::Profile,
        Section::Reports,
        Section::Users,
        Section::Settings,
    ];

    /// Roles allowed in; `None` means any authenticated user.
    pub fn required_roles(&self) -> Option<&'static [Role]> {
        match self {
            Section::Dashboard | Section::Profile => None,
            Section::Reports => Some(&[Role::Admin, Role::SuperAdmin]),
            Section::Users | Section::Settings => Some(&[Role::SuperAdmin]),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Dashboard => "dashboard",
            Section::Profile => "profile",
            Section::Reports => "reports",
            Section::Users => "users",
            Section::Settings => "settings",
        }
    }

    /// Sections a role can open, in menu order.
    pub fn visible_to(role: Role) -> Vec<Section> {
        Section::ALL
            .into_iter()
            .filter(|s| s.required_roles().is_none_or(|roles| roles.contains(&role)))
            .collect()
    }
}

impl core::fmt::Display for Section {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("not authenticated")]
    NotAuthenticated,

    #[error("forbidden: role {role} cannot access {section}")]
    Forbidden { section: Section, role: Role },
}

/// Decide whether `user` may open `section`.
pub fn authorize(user: Option<&UserIdentity>, section: Section) -> Result<(), AuthzError> {
    let user = user.ok_or(AuthzError::NotAuthenticated)?;
    match section.required_roles() {
        Some(roles) if !roles.contains(&user.role) => Err(AuthzError::Forbidden {
            section,
            role: user.role,
        }),
        _ => Ok(()),
    }
}

/// Only a super admin may edit another super admin.
pub fn can_edit_user(actor: &UserIdentity, target: &UserIdentity) -> bool {
    actor.role.is_super_admin() || !target.role.is_super_admin()
}

/// Super admins may delete anyone but themselves.
pub fn can_delete_user(actor: &UserIdentity, target: &UserIdentity) -> bool {
    actor.role.is_super_admin() && actor.id != target.id
}

pub fn can_assign_roles(actor: &UserIdentity) -> bool {
    actor.role.is_super_admin()
}
