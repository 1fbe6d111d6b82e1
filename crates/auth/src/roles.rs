use core::str::FromStr;

use serde::{Deserialize, Serialize};

use stockdesk_core::DomainError;

/// Role carried on every account.
///
/// The API speaks the long names (`ADMIN`, `SUPER_ADMIN`); the backend's
/// storage codes (`AD`, `SA`) are accepted on input as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Role {
    #[default]
    #[serde(rename = "ADMIN", alias = "AD")]
    Admin,
    #[serde(rename = "SUPER_ADMIN", alias = "SA")]
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::SuperAdmin => "SUPER_ADMIN",
        }
    }

    pub fn is_super_admin(&self) -> bool {
        matches!(self, Role::SuperAdmin)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "ADMIN" | "AD" => Ok(Role::Admin),
            "SUPER_ADMIN" | "SA" => Ok(Role::SuperAdmin),
            other => Err(DomainError::validation(format!("unknown role '{other}'"))),
        }
    }
}
