//! `stockdesk-auth` — identity and role-gating boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: it describes
//! who a user is, what they may submit, and which dashboard sections their
//! role unlocks.

pub mod authorize;
pub mod roles;
pub mod tokens;
pub mod user;

pub use authorize::{AuthzError, Section, authorize, can_assign_roles, can_delete_user, can_edit_user};
pub use roles::Role;
pub use tokens::{Credentials, RefreshedToken, TokenPair};
pub use user::{PasswordChange, RegisterData, UserActivity, UserIdentity, UserUpdate, ValidationError};
