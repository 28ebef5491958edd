//! Core membership operations for rollcall.
//!
//! This crate owns the relationship between users, companies, and roles:
//! the role registry, the authorization gate, and the mutation operations
//! (update role, invite, accept, cancel, remove). Every mutation follows
//! the same pipeline: authorize, validate, one atomic store mutation, then
//! a best-effort event on the bus.

mod error;
mod gate;
mod registry;
mod service;

pub use error::CoreError;
pub use gate::{AuthorizationGate, CompanyAction, RegistryGate};
pub use registry::{Role, RoleRegistry};
pub use service::{CompanyService, InviteOutcome};

use rollcall_storage::{User, UserId};

/// Role key carried by the owner's membership row.
///
/// The owner's role never goes through the registry: the gate grants owners
/// every action, and role updates targeting the owner are rejected.
pub const OWNER_ROLE: &str = "owner";

/// Capability interface for actor types that can belong to companies.
///
/// Operations that act on behalf of a user (accepting an invitation, listing
/// companies) take any type implementing this rather than the storage `User`
/// struct directly.
pub trait HasCompanies {
    fn company_user_id(&self) -> UserId;
    fn company_email(&self) -> &str;
}

impl HasCompanies for User {
    fn company_user_id(&self) -> UserId {
        self.id.clone()
    }

    fn company_email(&self) -> &str {
        &self.email
    }
}
