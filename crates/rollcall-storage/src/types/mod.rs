//! Type definitions for rollcall storage.

mod companies;
mod ids;
mod invitations;
mod memberships;
mod roles;
mod users;

// Re-export all types from submodules
pub use companies::*;
pub use ids::*;
pub use invitations::*;
pub use memberships::*;
pub use roles::*;
pub use users::*;
