//! The Store trait that backends implement.

use crate::types::*;
use crate::StoreError;

/// The storage trait rollcall-core depends on.
///
/// Every mutating method is atomic from the caller's perspective: it either
/// commits fully or leaves the store unchanged. Methods that touch multiple
/// rows (company creation, invitation acceptance) run inside one backend
/// transaction.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // ───────────────────────────────────── Users ──────────────────────────────────────────

    /// Create a new user (returns generated ID).
    async fn create_user(&self, params: &CreateUserParams) -> Result<UserId, StoreError>;

    /// Get user by ID.
    async fn get_user_by_id(&self, user_id: &UserId) -> Result<User, StoreError>;

    /// Get user by email.
    async fn get_user_by_email(&self, email: &str) -> Result<User, StoreError>;

    // ───────────────────────────────────── Companies ──────────────────────────────────────

    /// Create a new company and the owner's membership row atomically
    /// (returns generated ID).
    async fn create_company(&self, params: &CreateCompanyParams) -> Result<CompanyId, StoreError>;

    /// Get company by ID.
    async fn get_company(&self, company_id: &CompanyId) -> Result<Company, StoreError>;

    /// List all companies a user is a member of.
    async fn list_user_companies(&self, user_id: &UserId) -> Result<Vec<Company>, StoreError>;

    /// Rename a company.
    async fn rename_company(&self, company_id: &CompanyId, name: &str) -> Result<(), StoreError>;

    /// Delete a company (cascades to memberships and invitations).
    async fn delete_company(&self, company_id: &CompanyId) -> Result<(), StoreError>;

    // ───────────────────────────────────── Memberships ────────────────────────────────────

    /// Get a user's membership in a company.
    async fn get_membership(
        &self,
        company_id: &CompanyId,
        user_id: &UserId,
    ) -> Result<Membership, StoreError>;

    /// List all memberships of a company.
    async fn list_memberships(&self, company_id: &CompanyId)
        -> Result<Vec<Membership>, StoreError>;

    /// Add a member to a company with a role.
    async fn add_membership(&self, params: &AddMembershipParams) -> Result<(), StoreError>;

    /// Overwrite the role of an existing membership row.
    async fn update_membership_role(
        &self,
        company_id: &CompanyId,
        user_id: &UserId,
        role: &RoleKey,
    ) -> Result<(), StoreError>;

    /// Remove a member from a company.
    async fn remove_membership(
        &self,
        company_id: &CompanyId,
        user_id: &UserId,
    ) -> Result<(), StoreError>;

    /// Count members in a company.
    async fn count_memberships(&self, company_id: &CompanyId) -> Result<i64, StoreError>;

    // ───────────────────────────────────── Invitations ────────────────────────────────────

    /// Create a pending invitation. Fails with `AlreadyExists` when one is
    /// already pending for the same (company, email) pair.
    async fn create_invitation(
        &self,
        params: &CreateInvitationParams,
    ) -> Result<Invitation, StoreError>;

    /// Get an invitation by ID.
    async fn get_invitation(&self, invitation_id: &InvitationId)
        -> Result<Invitation, StoreError>;

    /// Get an invitation by token hash.
    async fn get_invitation_by_token(&self, token_hash: &str) -> Result<Invitation, StoreError>;

    /// List pending invitations for a company.
    async fn list_invitations(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<Invitation>, StoreError>;

    /// Delete an invitation (revoke or after consumption).
    async fn delete_invitation(&self, invitation_id: &InvitationId) -> Result<(), StoreError>;

    /// Convert an invitation into a membership: inserts the membership row
    /// and deletes the invitation in one transaction. Fails with `NotFound`
    /// when the invitation no longer exists and `AlreadyExists` when the
    /// user is already a member.
    async fn accept_invitation(
        &self,
        invitation_id: &InvitationId,
        user_id: &UserId,
    ) -> Result<Membership, StoreError>;
}
