//! Invitation types.

use chrono::{DateTime, Utc};

use super::{CompanyId, InvitationId, RoleKey, UserId};

/// Pending invitation record.
///
/// Only the SHA-256 digest of the invitation token is stored; the plaintext
/// token is returned to the caller once at creation time.
#[derive(Clone, Debug)]
pub struct Invitation {
    pub id: InvitationId,
    pub company_id: CompanyId,
    pub email: String,
    pub role: RoleKey,
    pub token_hash: String,
    pub invited_by: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Parameters for creating an invitation
#[derive(Clone, Debug)]
pub struct CreateInvitationParams {
    pub company_id: CompanyId,
    pub email: String,
    pub role: RoleKey,
    pub token_hash: String,
    pub invited_by: UserId,
    pub expires_at: DateTime<Utc>,
}
