//! Company types.

use chrono::{DateTime, Utc};

use super::{CompanyId, RoleKey, UserId};

/// Company record
#[derive(Clone, Debug)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub owner_user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for creating a company.
///
/// The owner's membership row is created in the same transaction so a
/// company is never observable without at least one member.
#[derive(Clone, Debug)]
pub struct CreateCompanyParams {
    pub name: String,
    pub owner_user_id: UserId,
    /// Role key recorded on the owner's membership row.
    pub owner_role: RoleKey,
}
