//! Membership types (the user × company × role association).

use chrono::{DateTime, Utc};

use super::{CompanyId, RoleKey, UserId};

/// Membership record
#[derive(Clone, Debug)]
pub struct Membership {
    pub company_id: CompanyId,
    pub user_id: UserId,
    pub role: RoleKey,
    pub invited_by: Option<UserId>,
    pub joined_at: DateTime<Utc>,
}

/// Parameters for adding a member to a company
#[derive(Clone, Debug)]
pub struct AddMembershipParams {
    pub company_id: CompanyId,
    pub user_id: UserId,
    pub role: RoleKey,
    pub invited_by: Option<UserId>,
}
