//! Authorization gate: "can actor X perform action Y on company C".

use crate::{CoreError, RoleRegistry};
use rollcall_storage::{CompanyId, Store, StoreError, UserId};
use std::sync::Arc;

/// Actions the gate knows how to authorize.
///
/// Each action maps onto one of the catalog permissions carried by role
/// definitions. The split between action and permission mirrors how roles
/// are configured: a role grants coarse capabilities (create, update,
/// delete), while operations name what they are doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompanyAction {
    AddMember,
    UpdateMember,
    RemoveMember,
    CreateInvite,
    RevokeInvite,
    DeleteCompany,
}

impl CompanyAction {
    /// The catalog permission a non-owner role must carry for this action.
    pub fn required_permission(&self) -> &'static str {
        match self {
            CompanyAction::AddMember | CompanyAction::CreateInvite => "create",
            CompanyAction::UpdateMember => "update",
            CompanyAction::RemoveMember
            | CompanyAction::RevokeInvite
            | CompanyAction::DeleteCompany => "delete",
        }
    }
}

impl std::fmt::Display for CompanyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CompanyAction::AddMember => "member:add",
            CompanyAction::UpdateMember => "member:update",
            CompanyAction::RemoveMember => "member:remove",
            CompanyAction::CreateInvite => "invite:create",
            CompanyAction::RevokeInvite => "invite:revoke",
            CompanyAction::DeleteCompany => "company:delete",
        };
        write!(f, "{}", s)
    }
}

/// Boundary contract for authorization decisions.
#[async_trait::async_trait]
pub trait AuthorizationGate: Send + Sync {
    /// Succeeds when `actor` may perform `action` on `company`, otherwise
    /// fails with `Unauthorized`.
    async fn authorize(
        &self,
        actor: &UserId,
        company: &CompanyId,
        action: CompanyAction,
    ) -> Result<(), CoreError>;
}

/// Default gate backed by the store and the role registry.
///
/// The company owner passes every check. Anyone else must hold a membership
/// whose registered role grants the action's required permission. A missing
/// membership or an unregistered role both deny.
pub struct RegistryGate {
    store: Arc<dyn Store>,
    registry: Arc<RoleRegistry>,
}

impl RegistryGate {
    pub fn new(store: Arc<dyn Store>, registry: Arc<RoleRegistry>) -> Self {
        Self { store, registry }
    }
}

#[async_trait::async_trait]
impl AuthorizationGate for RegistryGate {
    async fn authorize(
        &self,
        actor: &UserId,
        company: &CompanyId,
        action: CompanyAction,
    ) -> Result<(), CoreError> {
        let company_row = match self.store.get_company(company).await {
            Ok(c) => c,
            Err(StoreError::NotFound) => return Err(CoreError::CompanyNotFound),
            Err(e) => return Err(e.into()),
        };

        if &company_row.owner_user_id == actor {
            return Ok(());
        }

        let membership = match self.store.get_membership(company, actor).await {
            Ok(m) => m,
            Err(StoreError::NotFound) => return Err(CoreError::Unauthorized),
            Err(e) => return Err(e.into()),
        };

        if self
            .registry
            .role_has_permission(membership.role.as_str(), action.required_permission())
        {
            Ok(())
        } else {
            Err(CoreError::Unauthorized)
        }
    }
}
