//! Membership mutation operations.
//!
//! Every operation follows the same pipeline: authorize against the gate,
//! validate against the role registry, perform one atomic store mutation,
//! then publish a best-effort event and audit record. Events and audit
//! entries never roll back the mutation.

use chrono::{Duration, Utc};
use rand::distr::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, warn};

use rollcall_audit::{AuditAction, AuditEvent, AuditLog};
use rollcall_config::ServiceConfig;
use rollcall_events::{EventBus, MembershipEvent, MembershipEventKind};
use rollcall_storage::{
    AddMembershipParams, CompanyId, CreateCompanyParams, CreateInvitationParams, CreateUserParams,
    Invitation, InvitationId, Membership, RoleKey, Store, StoreError, UserId,
};

use crate::{AuthorizationGate, CompanyAction, CoreError, HasCompanies, RoleRegistry, OWNER_ROLE};

const INVITE_TOKEN_LEN: usize = 32;
const DEFAULT_INVITE_EXPIRY_HOURS: i64 = 72;

/// A freshly created invitation together with its plaintext token.
///
/// The token is shown exactly once; only its SHA-256 digest is persisted.
#[derive(Debug)]
pub struct InviteOutcome {
    pub invitation: Invitation,
    pub token: String,
}

/// The membership service: all company membership mutations go through here.
pub struct CompanyService {
    store: Arc<dyn Store>,
    events: Arc<dyn EventBus>,
    registry: Arc<RoleRegistry>,
    gate: Arc<dyn AuthorizationGate>,
    audit: Arc<dyn AuditLog>,
    invite_expiry: Duration,
}

impl CompanyService {
    pub fn new(
        store: Arc<dyn Store>,
        events: Arc<dyn EventBus>,
        registry: Arc<RoleRegistry>,
        gate: Arc<dyn AuthorizationGate>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            store,
            events,
            registry,
            gate,
            audit,
            invite_expiry: Duration::hours(DEFAULT_INVITE_EXPIRY_HOURS),
        }
    }

    pub fn with_invite_expiry_hours(mut self, hours: u32) -> Self {
        self.invite_expiry = Duration::hours(i64::from(hours));
        self
    }

    /// Apply the tunable knobs from service configuration.
    pub fn with_config(self, config: &ServiceConfig) -> Self {
        self.with_invite_expiry_hours(config.invite_expiry_hours)
    }

    pub fn registry(&self) -> &RoleRegistry {
        &self.registry
    }

    // ───────────────────────────── Users ──────────────────────────────────

    /// Register a new user.
    pub async fn register_user(&self, name: &str, email: &str) -> Result<UserId, CoreError> {
        let email = normalize_email(email)?;
        let user_id = self
            .store
            .create_user(&CreateUserParams {
                name: name.to_string(),
                email: email.clone(),
            })
            .await?;

        info!(user = %user_id.0, "registered user");
        self.record_audit(
            AuditEvent::builder(&user_id, AuditAction::UserRegister)
                .resource("user", email)
                .build(),
        )
        .await;
        Ok(user_id)
    }

    // ─────────────────────────── Companies ────────────────────────────────

    /// Create a company owned by `actor`.
    ///
    /// The owner's membership row is written in the same transaction, so the
    /// "every company has at least one member" invariant holds from the
    /// first observable moment.
    pub async fn create_company(
        &self,
        actor: &UserId,
        name: &str,
    ) -> Result<CompanyId, CoreError> {
        self.store
            .get_user_by_id(actor)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => CoreError::UserNotFound,
                other => other.into(),
            })?;

        let company_id = self
            .store
            .create_company(&CreateCompanyParams {
                name: name.to_string(),
                owner_user_id: actor.clone(),
                owner_role: RoleKey::from(OWNER_ROLE),
            })
            .await?;

        info!(company = %company_id.0, owner = %actor.0, "created company");
        self.record_audit(
            AuditEvent::builder(actor, AuditAction::CompanyCreate)
                .resource("company", company_id.0.to_string())
                .company_id(Some(&company_id))
                .build(),
        )
        .await;
        Ok(company_id)
    }

    /// Delete a company along with its memberships and pending invitations.
    pub async fn delete_company(
        &self,
        actor: &UserId,
        company_id: &CompanyId,
    ) -> Result<(), CoreError> {
        self.gate
            .authorize(actor, company_id, CompanyAction::DeleteCompany)
            .await?;

        self.store
            .delete_company(company_id)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => CoreError::CompanyNotFound,
                other => other.into(),
            })?;

        info!(company = %company_id.0, actor = %actor.0, "deleted company");
        self.record_audit(
            AuditEvent::builder(actor, AuditAction::CompanyDelete)
                .resource("company", company_id.0.to_string())
                .company_id(Some(company_id))
                .build(),
        )
        .await;
        Ok(())
    }

    // ────────────────────────── Memberships ───────────────────────────────

    /// Change an existing member's role.
    ///
    /// Idempotent: re-applying the current role succeeds and emits the
    /// update event again. The owner's role is never touched here.
    pub async fn update_role(
        &self,
        actor: &UserId,
        company_id: &CompanyId,
        member: &UserId,
        role_key: &str,
    ) -> Result<(), CoreError> {
        let company = self.get_company(company_id).await?;
        self.gate
            .authorize(actor, company_id, CompanyAction::UpdateMember)
            .await?;

        let role = self.require_role(role_key)?;
        if member == &company.owner_user_id {
            return Err(CoreError::CannotUpdateOwner);
        }

        let existing = self
            .store
            .get_membership(company_id, member)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => CoreError::MembershipNotFound,
                other => other.into(),
            })?;

        self.store
            .update_membership_role(company_id, member, &role.key)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => CoreError::MembershipNotFound,
                other => other.into(),
            })?;

        info!(
            company = %company_id.0,
            member = %member.0,
            role = role_key,
            "updated membership role"
        );
        self.emit(
            company_id,
            MembershipEventKind::MemberUpdated,
            Some(member),
            Some(role_key),
        )
        .await;
        self.record_audit(
            AuditEvent::builder(actor, AuditAction::MemberUpdateRole)
                .resource("membership", member.0.to_string())
                .company_id(Some(company_id))
                .details(serde_json::json!({
                    "old_role": existing.role.as_str(),
                    "new_role": role_key,
                }))
                .build(),
        )
        .await;
        Ok(())
    }

    /// Add a registered user to a company directly, without an invitation.
    pub async fn add_member(
        &self,
        actor: &UserId,
        company_id: &CompanyId,
        email: &str,
        role_key: &str,
    ) -> Result<UserId, CoreError> {
        self.gate
            .authorize(actor, company_id, CompanyAction::AddMember)
            .await?;
        let role = self.require_role(role_key)?;
        let email = normalize_email(email)?;

        let user = self
            .store
            .get_user_by_email(&email)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => CoreError::UserNotFound,
                other => other.into(),
            })?;

        self.store
            .add_membership(&AddMembershipParams {
                company_id: company_id.clone(),
                user_id: user.id.clone(),
                role: role.key.clone(),
                invited_by: Some(actor.clone()),
            })
            .await
            .map_err(|e| match e {
                StoreError::AlreadyExists => CoreError::AlreadyMember,
                other => other.into(),
            })?;

        info!(company = %company_id.0, member = %user.id.0, role = role_key, "added member");
        self.emit(
            company_id,
            MembershipEventKind::MemberAdded,
            Some(&user.id),
            Some(role_key),
        )
        .await;
        self.record_audit(
            AuditEvent::builder(actor, AuditAction::MemberAdd)
                .resource("membership", user.id.0.to_string())
                .company_id(Some(company_id))
                .details(serde_json::json!({ "role": role_key }))
                .build(),
        )
        .await;
        Ok(user.id)
    }

    /// Remove a member from a company.
    ///
    /// The owner can never be removed, regardless of who asks. Members may
    /// remove themselves without holding any permission; removing anyone
    /// else requires authorization.
    pub async fn remove_member(
        &self,
        actor: &UserId,
        company_id: &CompanyId,
        member: &UserId,
    ) -> Result<(), CoreError> {
        let company = self.get_company(company_id).await?;
        if member == &company.owner_user_id {
            return Err(CoreError::CannotRemoveOwner);
        }

        let leaving = actor == member;
        if !leaving {
            self.gate
                .authorize(actor, company_id, CompanyAction::RemoveMember)
                .await?;
        }

        self.store
            .remove_membership(company_id, member)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => CoreError::MembershipNotFound,
                other => other.into(),
            })?;

        info!(company = %company_id.0, member = %member.0, leaving, "removed member");
        self.emit(
            company_id,
            MembershipEventKind::MemberRemoved,
            Some(member),
            None,
        )
        .await;
        let action = if leaving {
            AuditAction::MemberLeave
        } else {
            AuditAction::MemberRemove
        };
        self.record_audit(
            AuditEvent::builder(actor, action)
                .resource("membership", member.0.to_string())
                .company_id(Some(company_id))
                .build(),
        )
        .await;
        Ok(())
    }

    // ────────────────────────── Invitations ───────────────────────────────

    /// Invite an email address to join a company at a given role.
    ///
    /// At most one invitation may be pending per (company, email) pair;
    /// a lapsed invitation does not count as pending.
    pub async fn invite(
        &self,
        actor: &UserId,
        company_id: &CompanyId,
        email: &str,
        role_key: &str,
    ) -> Result<InviteOutcome, CoreError> {
        self.gate
            .authorize(actor, company_id, CompanyAction::CreateInvite)
            .await?;
        let role = self.require_role(role_key)?;
        let email = normalize_email(email)?;

        // The address may already belong to a member.
        if let Ok(user) = self.store.get_user_by_email(&email).await {
            if self.store.get_membership(company_id, &user.id).await.is_ok() {
                return Err(CoreError::AlreadyMember);
            }
        }

        let token = generate_token();
        let invitation = self
            .store
            .create_invitation(&CreateInvitationParams {
                company_id: company_id.clone(),
                email: email.clone(),
                role: role.key.clone(),
                token_hash: hash_token(&token),
                invited_by: actor.clone(),
                expires_at: Utc::now() + self.invite_expiry,
            })
            .await
            .map_err(|e| match e {
                StoreError::AlreadyExists => CoreError::DuplicateInvitation,
                other => other.into(),
            })?;

        info!(company = %company_id.0, email = %email, role = role_key, "created invitation");
        self.emit(
            company_id,
            MembershipEventKind::InvitationCreated,
            None,
            Some(role_key),
        )
        .await;
        self.record_audit(
            AuditEvent::builder(actor, AuditAction::InviteCreate)
                .resource("invitation", email)
                .company_id(Some(company_id))
                .details(serde_json::json!({ "role": role_key }))
                .build(),
        )
        .await;
        Ok(InviteOutcome { invitation, token })
    }

    /// Accept an invitation by its plaintext token.
    ///
    /// The invitation must match the accepting user's email and must not
    /// have lapsed. Acceptance converts it into a membership and consumes
    /// it in one transaction, so a token is usable at most once.
    pub async fn accept_invitation<U: HasCompanies + Sync>(
        &self,
        user: &U,
        token: &str,
    ) -> Result<Membership, CoreError> {
        let invitation = self
            .store
            .get_invitation_by_token(&hash_token(token))
            .await
            .map_err(|e| match e {
                StoreError::NotFound => CoreError::InvitationNotFound,
                other => other.into(),
            })?;

        if invitation.expires_at < Utc::now() {
            // Lapsed invitations are treated as absent; drop the stale row.
            let _ = self.store.delete_invitation(&invitation.id).await;
            return Err(CoreError::InvitationNotFound);
        }

        let user_id = user.company_user_id();
        if !invitation.email.eq_ignore_ascii_case(user.company_email()) {
            return Err(CoreError::InvitationEmailMismatch);
        }

        let membership = self
            .store
            .accept_invitation(&invitation.id, &user_id)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => CoreError::InvitationNotFound,
                StoreError::AlreadyExists => CoreError::AlreadyMember,
                other => other.into(),
            })?;

        info!(
            company = %invitation.company_id.0,
            member = %user_id.0,
            role = invitation.role.as_str(),
            "accepted invitation"
        );
        self.emit(
            &invitation.company_id,
            MembershipEventKind::MemberAdded,
            Some(&user_id),
            Some(invitation.role.as_str()),
        )
        .await;
        self.record_audit(
            AuditEvent::builder(&user_id, AuditAction::InviteAccept)
                .resource("invitation", invitation.email.clone())
                .company_id(Some(&invitation.company_id))
                .build(),
        )
        .await;
        Ok(membership)
    }

    /// Revoke a pending invitation.
    pub async fn cancel_invitation(
        &self,
        actor: &UserId,
        invitation_id: &InvitationId,
    ) -> Result<(), CoreError> {
        let invitation = self
            .store
            .get_invitation(invitation_id)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => CoreError::InvitationNotFound,
                other => other.into(),
            })?;

        self.gate
            .authorize(actor, &invitation.company_id, CompanyAction::RevokeInvite)
            .await?;

        self.store
            .delete_invitation(invitation_id)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => CoreError::InvitationNotFound,
                other => other.into(),
            })?;

        info!(company = %invitation.company_id.0, email = %invitation.email, "revoked invitation");
        self.emit(
            &invitation.company_id,
            MembershipEventKind::InvitationRevoked,
            None,
            None,
        )
        .await;
        self.record_audit(
            AuditEvent::builder(actor, AuditAction::InviteRevoke)
                .resource("invitation", invitation.email.clone())
                .company_id(Some(&invitation.company_id))
                .build(),
        )
        .await;
        Ok(())
    }

    // ─────────────────────────── Internals ────────────────────────────────

    async fn get_company(
        &self,
        company_id: &CompanyId,
    ) -> Result<rollcall_storage::Company, CoreError> {
        self.store
            .get_company(company_id)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => CoreError::CompanyNotFound,
                other => other.into(),
            })
    }

    fn require_role(&self, key: &str) -> Result<&crate::Role, CoreError> {
        if key.trim().is_empty() {
            return Err(CoreError::InvalidRole(key.to_string()));
        }
        self.registry
            .find(key)
            .ok_or_else(|| CoreError::InvalidRole(key.to_string()))
    }

    async fn emit(
        &self,
        company_id: &CompanyId,
        kind: MembershipEventKind,
        user: Option<&UserId>,
        role: Option<&str>,
    ) {
        let event = MembershipEvent {
            kind,
            company_id: company_id.0,
            user_id: user.map(|u| u.0),
            role: role.map(str::to_string),
            timestamp: Utc::now().timestamp(),
        };
        if let Err(e) = self.events.publish(company_id, event).await {
            warn!(company = %company_id.0, error = %e, "failed to publish membership event");
        }
    }

    async fn record_audit(&self, event: AuditEvent) {
        if let Err(e) = self.audit.record(event).await {
            warn!(error = %e, "failed to record audit event");
        }
    }
}

fn normalize_email(email: &str) -> Result<String, CoreError> {
    let email = email.trim().to_ascii_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(CoreError::InvalidEmail(email));
    }
    Ok(email)
}

fn generate_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(INVITE_TOKEN_LEN)
        .map(char::from)
        .collect()
}

fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}
