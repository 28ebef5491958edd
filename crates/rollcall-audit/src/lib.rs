//! Audit logging abstraction for rollcall.
//!
//! This crate defines the `AuditLog` trait for persisting audit events
//! and the types representing auditable membership actions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;
use rollcall_storage::{CompanyId, UserId};

/// Unique identifier for an audit log entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditLogId(pub Uuid);

impl AuditLogId {
    /// Generate a new audit log ID using UUID v7 (time-ordered)
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for AuditLogId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AuditLogId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for AuditLogId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Categories of auditable actions
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    // User operations
    UserRegister,

    // Company operations
    CompanyCreate,
    CompanyDelete,

    // Member operations
    MemberAdd,
    MemberUpdateRole,
    MemberRemove,
    MemberLeave,

    // Invitation operations
    InviteCreate,
    InviteAccept,
    InviteRevoke,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditAction::UserRegister => "user.register",
            AuditAction::CompanyCreate => "company.create",
            AuditAction::CompanyDelete => "company.delete",
            AuditAction::MemberAdd => "member.add",
            AuditAction::MemberUpdateRole => "member.update_role",
            AuditAction::MemberRemove => "member.remove",
            AuditAction::MemberLeave => "member.leave",
            AuditAction::InviteCreate => "invite.create",
            AuditAction::InviteAccept => "invite.accept",
            AuditAction::InviteRevoke => "invite.revoke",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user.register" => Ok(AuditAction::UserRegister),
            "company.create" => Ok(AuditAction::CompanyCreate),
            "company.delete" => Ok(AuditAction::CompanyDelete),
            "member.add" => Ok(AuditAction::MemberAdd),
            "member.update_role" => Ok(AuditAction::MemberUpdateRole),
            "member.remove" => Ok(AuditAction::MemberRemove),
            "member.leave" => Ok(AuditAction::MemberLeave),
            "invite.create" => Ok(AuditAction::InviteCreate),
            "invite.accept" => Ok(AuditAction::InviteAccept),
            "invite.revoke" => Ok(AuditAction::InviteRevoke),
            _ => Err(format!("Unknown audit action: {}", s)),
        }
    }
}

/// Result of an audited operation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditResult {
    Success,
    PermissionDenied,
    NotFound,
    InvalidRequest,
    Error,
}

impl std::fmt::Display for AuditResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditResult::Success => "success",
            AuditResult::PermissionDenied => "permission_denied",
            AuditResult::NotFound => "not_found",
            AuditResult::InvalidRequest => "invalid_request",
            AuditResult::Error => "error",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for AuditResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(AuditResult::Success),
            "permission_denied" => Ok(AuditResult::PermissionDenied),
            "not_found" => Ok(AuditResult::NotFound),
            "invalid_request" => Ok(AuditResult::InvalidRequest),
            "error" => Ok(AuditResult::Error),
            _ => Err(format!("Unknown audit result: {}", s)),
        }
    }
}

/// An audit log entry representing a single auditable action.
///
/// Uses raw UUIDs for serialization compatibility. Use the builder
/// to construct events from typed IDs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique identifier for this audit entry
    pub id: AuditLogId,
    /// When the action occurred
    pub timestamp: DateTime<Utc>,
    /// User that performed the action (UUID)
    pub actor_user_id: Uuid,
    /// The action that was performed
    pub action: AuditAction,
    /// Type of resource affected (e.g., "membership", "invitation", "company")
    pub resource_type: String,
    /// Identifier of the affected resource
    pub resource_id: String,
    /// Company context (if applicable)
    pub company_id: Option<Uuid>,
    /// Result of the operation
    pub result: AuditResult,
    /// Error message or additional context
    pub reason: Option<String>,
    /// Additional details as JSON (e.g., old/new role)
    pub details: Option<serde_json::Value>,
}

impl AuditEvent {
    /// Create a new audit event builder
    pub fn builder(actor_user_id: &UserId, action: AuditAction) -> AuditEventBuilder {
        AuditEventBuilder::new(actor_user_id, action)
    }

    /// Get the actor's user ID as a typed ID
    pub fn get_actor_user_id(&self) -> UserId {
        UserId(self.actor_user_id)
    }

    /// Get the company ID as a typed ID (if present)
    pub fn get_company_id(&self) -> Option<CompanyId> {
        self.company_id.map(CompanyId)
    }
}

/// Builder for constructing audit events
pub struct AuditEventBuilder {
    actor_user_id: Uuid,
    action: AuditAction,
    resource_type: String,
    resource_id: String,
    company_id: Option<Uuid>,
    result: AuditResult,
    reason: Option<String>,
    details: Option<serde_json::Value>,
}

impl AuditEventBuilder {
    pub fn new(actor_user_id: &UserId, action: AuditAction) -> Self {
        Self {
            actor_user_id: actor_user_id.0,
            action,
            resource_type: String::new(),
            resource_id: String::new(),
            company_id: None,
            result: AuditResult::Success,
            reason: None,
            details: None,
        }
    }

    pub fn resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = resource_type.into();
        self.resource_id = resource_id.into();
        self
    }

    pub fn company_id(mut self, company_id: Option<&CompanyId>) -> Self {
        self.company_id = company_id.map(|c| c.0);
        self
    }

    pub fn result(mut self, result: AuditResult) -> Self {
        self.result = result;
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn build(self) -> AuditEvent {
        AuditEvent {
            id: AuditLogId::new(),
            timestamp: Utc::now(),
            actor_user_id: self.actor_user_id,
            action: self.action,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            company_id: self.company_id,
            result: self.result,
            reason: self.reason,
            details: self.details,
        }
    }
}

/// Filter for querying audit logs
#[derive(Clone, Debug, Default)]
pub struct AuditLogFilter {
    /// Filter by acting user
    pub actor_user_id: Option<UserId>,
    /// Filter by company
    pub company_id: Option<CompanyId>,
    /// Filter by action
    pub action: Option<AuditAction>,
    /// Filter by result
    pub result: Option<AuditResult>,
    /// Filter by start timestamp (inclusive)
    pub from: Option<DateTime<Utc>>,
    /// Filter by end timestamp (exclusive)
    pub to: Option<DateTime<Utc>>,
    /// Maximum number of results to return
    pub limit: Option<u32>,
    /// Number of results to skip (for pagination)
    pub offset: Option<u32>,
}

impl AuditLogFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actor_user_id(mut self, actor_user_id: UserId) -> Self {
        self.actor_user_id = Some(actor_user_id);
        self
    }

    pub fn company_id(mut self, company_id: CompanyId) -> Self {
        self.company_id = Some(company_id);
        self
    }

    pub fn action(mut self, action: AuditAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn result(mut self, result: AuditResult) -> Self {
        self.result = Some(result);
        self
    }

    pub fn from(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    pub fn to(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(actor) = &self.actor_user_id {
            if event.actor_user_id != actor.0 {
                return false;
            }
        }
        if let Some(company) = &self.company_id {
            if event.company_id != Some(company.0) {
                return false;
            }
        }
        if let Some(action) = &self.action {
            if &event.action != action {
                return false;
            }
        }
        if let Some(result) = &self.result {
            if &event.result != result {
                return false;
            }
        }
        if let Some(from) = &self.from {
            if event.timestamp < *from {
                return false;
            }
        }
        if let Some(to) = &self.to {
            if event.timestamp >= *to {
                return false;
            }
        }
        true
    }
}

/// Error type for audit log operations
#[derive(Debug, Error)]
pub enum AuditLogError {
    #[error("database error: {0}")]
    Database(String),

    #[error("audit log not found: {0}")]
    NotFound(AuditLogId),

    #[error("invalid filter: {0}")]
    InvalidFilter(String),
}

/// Trait for audit log persistence.
///
/// Implementations store audit events and provide query capabilities
/// for compliance and security monitoring.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Record an audit event.
    ///
    /// This should be called after each auditable operation completes.
    /// Failures to record audit events should be logged but should not
    /// fail the main operation.
    async fn record(&self, event: AuditEvent) -> Result<(), AuditLogError>;

    /// Query audit logs with optional filters.
    ///
    /// Returns events matching the filter criteria, ordered by timestamp descending.
    async fn query(&self, filter: AuditLogFilter) -> Result<Vec<AuditEvent>, AuditLogError>;

    /// Get a specific audit log entry by ID.
    async fn get(&self, id: AuditLogId) -> Result<AuditEvent, AuditLogError>;

    /// Count audit logs matching the filter criteria.
    async fn count(&self, filter: AuditLogFilter) -> Result<u64, AuditLogError>;
}

/// In-memory audit log for single-process deployments and tests.
///
/// Entries live only as long as the process does.
pub struct MemoryAuditLog {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<AuditEvent>>, AuditLogError> {
        self.events
            .lock()
            .map_err(|e| AuditLogError::Database(e.to_string()))
    }
}

impl Default for MemoryAuditLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditLogError> {
        self.lock()?.push(event);
        Ok(())
    }

    async fn query(&self, filter: AuditLogFilter) -> Result<Vec<AuditEvent>, AuditLogError> {
        let events = self.lock()?;
        let mut matched: Vec<AuditEvent> = events
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let offset = filter.offset.unwrap_or(0) as usize;
        let matched: Vec<AuditEvent> = matched.into_iter().skip(offset).collect();
        match filter.limit {
            Some(limit) => Ok(matched.into_iter().take(limit as usize).collect()),
            None => Ok(matched),
        }
    }

    async fn get(&self, id: AuditLogId) -> Result<AuditEvent, AuditLogError> {
        self.lock()?
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or(AuditLogError::NotFound(id))
    }

    async fn count(&self, filter: AuditLogFilter) -> Result<u64, AuditLogError> {
        Ok(self.lock()?.iter().filter(|e| filter.matches(e)).count() as u64)
    }
}
