//! Membership change notifications.
//!
//! Every mutation the membership service commits (member added, role
//! changed, member removed, invitation created or revoked) is announced on
//! an [`EventBus`] so watchers can react without polling the store. The bus
//! is a best-effort side channel published after the commit: the service
//! never awaits subscriber completion and a publish failure never rolls
//! back the mutation. Consumers that need a complete history should read
//! the audit log instead.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use thiserror::Error;
use uuid::Uuid;
use rollcall_storage::CompanyId;

/// Kind of membership change event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MembershipEventKind {
    MemberAdded,
    MemberUpdated,
    MemberRemoved,
    InvitationCreated,
    InvitationRevoked,
}

/// Event representing a change to a company's membership
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MembershipEvent {
    pub kind: MembershipEventKind,
    pub company_id: Uuid,
    /// Affected member, when the event concerns an existing user.
    pub user_id: Option<Uuid>,
    /// Role carried by the membership or invitation after the change.
    pub role: Option<String>,
    pub timestamp: i64,
}

/// Error type for event bus operations
#[derive(Debug, Error)]
pub enum EventBusError {
    #[error("backend error: {0}")]
    Backend(String),
}

/// Stream of membership change events
pub type EventStream = Pin<Box<dyn Stream<Item = MembershipEvent> + Send>>;

/// Publish/subscribe seam between the membership service and its watchers.
///
/// Events are scoped per company: a subscriber sees only the changes of
/// the company it subscribed to, and delivery starts at subscription time
/// (no replay of earlier events).
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Announce a committed membership or invitation change to all active
    /// subscribers of `company_id`.
    async fn publish(
        &self,
        company_id: &CompanyId,
        event: MembershipEvent,
    ) -> Result<(), EventBusError>;

    /// Open a stream of membership changes for one company.
    ///
    /// The stream yields until dropped.
    async fn subscribe(&self, company_id: &CompanyId) -> Result<EventStream, EventBusError>;
}
