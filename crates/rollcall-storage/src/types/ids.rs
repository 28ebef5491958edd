//! Strongly-typed identifiers (avoid mixing strings/UUIDs arbitrarily).

use uuid::Uuid;

/// User identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub Uuid);

/// Company identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompanyId(pub Uuid);

/// Invitation identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InvitationId(pub Uuid);
