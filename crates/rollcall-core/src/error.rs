use rollcall_storage::StoreError;
use thiserror::Error;

/// Errors raised by membership operations.
///
/// All variants are deterministic given input state: nothing here is
/// transient, so callers never retry.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not authorized to perform this action")]
    Unauthorized,

    #[error("unknown role: {0}")]
    InvalidRole(String),

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("membership not found")]
    MembershipNotFound,

    #[error("invitation not found")]
    InvitationNotFound,

    #[error("an invitation for this email is already pending")]
    DuplicateInvitation,

    #[error("user is already a member of this company")]
    AlreadyMember,

    #[error("the company owner cannot be removed")]
    CannotRemoveOwner,

    #[error("the company owner's role cannot be changed")]
    CannotUpdateOwner,

    #[error("invitation was issued for a different email address")]
    InvitationEmailMismatch,

    #[error("user not found")]
    UserNotFound,

    #[error("company not found")]
    CompanyNotFound,

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
