use crate::member::Member;
use thiserror::Error;

/// Errors reported by the membership core.
///
/// Stale or backward transitions are not errors; they come back as `None` or
/// as an empty diff.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MembershipError {
    /// Leadership was assigned to a member the membership does not track.
    #[error("nonMemberLeaderSelected: {candidate} is not a member of the cluster")]
    NonMemberLeaderSelected {
        candidate: Member,
    },
    #[error("invalid membership configuration: {0}")]
    InvalidConfiguration(String),
}
