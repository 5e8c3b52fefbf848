use crate::member::{Member, MemberStatus, Reachability};
use crate::node::UniqueNode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A status change of a single member.
///
/// `member` is the state after the change. `from_status` is `None` when the
/// member was previously unknown, or when it replaces an older incarnation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipChange {
    pub member: Member,
    pub from_status: Option<MemberStatus>,
    pub to_status: MemberStatus,
    /// Older incarnation of the same physical node this change superseded,
    /// as it is after the replacement (at `down`).
    pub replaced: Option<Member>,
}

impl MembershipChange {
    /// Change that introduces `member` at its current status.
    pub fn new(member: Member) -> Self {
        let to_status = member.status;
        Self {
            member,
            from_status: None,
            to_status,
            replaced: None,
        }
    }

    /// Change of `member` (already at its new status) coming from `from`.
    pub fn transition(member: Member, from: MemberStatus) -> Self {
        let to_status = member.status;
        Self {
            member,
            from_status: Some(from),
            to_status,
            replaced: None,
        }
    }

    /// Change introducing `by` in place of the older incarnation `replaced`.
    pub fn replacement(replaced: Member, by: Member) -> Self {
        let to_status = by.status;
        Self {
            member: by,
            from_status: None,
            to_status,
            replaced: Some(replaced),
        }
    }

    pub fn node(&self) -> &UniqueNode {
        &self.member.node
    }

    pub fn is_replacement(&self) -> bool {
        self.replaced.is_some()
    }

    pub fn is_up(&self) -> bool {
        self.to_status == MemberStatus::Up
    }

    pub fn is_down(&self) -> bool {
        self.to_status == MemberStatus::Down
    }

    pub fn is_removal(&self) -> bool {
        self.to_status == MemberStatus::Removed
    }
}

impl fmt::Display for MembershipChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MembershipChange(node: {}", self.member.node)?;
        if let Some(replaced) = &self.replaced {
            write!(f, ", replaced: {}", replaced.node)?;
        }
        match self.from_status {
            Some(from) => write!(f, ", fromStatus: {}", from)?,
            None => write!(f, ", fromStatus: unknown")?,
        }
        write!(f, ", toStatus: {})", self.to_status)
    }
}

/// Reachability flip of a known member; `member` carries the new value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReachabilityChange {
    pub member: Member,
}

impl ReachabilityChange {
    pub fn reachability(&self) -> Reachability {
        self.member.reachability
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadershipChange {
    pub old_leader: Option<Member>,
    pub new_leader: Option<Member>,
}

impl LeadershipChange {
    pub fn new(old_leader: Option<Member>, new_leader: Option<Member>) -> Self {
        Self { old_leader, new_leader }
    }
}

/// Ordered set of changes between two memberships.
///
/// `reachability` is only filled by merges; snapshot diffs compare status alone.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipDiff {
    pub changes: Vec<MembershipChange>,
    pub reachability: Vec<ReachabilityChange>,
}

impl MembershipDiff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.reachability.is_empty()
    }

    /// Number of status changes.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn replacements(&self) -> impl Iterator<Item = &MembershipChange> {
        self.changes.iter().filter(|c| c.is_replacement())
    }
}
