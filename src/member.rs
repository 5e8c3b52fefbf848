use crate::change::MembershipChange;
use crate::node::UniqueNode;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Lifecycle status of a member.
///
/// Declaration order is the lattice order: a member only ever moves towards
/// `Removed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Joining,
    Up,
    Leaving,
    Down,
    Removed,
}

impl MemberStatus {
    pub const ALL: [MemberStatus; 5] = [
        MemberStatus::Joining,
        MemberStatus::Up,
        MemberStatus::Leaving,
        MemberStatus::Down,
        MemberStatus::Removed,
    ];

    /// Whether the member is considered gone (`down` or `removed`).
    pub fn is_down(self) -> bool {
        self >= MemberStatus::Down
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberStatus::Joining => write!(f, "joining"),
            MemberStatus::Up => write!(f, "up"),
            MemberStatus::Leaving => write!(f, "leaving"),
            MemberStatus::Down => write!(f, "down"),
            MemberStatus::Removed => write!(f, "removed"),
        }
    }
}

/// Liveness observation, orthogonal to [`MemberStatus`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reachability {
    #[default]
    Reachable,
    Unreachable,
}

impl fmt::Display for Reachability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reachability::Reachable => write!(f, "reachable"),
            Reachability::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// A tracked incarnation inside a membership.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub node: UniqueNode,
    pub status: MemberStatus,
    #[serde(default)]
    pub reachability: Reachability,
    /// Tenure ("age"); assigned once when the member first moves to `up`.
    #[serde(default)]
    pub up_number: Option<u32>,
}

impl Member {
    pub fn new(node: UniqueNode, status: MemberStatus) -> Self {
        Self {
            node,
            status,
            reachability: Reachability::Reachable,
            up_number: None,
        }
    }

    pub fn with_up_number(node: UniqueNode, status: MemberStatus, up_number: u32) -> Self {
        Self {
            up_number: Some(up_number),
            ..Self::new(node, status)
        }
    }

    /// Moves the member to `to` if that is strictly ahead of its current status.
    ///
    /// Up-numbers are not assigned here; that is scoped to a membership, see
    /// [`crate::membership::Membership::mark`].
    pub fn move_forward(&mut self, to: MemberStatus) -> Option<MembershipChange> {
        let from = self.status;
        let next = crate::lattice::advance(from, to)?;
        self.status = next;
        Some(MembershipChange::transition(self.clone(), from))
    }

    /// Returns true if the reachability actually changed.
    pub fn mark_reachability(&mut self, reachability: Reachability) -> bool {
        if self.reachability == reachability {
            return false;
        }
        self.reachability = reachability;
        true
    }

    /// Orders members by tenure: never-up members first, then by ascending up-number.
    pub fn age_ordering(a: &Member, b: &Member) -> Ordering {
        a.up_number.cmp(&b.up_number)
    }

    pub fn is_reachable(&self) -> bool {
        self.reachability == Reachability::Reachable
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Member({}, status: {}, reachability: {}", self.node, self.status, self.reachability)?;
        if let Some(n) = self.up_number {
            write!(f, ", upNumber: {}", n)?;
        }
        write!(f, ")")
    }
}
