//! Join functions over the member state lattice.
//!
//! Each field of a [`Member`] merges with its own rule, so convergence of the
//! gossip merge can be checked one field at a time:
//!
//! - status: maximum under the lifecycle order
//! - reachability: the side that is "ahead" wins
//! - up-number: the first assigned number sticks

use crate::member::{Member, MemberStatus, Reachability};

/// Forward-only transition. `Some(to)` iff `to` is strictly ahead of `from`.
pub fn advance(from: MemberStatus, to: MemberStatus) -> Option<MemberStatus> {
    if to > from {
        Some(to)
    } else {
        None
    }
}

pub fn join_status(local: MemberStatus, ahead: MemberStatus) -> MemberStatus {
    local.max(ahead)
}

pub fn join_reachability(_local: Reachability, ahead: Reachability) -> Reachability {
    ahead
}

pub fn join_up_number(local: Option<u32>, ahead: Option<u32>) -> Option<u32> {
    local.or(ahead)
}

/// Result of joining one incarnation's local state with the ahead state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberJoin {
    pub status: Option<MemberStatus>,
    pub reachability: Option<Reachability>,
    pub up_number: Option<u32>,
}

impl MemberJoin {
    pub fn is_noop(&self) -> bool {
        self.status.is_none() && self.reachability.is_none() && self.up_number.is_none()
    }
}

/// Computes which fields of `local` move when joined with `ahead`.
///
/// Both members must describe the same incarnation. A `None` field means the
/// local value already equals the join.
pub fn join_member(local: &Member, ahead: &Member) -> MemberJoin {
    debug_assert_eq!(local.node, ahead.node);

    let status = join_status(local.status, ahead.status);
    let reachability = join_reachability(local.reachability, ahead.reachability);
    let up_number = join_up_number(local.up_number, ahead.up_number);

    MemberJoin {
        status: (status != local.status).then_some(status),
        reachability: (reachability != local.reachability).then_some(reachability),
        up_number: (up_number != local.up_number).then_some(up_number).flatten(),
    }
}
