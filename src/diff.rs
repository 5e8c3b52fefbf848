use crate::change::{MembershipChange, MembershipDiff};
use crate::member::MemberStatus;
use crate::membership::Membership;

impl Membership {
    /// Status differences between two snapshots, one entry per incarnation.
    ///
    /// An incarnation missing from `to` is reported as moved to `removed`.
    /// Reachability is not compared.
    pub fn diff(from: &Membership, to: &Membership) -> MembershipDiff {
        let mut diff = MembershipDiff::new();

        for member in to.iter() {
            match from.member(&member.node) {
                None => diff.changes.push(MembershipChange::new(member.clone())),
                Some(previous) if previous.status != member.status => diff
                    .changes
                    .push(MembershipChange::transition(member.clone(), previous.status)),
                Some(_) => {}
            }
        }

        for member in from.iter().filter(|m| !to.contains(&m.node)) {
            let mut removed = member.clone();
            removed.status = MemberStatus::Removed;
            diff.changes
                .push(MembershipChange::transition(removed, member.status));
        }

        diff
    }
}
