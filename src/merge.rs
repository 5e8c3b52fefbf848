use crate::change::{MembershipDiff, ReachabilityChange};
use crate::lattice;
use crate::membership::Membership;

impl Membership {
    /// Folds a membership received from a peer into this one.
    ///
    /// Per incarnation the result is the lattice join of both sides: the more
    /// advanced status wins, reachability is taken from `ahead`, and an
    /// up-number is only filled in when missing locally. Incarnations unknown
    /// locally are learned; an alive incarnation learned for a known physical
    /// node replaces the local one. Incarnations that `ahead` does not mention
    /// are left untouched, so absence never means removal here.
    ///
    /// Merging the same `ahead` twice yields an empty diff the second time.
    pub fn merge_forward(&mut self, ahead: &Membership) -> MembershipDiff {
        let mut diff = MembershipDiff::new();

        for remote in ahead.iter() {
            let local = match self.member(&remote.node) {
                Some(local) => local.clone(),
                None => {
                    if let Some(change) = self.insert_incarnation(remote.clone()) {
                        diff.changes.push(change);
                    }
                    continue;
                }
            };

            let joined = lattice::join_member(&local, remote);
            if joined.is_noop() {
                continue;
            }

            // up-number first, so a move to `up` keeps the peer's number
            if let Some(updated) = self.adopt(&remote.node, joined.reachability, joined.up_number) {
                if joined.reachability.is_some() {
                    diff.reachability.push(ReachabilityChange {
                        member: updated.clone(),
                    });
                }
            }

            if let Some(status) = joined.status {
                if let Some(change) = self.transition(&remote.node, status) {
                    diff.changes.push(change);
                }
            }
        }

        diff
    }
}
