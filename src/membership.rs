use crate::change::{LeadershipChange, MembershipChange};
use crate::config::RetentionPolicy;
use crate::error::MembershipError;
use crate::member::{Member, MemberStatus, Reachability};
use crate::node::{Node, UniqueNode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

// Upper bound on remembered pruned incarnations.
const MAX_PRUNED_TOMBSTONES: usize = 1024;

/// The set of all members known to this node.
///
/// Members are keyed by incarnation and additionally indexed by physical node,
/// so that a restarted process can be told apart from the one it replaces.
/// Replaced incarnations are kept (at `down` or beyond) until they are pruned
/// explicitly with [`Membership::remove_completely`] or
/// [`Membership::prune_history`].
///
/// All operations are synchronous and assume exclusive access; callers that
/// share a membership between tasks serialize access themselves.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(from = "MembershipSnapshot", into = "MembershipSnapshot")]
pub struct Membership {
    members: BTreeMap<UniqueNode, Member>,
    // oldest incarnation first
    incarnations: BTreeMap<Node, Vec<UniqueNode>>,
    leader: Option<UniqueNode>,
    highest_up_number: u32,
    // incarnations dropped by prune_history, so gossip cannot bring them back
    pruned: VecDeque<UniqueNode>,
}

impl Membership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    pub fn contains(&self, node: &UniqueNode) -> bool {
        self.members.contains_key(node)
    }

    // Lookups

    pub fn member(&self, node: &UniqueNode) -> Option<&Member> {
        self.members.get(node)
    }

    /// All incarnations known for a physical node, newest first.
    pub fn members_of(&self, node: &Node) -> Vec<&Member> {
        self.incarnations
            .get(node)
            .map(|ids| {
                ids.iter()
                    .rev()
                    .filter_map(|id| self.members.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The most authoritative incarnation of a physical node.
    ///
    /// Prefers the newest incarnation that is not yet down, then the newest one
    /// that is not removed, then simply the newest.
    pub fn first_member(&self, node: &Node) -> Option<&Member> {
        let incarnations = self.members_of(node);
        incarnations
            .iter()
            .find(|m| !m.status.is_down())
            .or_else(|| incarnations.iter().find(|m| m.status != MemberStatus::Removed))
            .or_else(|| incarnations.first())
            .copied()
    }

    pub fn members_at_least(
        &self,
        status: MemberStatus,
        reachability: Option<Reachability>,
    ) -> Vec<&Member> {
        self.members
            .values()
            .filter(|m| m.status >= status)
            .filter(|m| reachability.map_or(true, |r| m.reachability == r))
            .collect()
    }

    pub fn members_with_status(
        &self,
        status: MemberStatus,
        reachability: Option<Reachability>,
    ) -> Vec<&Member> {
        self.members
            .values()
            .filter(|m| m.status == status)
            .filter(|m| reachability.map_or(true, |r| m.reachability == r))
            .collect()
    }

    pub fn count_at_least(&self, status: MemberStatus) -> usize {
        self.members.values().filter(|m| m.status >= status).count()
    }

    pub fn count_with_status(&self, status: MemberStatus) -> usize {
        self.members.values().filter(|m| m.status == status).count()
    }

    // Mutations

    /// Adds `node` as a joining member.
    ///
    /// A different incarnation of an already known physical node replaces it:
    /// the old incarnation is forced to `down` and kept. Joining an incarnation
    /// that is already known is a no-op.
    pub fn join(&mut self, node: UniqueNode) -> Option<MembershipChange> {
        self.apply(&MembershipChange::new(Member::new(node, MemberStatus::Joining)))
    }

    pub fn joining(&self, node: UniqueNode) -> Membership {
        let mut copy = self.clone();
        let _ = copy.join(node);
        copy
    }

    /// Applies the intent described by `change`: move its member to `to_status`.
    ///
    /// Unknown incarnations are inserted (possibly replacing an older incarnation
    /// of the same node), known ones only ever move forward.
    pub fn apply(&mut self, change: &MembershipChange) -> Option<MembershipChange> {
        let target = &change.member;
        if self.members.contains_key(&target.node) {
            return self.transition(&target.node, change.to_status);
        }

        let mut member = target.clone();
        member.status = change.to_status;
        self.insert_incarnation(member)
    }

    /// Moves `node` to `status`.
    ///
    /// Returns `None` when no member exists for the physical node or when the
    /// status would not move forward. An unknown incarnation of a known node is
    /// treated as its replacement.
    pub fn mark(&mut self, node: &UniqueNode, status: MemberStatus) -> Option<MembershipChange> {
        if self.members.contains_key(node) {
            return self.transition(node, status);
        }
        self.first_member(&node.node)?;
        self.insert_incarnation(Member::new(node.clone(), status))
    }

    pub fn marking(&self, node: &UniqueNode, status: MemberStatus) -> Membership {
        let mut copy = self.clone();
        let _ = copy.mark(node, status);
        copy
    }

    /// Returns the updated member if its reachability changed.
    pub fn mark_reachability(
        &mut self,
        node: &UniqueNode,
        reachability: Reachability,
    ) -> Option<Member> {
        let member = self.members.get_mut(node)?;
        member.mark_reachability(reachability).then(|| member.clone())
    }

    /// Drops an incarnation, history included. This is the explicit pruning hook;
    /// nothing else in the membership forgets a member.
    pub fn remove_completely(&mut self, node: &UniqueNode) -> Option<Member> {
        let removed = self.members.remove(node)?;
        if let Some(ids) = self.incarnations.get_mut(&node.node) {
            ids.retain(|id| id != node);
            if ids.is_empty() {
                self.incarnations.remove(&node.node);
            }
        }
        if self.leader.as_ref() == Some(node) {
            self.leader = None;
        }
        Some(removed)
    }

    pub fn removing_completely(&self, node: &UniqueNode) -> Membership {
        let mut copy = self.clone();
        let _ = copy.remove_completely(node);
        copy
    }

    /// Bounds the history kept per physical node.
    ///
    /// Only replaced incarnations (down or removed, and not the node's
    /// authoritative incarnation) are candidates; the oldest go first.
    pub fn prune_history(&mut self, policy: &RetentionPolicy) -> Vec<Member> {
        let mut doomed = Vec::new();
        for (node, ids) in &self.incarnations {
            let current = self.first_member(node).map(|m| m.node.clone());
            let history: Vec<&UniqueNode> = ids
                .iter()
                .filter(|id| Some(*id) != current.as_ref())
                .filter(|id| self.members.get(*id).map_or(false, |m| m.status.is_down()))
                .collect();
            let excess = history.len().saturating_sub(policy.max_historical_incarnations);
            doomed.extend(history.into_iter().take(excess).cloned());
        }

        let pruned: Vec<Member> = doomed
            .iter()
            .filter_map(|id| self.remove_completely(id))
            .collect();
        for member in &pruned {
            if self.pruned.len() == MAX_PRUNED_TOMBSTONES {
                self.pruned.pop_front();
            }
            self.pruned.push_back(member.node.clone());
        }
        pruned
    }

    /// Whether `node` was dropped by [`Membership::prune_history`]. Such
    /// incarnations are not learned again.
    pub fn was_pruned(&self, node: &UniqueNode) -> bool {
        self.pruned.contains(node)
    }

    // Leadership

    pub fn leader(&self) -> Option<&Member> {
        self.leader.as_ref().and_then(|id| self.members.get(id))
    }

    pub fn is_leader(&self, node: &UniqueNode) -> bool {
        self.leader.as_ref() == Some(node)
    }

    /// Assigns (or clears, with `None`) the leader.
    ///
    /// The candidate must be a member; the leader is tracked by incarnation so
    /// it always resolves to this membership's own copy of the member.
    pub fn apply_leadership_change(
        &mut self,
        to: Option<&Member>,
    ) -> Result<Option<LeadershipChange>, MembershipError> {
        let candidate = match to {
            Some(member) => match self.members.get(&member.node) {
                Some(known) => Some(known.node.clone()),
                None => {
                    return Err(MembershipError::NonMemberLeaderSelected {
                        candidate: member.clone(),
                    })
                }
            },
            None => None,
        };

        if candidate == self.leader {
            return Ok(None);
        }

        let old_leader = self.leader().cloned();
        self.leader = candidate;
        Ok(Some(LeadershipChange::new(old_leader, self.leader().cloned())))
    }

    // Engine internals, shared with the merge

    /// Forward-only status transition of a known incarnation, assigning the
    /// next up-number when it first reaches `up`.
    pub(crate) fn transition(
        &mut self,
        node: &UniqueNode,
        to: MemberStatus,
    ) -> Option<MembershipChange> {
        let member = self.members.get_mut(node)?;
        let mut change = member.move_forward(to)?;
        if to == MemberStatus::Up && member.up_number.is_none() {
            self.highest_up_number += 1;
            member.up_number = Some(self.highest_up_number);
            change.member.up_number = member.up_number;
        }
        Some(change)
    }

    /// Inserts an incarnation that is not yet known.
    ///
    /// If the physical node already has an authoritative incarnation and the
    /// newcomer is alive (below `down`), the old one is forced to `down` and the
    /// change reports it as replaced. A newcomer that is itself already down is
    /// recorded as history only. If every earlier incarnation is already
    /// removed, the newcomer is a plain join. Pruned incarnations are ignored.
    pub(crate) fn insert_incarnation(&mut self, mut member: Member) -> Option<MembershipChange> {
        if self.members.contains_key(&member.node) || self.was_pruned(&member.node) {
            return None;
        }

        if member.up_number.is_none() && member.status == MemberStatus::Up {
            self.highest_up_number += 1;
            member.up_number = Some(self.highest_up_number);
        }

        let current = self
            .first_member(&member.node.node)
            .filter(|m| m.status != MemberStatus::Removed)
            .map(|m| m.node.clone());
        match current {
            Some(current) if !member.status.is_down() => {
                let replaced = self.force_down(&current)?;
                self.insert_verbatim(member.clone());
                Some(MembershipChange::replacement(replaced, member))
            }
            _ => {
                self.insert_verbatim(member.clone());
                Some(MembershipChange::new(member))
            }
        }
    }

    /// Overwrites reachability and fills in a missing up-number, as learned from
    /// a peer. Status is left alone.
    pub(crate) fn adopt(
        &mut self,
        node: &UniqueNode,
        reachability: Option<Reachability>,
        up_number: Option<u32>,
    ) -> Option<&Member> {
        let member = self.members.get_mut(node)?;
        if let Some(r) = reachability {
            member.reachability = r;
        }
        if let (None, Some(n)) = (member.up_number, up_number) {
            member.up_number = Some(n);
            self.highest_up_number = self.highest_up_number.max(n);
        }
        Some(&*member)
    }

    // Replacement overrides the forward-only rule, but a removed incarnation
    // stays removed.
    fn force_down(&mut self, node: &UniqueNode) -> Option<Member> {
        let member = self.members.get_mut(node)?;
        member.status = member.status.max(MemberStatus::Down);
        Some(member.clone())
    }

    fn insert_verbatim(&mut self, member: Member) {
        if let Some(n) = member.up_number {
            self.highest_up_number = self.highest_up_number.max(n);
        }

        let node = member.node.node.clone();
        let is_history = member.status.is_down();
        let alive_at = self.incarnations.get(&node).and_then(|ids| {
            ids.iter().position(|id| {
                self.members
                    .get(id)
                    .map_or(false, |m| !m.status.is_down())
            })
        });

        let ids = self.incarnations.entry(node).or_default();
        if !ids.contains(&member.node) {
            match alive_at {
                // history learned late still sorts behind the live incarnation
                Some(pos) if is_history => ids.insert(pos, member.node.clone()),
                _ => ids.push(member.node.clone()),
            }
        }
        self.members.insert(member.node.clone(), member);
    }
}

impl PartialEq for Membership {
    fn eq(&self, other: &Self) -> bool {
        self.members == other.members && self.leader == other.leader
    }
}

impl Eq for Membership {}

impl FromIterator<Member> for Membership {
    fn from_iter<I: IntoIterator<Item = Member>>(iter: I) -> Self {
        let mut membership = Membership::new();
        for member in iter {
            let _ = membership.apply(&MembershipChange::new(member));
        }
        membership
    }
}

impl<'a> IntoIterator for &'a Membership {
    type Item = &'a Member;
    type IntoIter = std::collections::btree_map::Values<'a, UniqueNode, Member>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.values()
    }
}

/// Flat serialized form of a [`Membership`].
///
/// Members are listed per physical node, oldest incarnation first, so that the
/// incarnation history survives a round trip.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipSnapshot {
    pub members: Vec<Member>,
    pub leader: Option<UniqueNode>,
}

impl From<Membership> for MembershipSnapshot {
    fn from(membership: Membership) -> Self {
        let Membership {
            mut members,
            incarnations,
            leader,
            ..
        } = membership;

        let members = incarnations
            .into_values()
            .flatten()
            .filter_map(|id| members.remove(&id))
            .collect();

        Self { members, leader }
    }
}

impl From<MembershipSnapshot> for Membership {
    fn from(snapshot: MembershipSnapshot) -> Self {
        let mut membership = Membership::new();
        for member in snapshot.members {
            membership.insert_verbatim(member);
        }
        membership.leader = snapshot
            .leader
            .filter(|id| membership.members.contains_key(id));
        membership
    }
}
