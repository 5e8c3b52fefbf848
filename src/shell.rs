use crate::change::{LeadershipChange, MembershipChange, MembershipDiff, ReachabilityChange};
use crate::config::MembershipConfig;
use crate::gossip;
use crate::member::{Member, MemberStatus, Reachability};
use crate::membership::Membership;
use crate::node::UniqueNode;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

/// Events published to subscribers of a [`ClusterShell`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClusterEvent {
    MembershipChanged(MembershipChange),
    ReachabilityChanged(ReachabilityChange),
    LeadershipChanged(LeadershipChange),
}

/// Owner of the local membership.
///
/// Serializes every mutation behind one lock, publishes the resulting changes
/// and bridges gossip payloads to the merge. The membership itself stays a
/// plain value; this is the only place that logs.
#[derive(Clone, Debug)]
pub struct ClusterShell {
    self_node: UniqueNode,
    config: MembershipConfig,
    membership: Arc<Mutex<Membership>>,
    event_tx: broadcast::Sender<ClusterEvent>,
}

impl ClusterShell {
    /// Starts a shell for a fresh incarnation of the configured node.
    pub fn new(config: MembershipConfig) -> Result<Self> {
        let self_node = UniqueNode::random(config.node());
        Self::with_self_node(config, self_node)
    }

    pub fn with_self_node(config: MembershipConfig, self_node: UniqueNode) -> Result<Self> {
        config.validate()?;

        let mut membership = Membership::new();
        let _ = membership.join(self_node.clone());
        let (event_tx, _) = broadcast::channel(config.event_buffer);

        info!("Cluster member {} starting", self_node);

        Ok(Self {
            self_node,
            config,
            membership: Arc::new(Mutex::new(membership)),
            event_tx,
        })
    }

    pub fn self_node(&self) -> &UniqueNode {
        &self.self_node
    }

    pub fn config(&self) -> &MembershipConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClusterEvent> {
        self.event_tx.subscribe()
    }

    pub async fn snapshot(&self) -> Membership {
        self.membership.lock().await.clone()
    }

    pub async fn self_member(&self) -> Option<Member> {
        self.membership.lock().await.member(&self.self_node).cloned()
    }

    pub async fn join(&self, node: UniqueNode) -> Option<MembershipChange> {
        let change = self.membership.lock().await.join(node);
        if let Some(change) = &change {
            self.publish_change(change);
        }
        change
    }

    pub async fn mark(&self, node: &UniqueNode, status: MemberStatus) -> Option<MembershipChange> {
        let change = self.membership.lock().await.mark(node, status);
        if let Some(change) = &change {
            self.publish_change(change);
        }
        change
    }

    pub async fn mark_reachability(
        &self,
        node: &UniqueNode,
        reachability: Reachability,
    ) -> Option<Member> {
        let updated = self
            .membership
            .lock()
            .await
            .mark_reachability(node, reachability);
        if let Some(member) = &updated {
            debug!("Member {} is now {}", member.node, member.reachability);
            let _ = self
                .event_tx
                .send(ClusterEvent::ReachabilityChanged(ReachabilityChange {
                    member: member.clone(),
                }));
        }
        updated
    }

    /// Marks this node as leaving.
    pub async fn leave(&self) -> Option<MembershipChange> {
        let self_node = self.self_node.clone();
        self.mark(&self_node, MemberStatus::Leaving).await
    }

    pub async fn apply_leadership_change(
        &self,
        to: Option<&Member>,
    ) -> Result<Option<LeadershipChange>> {
        let result = self.membership.lock().await.apply_leadership_change(to);
        let change = match result {
            Ok(change) => change,
            Err(e) => {
                warn!("Rejected leadership change: {}", e);
                return Err(e.into());
            }
        };

        if let Some(change) = &change {
            match &change.new_leader {
                Some(leader) => info!("Leader is now {}", leader.node),
                None => info!("Cluster has no leader"),
            }
            let _ = self
                .event_tx
                .send(ClusterEvent::LeadershipChanged(change.clone()));
        }
        Ok(change)
    }

    /// Merges a membership received from a peer and publishes what changed.
    pub async fn receive_remote_snapshot(&self, remote: Membership) -> MembershipDiff {
        let remote = self.demote_stale_self(remote);
        let (diff, pruned) = {
            let mut membership = self.membership.lock().await;
            let diff = membership.merge_forward(&remote);
            let pruned = membership.prune_history(&self.config.retention);
            (diff, pruned)
        };

        if diff.is_empty() {
            debug!("Remote membership brought nothing new");
        } else {
            debug!(
                "Merged remote membership: {} status change(s), {} reachability change(s)",
                diff.changes.len(),
                diff.reachability.len()
            );
        }
        for member in &pruned {
            debug!("Pruned historical incarnation {}", member.node);
        }

        for change in &diff.changes {
            self.publish_change(change);
        }
        for change in &diff.reachability {
            let _ = self
                .event_tx
                .send(ClusterEvent::ReachabilityChanged(change.clone()));
        }

        diff
    }

    pub async fn receive_gossip(&self, payload: &[u8]) -> Result<MembershipDiff> {
        let remote = gossip::decode_snapshot(payload)?;
        Ok(self.receive_remote_snapshot(remote).await)
    }

    pub async fn gossip_payload(&self) -> Result<Vec<u8>> {
        let membership = self.membership.lock().await;
        gossip::encode_snapshot(&membership)
    }

    // Peers may still gossip an earlier incarnation of this node as alive.
    fn demote_stale_self(&self, mut remote: Membership) -> Membership {
        let stale: Vec<UniqueNode> = remote
            .members_of(&self.self_node.node)
            .into_iter()
            .filter(|m| m.node != self.self_node && !m.status.is_down())
            .map(|m| m.node.clone())
            .collect();

        for node in stale {
            debug!("Treating previous incarnation {} as down", node);
            let _ = remote.mark(&node, MemberStatus::Down);
        }
        remote
    }

    fn publish_change(&self, change: &MembershipChange) {
        if change.node() == &self.self_node && change.to_status.is_down() {
            warn!("This node ({}) was marked {}", self.self_node, change.to_status);
        } else if let Some(replaced) = &change.replaced {
            info!("Member {} replaced {} at {}", change.node(), replaced.node, change.to_status);
        } else {
            debug!("{}", change);
        }

        let _ = self
            .event_tx
            .send(ClusterEvent::MembershipChanged(change.clone()));
    }
}
