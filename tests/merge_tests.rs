use hivecluster::{Member, MemberStatus, Membership, MembershipChange, Node, Reachability, UniqueNode};

// Helper function to create a fresh incarnation at the given address
fn unique_node(host: &str, port: u16) -> UniqueNode {
    UniqueNode::random(Node::new("System", host, port))
}

// Helper function to build the three-member "all up" cluster
fn initial() -> (Membership, Vec<UniqueNode>) {
    let nodes = vec![
        unique_node("1.1.1.1", 7337),
        unique_node("2.2.2.2", 8228),
        unique_node("3.3.3.3", 9119),
    ];
    let membership = nodes
        .iter()
        .map(|n| Member::new(n.clone(), MemberStatus::Up))
        .collect();
    (membership, nodes)
}

// Diffing

#[test]
fn test_membership_diff_is_empty_when_nothing_changed() {
    let (membership, _) = initial();
    let changed = membership.clone();

    let diff = Membership::diff(&membership, &changed);
    assert!(diff.is_empty());
    assert_eq!(diff.changes.len(), 0);
}

#[test]
fn test_membership_diff_includes_entry_when_status_changed() {
    let (membership, nodes) = initial();
    let changed = membership.marking(&nodes[0], MemberStatus::Leaving);

    let diff = Membership::diff(&membership, &changed);

    assert_eq!(diff.changes.len(), 1);
    let entry = &diff.changes[0];
    assert_eq!(entry.node(), &nodes[0]);
    assert_eq!(entry.from_status, Some(MemberStatus::Up));
    assert_eq!(entry.to_status, MemberStatus::Leaving);
}

#[test]
fn test_membership_diff_includes_entry_when_member_removed() {
    let (membership, nodes) = initial();
    let changed = membership.removing_completely(&nodes[0]);

    let diff = Membership::diff(&membership, &changed);

    assert_eq!(diff.changes.len(), 1);
    let entry = &diff.changes[0];
    assert_eq!(entry.node(), &nodes[0]);
    assert_eq!(entry.from_status, Some(MemberStatus::Up));
    assert_eq!(entry.to_status, MemberStatus::Removed);
    assert!(entry.is_removal());
}

#[test]
fn test_membership_diff_includes_entry_when_member_added() {
    let (membership, _) = initial();
    let newcomer = unique_node("4.4.4.4", 1001);
    let changed = membership.joining(newcomer.clone());

    let diff = Membership::diff(&membership, &changed);

    assert_eq!(diff.changes.len(), 1);
    let entry = &diff.changes[0];
    assert_eq!(entry.node(), &newcomer);
    assert_eq!(entry.from_status, None);
    assert_eq!(entry.to_status, MemberStatus::Joining);
}

#[test]
fn test_membership_diff_ignores_reachability() {
    let (membership, nodes) = initial();
    let mut changed = membership.clone();
    changed.mark_reachability(&nodes[1], Reachability::Unreachable);

    assert!(Membership::diff(&membership, &changed).is_empty());
}

#[test]
fn test_membership_diff_reports_replacement_as_two_entries() {
    let (membership, nodes) = initial();
    let replacement = unique_node("1.1.1.1", 7337);
    let changed = membership.joining(replacement.clone());

    let diff = Membership::diff(&membership, &changed);

    assert_eq!(diff.changes.len(), 2);
    assert!(diff
        .changes
        .iter()
        .any(|c| c.node() == &replacement && c.from_status.is_none()));
    assert!(diff.changes.iter().any(|c| c.node() == &nodes[0]
        && c.from_status == Some(MemberStatus::Up)
        && c.to_status == MemberStatus::Down));
}

// Merging

#[test]
fn test_merge_forward_from_ahead_same() {
    let (mut membership, _) = initial();
    let ahead = membership.clone();

    let diff = membership.merge_forward(&ahead);

    assert!(diff.is_empty());
    assert_eq!(membership, ahead);
}

#[test]
fn test_merge_forward_from_ahead_with_additional_member() {
    let (mut membership, _) = initial();
    let newcomer = unique_node("4.4.4.4", 1001);
    let mut ahead = membership.clone();
    ahead.join(newcomer.clone());

    let diff = membership.merge_forward(&ahead);

    assert_eq!(diff.changes.len(), 1);
    assert_eq!(diff.changes[0].node(), &newcomer);
    assert_eq!(diff.changes[0].from_status, None);
    assert_eq!(membership, ahead);
}

#[test]
fn test_merge_forward_from_ahead_with_member_now_down() {
    let (mut membership, nodes) = initial();
    let mut ahead = membership.clone();
    ahead.mark(&nodes[0], MemberStatus::Down);

    let diff = membership.merge_forward(&ahead);

    assert_eq!(diff.changes.len(), 1);
    assert_eq!(diff.changes[0].from_status, Some(MemberStatus::Up));
    assert_eq!(diff.changes[0].to_status, MemberStatus::Down);
    assert_eq!(membership.member(&nodes[0]).unwrap().status, MemberStatus::Down);
    assert_eq!(membership, ahead);
}

#[test]
fn test_merge_forward_never_regresses_status() {
    let (mut membership, nodes) = initial();
    membership.mark(&nodes[1], MemberStatus::Leaving);

    let mut behind = membership.clone();
    behind.remove_completely(&nodes[1]);
    behind.apply(&MembershipChange::new(Member::new(
        nodes[1].clone(),
        MemberStatus::Up,
    )));

    let diff = membership.merge_forward(&behind);

    assert!(diff.changes.is_empty());
    assert_eq!(membership.member(&nodes[1]).unwrap().status, MemberStatus::Leaving);
}

#[test]
fn test_merge_forward_does_not_infer_removal_from_absence() {
    let (mut membership, nodes) = initial();
    let ahead = membership.removing_completely(&nodes[2]);

    let diff = membership.merge_forward(&ahead);

    assert!(diff.is_empty());
    assert_eq!(membership.member(&nodes[2]).unwrap().status, MemberStatus::Up);
}

#[test]
fn test_merge_forward_adopts_ahead_reachability() {
    let (mut membership, nodes) = initial();
    membership.mark_reachability(&nodes[0], Reachability::Unreachable);

    let mut ahead = membership.clone();
    ahead.mark_reachability(&nodes[0], Reachability::Reachable);
    ahead.mark_reachability(&nodes[1], Reachability::Unreachable);

    let diff = membership.merge_forward(&ahead);

    assert!(diff.changes.is_empty());
    assert_eq!(diff.reachability.len(), 2);
    assert!(membership.member(&nodes[0]).unwrap().is_reachable());
    assert!(!membership.member(&nodes[1]).unwrap().is_reachable());

    // second time around there is nothing left to learn
    assert!(membership.merge_forward(&ahead).is_empty());
}

#[test]
fn test_merge_forward_with_replacement() {
    let original = unique_node("1.1.1.1", 7337);
    let restarted = unique_node("1.1.1.1", 7337);

    let mut local: Membership = vec![Member::new(original.clone(), MemberStatus::Up)]
        .into_iter()
        .collect();
    let ahead: Membership = vec![Member::new(restarted.clone(), MemberStatus::Joining)]
        .into_iter()
        .collect();

    let diff = local.merge_forward(&ahead);

    assert_eq!(diff.changes.len(), 1);
    let change = &diff.changes[0];
    assert!(change.is_replacement());
    assert_eq!(change.node(), &restarted);
    assert_eq!(change.replaced.as_ref().unwrap().node, original);
    assert_eq!(change.replaced.as_ref().unwrap().status, MemberStatus::Down);

    assert_eq!(local.member(&original).unwrap().status, MemberStatus::Down);
    assert_eq!(local.member(&restarted).unwrap().status, MemberStatus::Joining);
    assert_eq!(local.first_member(&original.node).unwrap().node, restarted);

    assert!(local.merge_forward(&ahead).is_empty());
}

#[test]
fn test_merge_forward_learns_history_without_replacing() {
    let original = unique_node("1.1.1.1", 7337);
    let restarted = unique_node("1.1.1.1", 7337);

    let mut local: Membership = vec![Member::new(restarted.clone(), MemberStatus::Up)]
        .into_iter()
        .collect();
    let mut ahead: Membership = vec![Member::new(original.clone(), MemberStatus::Up)]
        .into_iter()
        .collect();
    ahead.join(restarted.clone());

    let diff = local.merge_forward(&ahead);

    // the old incarnation is learned as down history, the live one stays up
    assert_eq!(diff.changes.len(), 1);
    assert!(!diff.changes[0].is_replacement());
    assert_eq!(local.member(&restarted).unwrap().status, MemberStatus::Up);
    assert_eq!(local.member(&original).unwrap().status, MemberStatus::Down);
    assert_eq!(local.first_member(&original.node).unwrap().node, restarted);
    let incarnations: Vec<&UniqueNode> = local
        .members_of(&original.node)
        .into_iter()
        .map(|m| &m.node)
        .collect();
    assert_eq!(incarnations, vec![&restarted, &original]);
}

#[test]
fn test_merge_forward_keeps_peer_up_number() {
    let (mut membership, _) = initial();
    let newcomer = unique_node("4.4.4.4", 1001);
    membership.join(newcomer.clone());

    let mut ahead = membership.clone();
    // the leader on the other side promoted the newcomer
    ahead.mark(&newcomer, MemberStatus::Up);
    let assigned = ahead.member(&newcomer).unwrap().up_number;
    assert!(assigned.is_some());

    let diff = membership.merge_forward(&ahead);

    assert_eq!(diff.changes.len(), 1);
    assert_eq!(diff.changes[0].member.up_number, assigned);
    assert_eq!(membership.member(&newcomer).unwrap().up_number, assigned);
}

#[test]
fn test_merge_forward_converges_both_ways() {
    let (base, nodes) = initial();
    let mut left = base.clone();
    let mut right = base;

    left.mark(&nodes[0], MemberStatus::Leaving);
    left.join(unique_node("4.4.4.4", 1001));
    right.mark(&nodes[2], MemberStatus::Down);
    right.mark_reachability(&nodes[1], Reachability::Unreachable);

    let right_before = right.clone();
    right.merge_forward(&left);
    left.merge_forward(&right_before);

    assert!(Membership::diff(&left, &right).is_empty());
    for node in &nodes {
        assert_eq!(
            left.member(node).unwrap().status,
            right.member(node).unwrap().status
        );
    }
}
