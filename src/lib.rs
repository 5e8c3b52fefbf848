pub mod change;
pub mod config;
mod diff;
pub mod error;
pub mod gossip;
pub mod lattice;
pub mod logging;
pub mod member;
pub mod membership;
mod merge;
pub mod node;
pub mod shell;

pub use change::{LeadershipChange, MembershipChange, MembershipDiff, ReachabilityChange};
pub use config::{MembershipConfig, RetentionPolicy};
pub use error::MembershipError;
pub use member::{Member, MemberStatus, Reachability};
pub use membership::{Membership, MembershipSnapshot};
pub use node::{Node, NodeId, UniqueNode};
pub use shell::{ClusterEvent, ClusterShell};
