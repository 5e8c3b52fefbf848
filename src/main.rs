use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use rand::seq::SliceRandom;
use std::path::PathBuf;
use tracing::{info, warn};

use hivecluster::logging::init_logging;
use hivecluster::{ClusterShell, Member, MemberStatus, Membership, MembershipConfig};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an in-process gossip simulation until the members agree
    Simulate {
        #[arg(long, default_value = "5")]
        nodes: usize,
        #[arg(long, default_value = "20")]
        rounds: usize,
        /// Peers each node gossips to per round
        #[arg(long, default_value = "2")]
        fanout: usize,
        /// Restart the node at this index with a new incarnation once converged
        #[arg(long)]
        restart: Option<usize>,
        /// JSON configuration used as the base for every simulated node
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the default configuration as JSON
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    match cli.command {
        Commands::Simulate {
            nodes,
            rounds,
            fanout,
            restart,
            config,
        } => {
            let base = match config {
                Some(path) => MembershipConfig::from_file(path)?,
                None => MembershipConfig::default(),
            };
            simulate(base, nodes, rounds, fanout, restart).await?;
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&MembershipConfig::default())?);
        }
    }

    Ok(())
}

fn node_config(base: &MembershipConfig, index: usize) -> Result<MembershipConfig> {
    let offset = u16::try_from(index)?;
    match base.port.checked_add(offset) {
        Some(port) => Ok(base.clone().with_port(port)),
        None => bail!("Port range exhausted at node {}", index),
    }
}

async fn simulate(
    base: MembershipConfig,
    nodes: usize,
    rounds: usize,
    fanout: usize,
    restart: Option<usize>,
) -> Result<()> {
    if nodes == 0 {
        bail!("At least one node is required");
    }
    if let Some(index) = restart {
        if index >= nodes {
            bail!("Cannot restart node {} of {}", index, nodes);
        }
    }

    let mut shells = Vec::with_capacity(nodes);
    for index in 0..nodes {
        shells.push(ClusterShell::new(node_config(&base, index)?)?);
    }

    // Everybody contacts the first node as seed
    for shell in &shells[1..] {
        shells[0].receive_gossip(&shell.gossip_payload().await?).await?;
    }
    run_rounds(&shells, rounds, fanout).await?;

    if let Some(index) = restart {
        let previous = shells[index].self_node().clone();
        shells[index] = ClusterShell::new(node_config(&base, index)?)?;
        info!("Restarted {} as {}", previous, shells[index].self_node());

        // A lone node has nobody to announce the restart to
        if shells.len() > 1 {
            let seed = if index == 0 { shells.len() - 1 } else { 0 };
            shells[seed]
                .receive_gossip(&shells[index].gossip_payload().await?)
                .await?;
            run_rounds(&shells, rounds, fanout).await?;
        }
    }

    print_membership(&shells[0].snapshot().await);
    Ok(())
}

async fn run_rounds(shells: &[ClusterShell], rounds: usize, fanout: usize) -> Result<()> {
    for round in 1..=rounds {
        for (index, shell) in shells.iter().enumerate() {
            lead(shell).await?;

            let peers: Vec<usize> = {
                let others: Vec<usize> = (0..shells.len()).filter(|i| *i != index).collect();
                let mut rng = rand::thread_rng();
                others.choose_multiple(&mut rng, fanout).copied().collect()
            };

            let payload = shell.gossip_payload().await?;
            for peer in peers {
                shells[peer].receive_gossip(&payload).await?;
            }
        }

        if converged(shells).await {
            info!("Converged after {} round(s)", round);
            return Ok(());
        }
    }

    warn!("No convergence after {} round(s)", rounds);
    Ok(())
}

// Lowest address among live members leads; the leader promotes joining members.
async fn lead(shell: &ClusterShell) -> Result<()> {
    let snapshot = shell.snapshot().await;
    let candidate = snapshot
        .members_at_least(MemberStatus::Joining, None)
        .into_iter()
        .filter(|m| !m.status.is_down())
        .min_by(|a, b| a.node.cmp(&b.node))
        .cloned();

    shell.apply_leadership_change(candidate.as_ref()).await?;

    let is_leader = candidate.map_or(false, |m| &m.node == shell.self_node());
    if is_leader {
        for member in snapshot.members_with_status(MemberStatus::Joining, None) {
            shell.mark(&member.node, MemberStatus::Up).await;
        }
    }
    Ok(())
}

async fn converged(shells: &[ClusterShell]) -> bool {
    let reference = shells[0].snapshot().await;
    for shell in &shells[1..] {
        if !Membership::diff(&reference, &shell.snapshot().await).is_empty() {
            return false;
        }
    }
    true
}

fn print_membership(membership: &Membership) {
    let mut members: Vec<&Member> = membership.iter().collect();
    members.sort_by(|a, b| Member::age_ordering(a, b));

    println!("{:<50} {:<10} {:<12} {}", "NODE", "STATUS", "REACHABILITY", "UP#");
    for member in members {
        let up_number = member
            .up_number
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        let leader = if membership.is_leader(&member.node) { " (leader)" } else { "" };
        println!(
            "{:<50} {:<10} {:<12} {}{}",
            member.node.to_string(),
            member.status.to_string(),
            member.reachability.to_string(),
            up_number,
            leader
        );
    }
}
