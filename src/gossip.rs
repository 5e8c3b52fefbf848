use crate::membership::Membership;
use anyhow::{bail, Context, Result};

// Payloads larger than this are rejected before decoding
pub const MAX_GOSSIP_PAYLOAD: usize = 1024 * 1024;

/// Encodes a membership snapshot for transmission to a peer.
pub fn encode_snapshot(membership: &Membership) -> Result<Vec<u8>> {
    let encoded = bincode::serialize(membership).context("Failed to encode membership snapshot")?;
    if encoded.len() > MAX_GOSSIP_PAYLOAD {
        bail!(
            "Membership snapshot of {} bytes exceeds the {} byte gossip limit",
            encoded.len(),
            MAX_GOSSIP_PAYLOAD
        );
    }
    Ok(encoded)
}

pub fn decode_snapshot(bytes: &[u8]) -> Result<Membership> {
    if bytes.len() > MAX_GOSSIP_PAYLOAD {
        bail!(
            "Gossip payload of {} bytes exceeds the {} byte limit",
            bytes.len(),
            MAX_GOSSIP_PAYLOAD
        );
    }
    bincode::deserialize(bytes).context("Failed to decode membership snapshot")
}
