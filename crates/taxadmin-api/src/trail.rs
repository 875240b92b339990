//! Audit trail hash chain.
//!
//! Each link hashes its own content together with the previous link's hash,
//! so editing or removing any stored link breaks every later one.

use serde::Serialize;
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use crate::records::AuditTrailRecord;
use crate::state::GENESIS_HASH;

/// SHA-256(previous_hash || seq || action || entity_type || entity_id || details || created_at).
pub fn link_hash(link: &AuditTrailRecord) -> String {
    let entity = link.entity_id.map(|id| id.to_string()).unwrap_or_default();
    let user = link.user_id.map(|id| id.to_string()).unwrap_or_default();
    let input = format!(
        "{}|{}|{}|{}|{}|{}|{}|{}",
        link.previous_hash,
        link.seq,
        user,
        link.action,
        link.entity_type,
        entity,
        link.details,
        link.created_at.timestamp_micros(),
    );
    sha256_hex(&input)
}

/// Result of chain verification.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChainIntegrity {
    pub total_links: usize,
    pub broken_links: usize,
    pub chain_valid: bool,
}

/// Check `links` (ordered by `seq`): each must point at its predecessor and
/// carry the hash of its own content.
pub fn verify_chain(links: &[AuditTrailRecord]) -> ChainIntegrity {
    let mut broken_links = 0;
    let mut expected_prev = GENESIS_HASH;

    for link in links {
        if link.previous_hash != expected_prev || link.hash != link_hash(link) {
            broken_links += 1;
        }
        expected_prev = &link.hash;
    }

    ChainIntegrity {
        total_links: links.len(),
        broken_links,
        chain_valid: broken_links == 0,
    }
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();
    result.iter().map(|b| format!("{b:02x}")).collect()
}
