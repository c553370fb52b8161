//! Configuration fingerprint shared with the DNS mesh controller.
//!
//! The controller recomputes the same digest and compares it with the value
//! the sidecar reports, so the encoding here must stay stable: keys sorted,
//! compact JSON object, SHA-256, lowercase hex.

use anyhow::Context as _;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Hashes a label-like mapping.
///
/// Returns an empty string for an empty mapping instead of the digest of `{}`.
pub fn config_hash<I, K, V>(mapping: I) -> anyhow::Result<String>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let sorted = mapping
        .into_iter()
        .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
        .collect::<BTreeMap<_, _>>();
    if sorted.is_empty() {
        return Ok(String::new());
    }

    let data = serde_json::to_vec(&sorted).context("failed to serialize mapping")?;
    let digest = Sha256::digest(&data);
    Ok(hex::encode(digest))
}
