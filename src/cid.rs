use crate::config::CID_DIGEST_BYTES;
use crate::models::DetailRow;
use sha2::{Digest, Sha256};

/// Content identifier for a database build.
///
/// SHA-256 over the compact JSON array of the four fields, truncated to
/// [`CID_DIGEST_BYTES`] and hex encoded. Short on purpose: collisions are
/// possible and are reported by the deduplicator.
pub fn cid(creation_time: &str, sha: &str, cli_version: &str, language: &str) -> String {
    // serializing a [&str; 4] cannot fail
    let encoded = serde_json::to_string(&[creation_time, sha, cli_version, language])
        .unwrap_or_default();
    let digest = Sha256::digest(encoded.as_bytes());
    hex::encode(&digest[..CID_DIGEST_BYTES])
}

pub fn row_cid(row: &DetailRow) -> String {
    cid(&row.creation_time, &row.sha, &row.cli_version, &row.language)
}

/// Returns a new table with every row's `cid` filled in.
pub fn assign_cids(rows: &[DetailRow]) -> Vec<DetailRow> {
    rows.iter()
        .map(|row| DetailRow {
            cid: Some(row_cid(row)),
            ..row.clone()
        })
        .collect()
}
