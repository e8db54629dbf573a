//! Stable identities
//!
//! Study clients match imported notes to existing ones by GUID, and decks
//! and note types by id. All three are pure functions of the deck title and
//! card content, so a regenerated deck keeps its review history.

use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Alphabet of the base-91 encoding study clients use for note GUIDs
const BASE91_TABLE: &[u8; 91] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!#$%&()*+,-./:;<=>?@[]^_`{|}~";

/// Deterministic 31-bit id from a string (deck and model ids)
pub fn stable_id(value: &str) -> i64 {
    let digest = Sha256::digest(value.as_bytes());
    let prefix = digest[..4]
        .iter()
        .fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
    i64::from(prefix & 0x7fff_ffff)
}

/// Note GUID from identifying parts, joined with `__`
pub fn guid_for(parts: &[&str]) -> String {
    let joined = parts.join("__");
    let digest = Sha256::digest(joined.as_bytes());
    let mut value = digest[..8]
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));

    let mut encoded = Vec::new();
    while value > 0 {
        encoded.push(BASE91_TABLE[(value % 91) as usize] as char);
        value /= 91;
    }
    encoded.iter().rev().collect()
}

/// Duplicate-detection checksum of a note's sort field
pub fn field_checksum(text: &str) -> i64 {
    let digest = Sha1::digest(text.as_bytes());
    let prefix = digest[..4]
        .iter()
        .fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
    i64::from(prefix)
}
