//! Deterministic bucketing of identities into percentage slots.
//!
//! Buckets are CRC-32 (ISO-HDLC, the zlib variant) checksums of the UTF-8
//! identity. Persisted rollouts depend on this exact checksum: a user inside
//! a 40% rollout stays inside when the rollout grows to 60%.

/// Raw 32-bit checksum for an identity.
pub fn bucket(identity: &str) -> u32 {
    crc32fast::hash(identity.as_bytes())
}

/// Slot in `[0, 100)` for an identity.
pub fn slot(identity: &str) -> i64 {
    i64::from(bucket(identity) % 100)
}

/// `true` when the identity falls inside a rollout of `percentage`.
///
/// Percentages are not clamped: anything `<= 0` never matches and anything
/// `> 99` always matches.
pub fn in_percentage(identity: &str, percentage: i64) -> bool {
    slot(identity) < percentage
}
