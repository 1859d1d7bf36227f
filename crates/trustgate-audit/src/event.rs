//! The chained record type.

use serde::{Deserialize, Serialize};

use trustgate_contracts::audit::AuditEntry;

/// One entry in the checksum chain.
///
/// Each record commits to the previous one via `prev_checksum`, forming an
/// append-only chain. Modifying any field, including the embedded entry's
/// payload, invalidates `checksum` and every later record, which
/// `verify_chain` detects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Position in the chain, starting at 0.
    pub sequence: u64,

    pub entry: AuditEntry,

    /// Checksum of the previous record, or `GENESIS_CHECKSUM` for the first.
    pub prev_checksum: String,

    /// SHA-256 (hex) over (sequence, prev_checksum, canonical JSON of entry).
    pub checksum: String,
}

impl AuditRecord {
    /// The `prev_checksum` of the first record in every chain: 64 hex zeros.
    pub const GENESIS_CHECKSUM: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}
