//! # Canonical Encoding
//!
//! Every signable object in Civitas serializes to a deterministic byte
//! string, and that byte string is both the message that gets signed and the
//! object's identity. Signatures must survive copies, benign mutation, and
//! round-trips through set membership, so the encoding depends only on
//! logical content, never on memory layout or map iteration order.
//!
//! Rules:
//!
//! - Fields are joined with a reserved separator byte that cannot appear in
//!   any field. ASCII Unit Separator (0x1F) is unreachable from voter names,
//!   position labels, and formatted timestamps alike; a printable character
//!   such as `:` would collide with the `HH:MM` inside timestamps.
//! - Orderings are explicit: ballot positions in insertion order, choices in
//!   declared order, transaction fields in a fixed tuple order.
//! - Timestamps are truncated to one-minute resolution, so re-signing within
//!   the same minute is idempotent.
//! - Ballot encodings can exclude the `selected` lists: a ballot is signed
//!   once as an empty template and once filled in, and both signatures must
//!   stay verifiable against the same logical ballot.

use chrono::{DateTime, Utc};

use crate::config;

/// Reserved field separator for canonical encodings.
pub const FIELD_SEPARATOR: u8 = 0x1F;

/// Options controlling how an object canonicalizes.
///
/// Currently a single switch: whether a ballot's selections participate in
/// the encoding. Issuance-style signatures cover the empty template
/// ([`CanonicalOpts::template`]); usage signatures cover the filled ballot
/// ([`CanonicalOpts::filled`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalOpts {
    /// Include each position's selected choice indices in the encoding.
    pub include_selections: bool,
}

impl CanonicalOpts {
    /// Encode the ballot as filled out, selections included.
    pub fn filled() -> Self {
        Self {
            include_selections: true,
        }
    }

    /// Encode only the ballot template, selections excluded.
    pub fn template() -> Self {
        Self {
            include_selections: false,
        }
    }
}

impl Default for CanonicalOpts {
    fn default() -> Self {
        Self::filled()
    }
}

/// Deterministic byte serialization for signable objects.
pub trait Canonical {
    /// Returns the canonical byte encoding of `self` under `opts`.
    ///
    /// Must be a pure function of logical content: equal inputs produce
    /// equal bytes, and any field change produces different bytes.
    fn canonical(&self, opts: CanonicalOpts) -> Vec<u8>;
}

/// Joins string fields with the reserved separator.
pub fn join_fields<I, S>(fields: I) -> Vec<u8>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = Vec::new();
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(FIELD_SEPARATOR);
        }
        out.extend_from_slice(field.as_ref().as_bytes());
    }
    out
}

/// Appends a separator followed by a raw field to an encoding under
/// construction.
pub fn push_field(buf: &mut Vec<u8>, field: &[u8]) {
    buf.push(FIELD_SEPARATOR);
    buf.extend_from_slice(field);
}

/// Formats a timestamp at the one-minute canonical resolution
/// (`YYYY-MM-DD HH:MM`).
pub fn format_minute(at: &DateTime<Utc>) -> String {
    at.format(config::TIMESTAMP_MINUTE_FORMAT).to_string()
}
