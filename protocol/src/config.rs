//! # Protocol Configuration & Constants
//!
//! Every magic number in Civitas lives here. The values below define how a
//! committee reaches agreement; changing them on a live network would split
//! every replica from its peers, so treat them as consensus-critical.

// ---------------------------------------------------------------------------
// Consensus Parameters
// ---------------------------------------------------------------------------

/// Minimum fraction of a node's peer set (plus itself) that must approve a
/// transaction before it is committed into a block. 0.8 follows the Ripple
/// analysis: with a known participant set, an 80% quorum keeps honest
/// replicas identical as long as fewer than 20% of nodes misbehave.
pub const MINIMUM_AGREEMENT_PCT: f64 = 0.8;

/// Default number of nodes per committee.
pub const DEFAULT_COMMITTEE_SIZE: usize = 50;

/// Number of adversarial nodes a committee of `n` is guaranteed to tolerate.
///
/// One less than `floor((1 - MINIMUM_AGREEMENT_PCT) * n)`: at exactly
/// `floor(0.2 * n)` silent nodes the honest approval ratio lands on the 0.8
/// boundary, which still commits, but gives no margin. Simulations inject
/// this many adversaries per committee.
pub fn max_tolerated_adversaries(committee_size: usize) -> usize {
    // Nudge before flooring: 1 - 0.8 is not exact in binary, so 0.2 * n can
    // land a hair below the integer it mathematically equals.
    let faulty = ((1.0 - MINIMUM_AGREEMENT_PCT) * committee_size as f64 + 1e-9).floor() as usize;
    faulty.saturating_sub(1)
}

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// RSA modulus size for node identity keys.
///
/// Simulation-grade on purpose. A 100-node election spins up 100 keypairs,
/// and 512-bit generation keeps that affordable in tests; real deployments
/// would use 2048+ bits and an HSM, not an in-process keystore.
pub const RSA_KEY_BITS: usize = 512;

/// PSS salt length in bytes.
///
/// Must satisfy `hash_len + salt_len + 2 <= modulus_bytes`, so with SHA-256
/// (32 bytes) and a 512-bit modulus (64 bytes) the salt can be at most 30
/// bytes. 16 leaves headroom while keeping the salt non-trivial.
pub const PSS_SALT_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Canonical Encoding
// ---------------------------------------------------------------------------

/// Timestamp format used in canonical encodings, truncated to one-minute
/// resolution. Re-signing the same content within a minute yields the same
/// canonical bytes, which makes retries idempotent.
pub const TIMESTAMP_MINUTE_FORMAT: &str = "%Y-%m-%d %H:%M";

// ---------------------------------------------------------------------------
// Claim Tickets
// ---------------------------------------------------------------------------

/// How long a claim ticket stays presentable after issuance, in seconds.
/// Checked only when a voter presents the ticket at a Tabulator; consensus
/// never consults the wall clock.
pub const TICKET_VALIDITY_SECS: i64 = 5 * 60;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agreement_threshold_is_a_ratio() {
        assert!(MINIMUM_AGREEMENT_PCT > 0.5);
        assert!(MINIMUM_AGREEMENT_PCT <= 1.0);
    }

    #[test]
    fn adversary_budget_at_default_size() {
        // floor(0.2 * 50) - 1 = 9
        assert_eq!(max_tolerated_adversaries(DEFAULT_COMMITTEE_SIZE), 9);
    }

    #[test]
    fn adversary_budget_small_committees() {
        // Committees too small to spare anyone tolerate zero adversaries.
        assert_eq!(max_tolerated_adversaries(0), 0);
        assert_eq!(max_tolerated_adversaries(4), 0);
        assert_eq!(max_tolerated_adversaries(5), 0);
        assert_eq!(max_tolerated_adversaries(10), 1);
    }

    #[test]
    fn pss_salt_fits_smallest_modulus() {
        // hLen + sLen + 2 must fit in the modulus byte length.
        assert!(32 + PSS_SALT_LEN + 2 <= RSA_KEY_BITS / 8);
    }
}
