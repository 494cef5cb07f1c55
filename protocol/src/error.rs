//! # Admission Errors
//!
//! The error kinds a node can surface while screening a transaction, either
//! at admission time or during the consensus round. These are values, not
//! control flow: a rejected transaction lands in the rejected pool with its
//! error recorded, and nothing propagates to whoever broadcast it. Only the
//! voter-facing operations (`generate_claim_ticket`, `vote`) return errors
//! to their caller, because the voter has to learn they were turned away.

use thiserror::Error;
use uuid::Uuid;

use crate::transaction::StateTag;

/// Reasons a transaction is refused by a committee member.
///
/// `Clone + PartialEq` because rejections are stored per transaction in the
/// round's rejection map and asserted on in tests. The `Display` strings
/// double as the human-readable rejection reasons exposed after a round.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    /// Cryptographic signature verification failed.
    #[error("signature verification failed")]
    BadSignature,

    /// The issuer is not in the peer directory, the committee roster, or the
    /// configured trust list.
    #[error("issuing node is not recognized")]
    UnrecognizedNode,

    /// The referenced voter id is not on the committed roll.
    #[error("voter {0} is not on the voter roll")]
    UnknownVoter(String),

    /// Issuing another ticket would exceed the voter's allotment, counting
    /// both committed history and open transactions in the verified pool.
    #[error("voter {0} has no claim tickets left")]
    NotEnoughClaimTickets(String),

    /// The claim ticket id already appears in committed chain history.
    #[error("claim ticket {0} has already been used")]
    UsedClaimTicket(Uuid),

    /// The ballot does not conform to the election template.
    #[error("invalid ballot: {0}")]
    InvalidBallot(String),

    /// The previous/new state tags are not an allowed transition for this
    /// committee.
    #[error("invalid state transition {from} -> {to}")]
    InvalidTransition { from: StateTag, to: StateTag },

    /// Another transaction with the same content identity and an earlier
    /// timestamp exists in this round.
    #[error("conflicting transaction with earlier timestamp")]
    ConflictingTransaction,
}
