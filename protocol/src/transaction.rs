//! # Transactions
//!
//! A transaction records one state change for one piece of election content
//! and carries the issuing node's signature over the canonical encoding of
//! `(content, previous state, new state, timestamp?)`, with the claim-ticket
//! id appended for ballot transactions.
//!
//! Two variants exist, tagged by content:
//!
//! - **VoterTx**: a voter retrieved a claim ticket
//!   (`NotRetrieved -> Retrieved`), recorded on the Authenticator ledger.
//! - **BallotTx**: a filled ballot was cast against a claim ticket
//!   (`Created -> Used`), recorded on the Tabulator ledger.
//!
//! Transactions are equal iff their signatures are equal, and the signature
//! bytes are the hash key. PSS signing is randomized, so a signature pins
//! one concrete signing event; copies of a transaction stay equal, re-issued
//! ones do not.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::crypto::{KeyError, MessageSigner, NodePublicKey, NodeSignature};
use crate::election::{Ballot, ClaimTicket, Voter};
use crate::encoding::{format_minute, push_field, Canonical, CanonicalOpts};

// ---------------------------------------------------------------------------
// StateTag
// ---------------------------------------------------------------------------

/// Lifecycle tags for transaction content.
///
/// The voter-side pair is `NotRetrieved -> Retrieved`; the ballot-side pair
/// is `Created -> Used`. Each committee admits exactly its own pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateTag {
    /// Voter has not yet retrieved a claim ticket.
    NotRetrieved,
    /// Voter has retrieved a claim ticket.
    Retrieved,
    /// Ballot exists as an unused instance of the template.
    Created,
    /// Ballot has been filled out and cast.
    Used,
}

impl StateTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotRetrieved => "not_retrieved",
            Self::Retrieved => "retrieved",
            Self::Created => "created",
            Self::Used => "used",
        }
    }
}

impl fmt::Display for StateTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TxContent
// ---------------------------------------------------------------------------

/// The content whose state a transaction advances.
#[derive(Debug, Clone)]
pub enum TxContent {
    /// A voter on the eligibility ledger.
    Voter(Voter),
    /// A filled ballot bound to its claim ticket.
    Ballot {
        ballot: Ballot,
        ticket: ClaimTicket,
    },
}

impl TxContent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Voter(_) => "voter",
            Self::Ballot { .. } => "ballot",
        }
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A signed state transition over election content.
#[derive(Debug, Clone)]
pub struct Transaction {
    content: TxContent,
    issuer: NodePublicKey,
    previous_state: StateTag,
    new_state: StateTag,
    timestamp: Option<DateTime<Utc>>,
    signing_opts: CanonicalOpts,
    signature: NodeSignature,
}

impl Transaction {
    /// Builds and signs a transaction. The signature covers the canonical
    /// tuple under `signing_opts`, which therefore becomes part of the
    /// transaction so verifiers can reproduce the exact signed bytes.
    pub fn new(
        content: TxContent,
        previous_state: StateTag,
        new_state: StateTag,
        timestamp: Option<DateTime<Utc>>,
        signing_opts: CanonicalOpts,
        signer: &dyn MessageSigner,
    ) -> Result<Self, KeyError> {
        let payload = signature_payload(
            &content,
            previous_state,
            new_state,
            timestamp.as_ref(),
            signing_opts,
        );
        let signature = signer.sign_message(&payload)?;
        Ok(Self {
            content,
            issuer: signer.signer_identity(),
            previous_state,
            new_state,
            timestamp,
            signing_opts,
            signature,
        })
    }

    /// A voter retrieved a claim ticket.
    pub fn voter_retrieval(voter: Voter, signer: &dyn MessageSigner) -> Result<Self, KeyError> {
        Self::new(
            TxContent::Voter(voter),
            StateTag::NotRetrieved,
            StateTag::Retrieved,
            Some(Utc::now()),
            CanonicalOpts::filled(),
            signer,
        )
    }

    /// A filled ballot was cast against a claim ticket. The signature covers
    /// the filled encoding, selections included.
    pub fn ballot_usage(
        ballot: Ballot,
        ticket: ClaimTicket,
        signer: &dyn MessageSigner,
    ) -> Result<Self, KeyError> {
        Self::new(
            TxContent::Ballot { ballot, ticket },
            StateTag::Created,
            StateTag::Used,
            Some(Utc::now()),
            CanonicalOpts::filled(),
            signer,
        )
    }

    pub fn content(&self) -> &TxContent {
        &self.content
    }

    /// Public identity the transaction claims as its issuer.
    pub fn issuer(&self) -> &NodePublicKey {
        &self.issuer
    }

    pub fn previous_state(&self) -> StateTag {
        self.previous_state
    }

    pub fn new_state(&self) -> StateTag {
        self.new_state
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    pub fn signature(&self) -> &NodeSignature {
        &self.signature
    }

    /// Re-derives the signed bytes and checks the signature against the
    /// claimed issuer key.
    pub fn verify_signature(&self) -> bool {
        let payload = signature_payload(
            &self.content,
            self.previous_state,
            self.new_state,
            self.timestamp.as_ref(),
            self.signing_opts,
        );
        self.issuer.verify(&payload, &self.signature)
    }

    /// The identity used for conflict resolution during a consensus round.
    ///
    /// Voter transactions conflict per voter; ballot transactions conflict
    /// per claim ticket. Ballot content alone is not an identity: two voters
    /// casting identical selections are distinct, legitimate votes.
    pub fn content_identity(&self) -> String {
        match &self.content {
            TxContent::Voter(voter) => format!("voter/{}", voter.id),
            TxContent::Ballot { ticket, .. } => format!("ticket/{}", ticket.id()),
        }
    }

    /// Deterministic conflict ordering: earlier timestamp wins, signature
    /// bytes break exact ties. Every replica picks the same winner no
    /// matter the order transactions arrived in.
    pub fn precedes(&self, other: &Transaction) -> bool {
        (self.timestamp, self.signature.as_bytes()) < (other.timestamp, other.signature.as_bytes())
    }
}

fn signature_payload(
    content: &TxContent,
    previous_state: StateTag,
    new_state: StateTag,
    timestamp: Option<&DateTime<Utc>>,
    opts: CanonicalOpts,
) -> Vec<u8> {
    let mut buf = match content {
        TxContent::Voter(voter) => voter.canonical(opts),
        TxContent::Ballot { ballot, .. } => ballot.canonical(opts),
    };
    push_field(&mut buf, previous_state.as_str().as_bytes());
    push_field(&mut buf, new_state.as_str().as_bytes());
    if let Some(at) = timestamp {
        push_field(&mut buf, format_minute(at).as_bytes());
    }
    if let TxContent::Ballot { ticket, .. } = content {
        push_field(&mut buf, &ticket.canonical(opts));
    }
    buf
}

impl PartialEq for Transaction {
    /// Two transactions are the same transaction iff their signatures match.
    fn eq(&self, other: &Self) -> bool {
        self.signature == other.signature
    }
}

impl Eq for Transaction {}

impl Hash for Transaction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.signature.hash(state);
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tx {} -> {} ({})",
            self.content.kind(),
            self.previous_state,
            self.new_state,
            crate::crypto::short_hex(self.signature.as_bytes()),
        )
    }
}
