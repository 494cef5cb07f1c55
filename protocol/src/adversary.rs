//! # Adversary Strategies
//!
//! Misbehavior in Civitas is configuration, not taxonomy. A node's
//! [`Strategy`] composes four independent policies (how it signs, whether it
//! participates in consensus, whether it honors issuance checks, and what
//! kind of ballots it builds), so a single node type covers every committee
//! member from fully honest to arbitrarily combined faults.
//!
//! The protocol never branches on these flags to protect itself; honest
//! nodes neutralize each behavior through ordinary validation. The flags are
//! observational, used by drivers and tests to know which replicas to read
//! results from.

use crate::crypto::{KeyError, MessageSigner, NodeKeypair, NodePublicKey, NodeSignature};

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// How a node produces signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SigningPolicy {
    /// Sign with the node's enrolled key.
    #[default]
    Honest,
    /// Sign every message with a freshly generated key while advertising the
    /// enrolled identity. Forged signatures: verification fails everywhere.
    RotateKey,
    /// No access to any private key; the "signature" is the message bytes
    /// echoed back.
    EchoMessage,
}

/// Whether a node takes part in consensus rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Participation {
    /// Validate, tally, and broadcast normally.
    #[default]
    Active,
    /// Contribute nothing: no pool broadcast, no validation votes, no tally
    /// broadcast. Denial of service by absence.
    Silent,
}

/// Whether an Authenticator honors roll and allotment checks at issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IssuancePolicy {
    /// Check the roll and the remaining-ticket budget.
    #[default]
    Checked,
    /// Issue to anyone, any number of times.
    Bypass,
}

/// What kind of ballots a Tabulator hands to voters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BallotPolicy {
    /// Working copies of the finalized template.
    #[default]
    Template,
    /// Template copies extended with arbitrary write-ins.
    Forge(Vec<WriteIn>),
}

/// One write-in a forging Tabulator splices into every ballot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteIn {
    /// Position to stuff. An existing position gains an extra choice; an
    /// unknown one is invented outright.
    pub position: String,
    /// Candidate name to select.
    pub candidate: String,
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// A node's composed behavior profile.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Strategy {
    pub signing: SigningPolicy,
    pub participation: Participation,
    pub issuance: IssuancePolicy,
    pub balloting: BallotPolicy,
}

impl Strategy {
    /// The all-defaults honest profile.
    pub fn honest() -> Self {
        Self::default()
    }

    /// Signs everything with throwaway keys. Models an out-of-network
    /// impersonator or a node whose key material drifts.
    pub fn key_rotating() -> Self {
        Self {
            signing: SigningPolicy::RotateKey,
            ..Self::default()
        }
    }

    /// Issues claim tickets to anyone without real signatures. Models a
    /// compromised Authenticator front end.
    pub fn auth_bypass() -> Self {
        Self {
            signing: SigningPolicy::EchoMessage,
            issuance: IssuancePolicy::Bypass,
            ..Self::default()
        }
    }

    /// Stops participating in consensus rounds entirely.
    pub fn silent() -> Self {
        Self {
            participation: Participation::Silent,
            ..Self::default()
        }
    }

    /// Builds ballots with the given write-ins spliced in.
    pub fn ballot_forger(write_ins: Vec<WriteIn>) -> Self {
        Self {
            balloting: BallotPolicy::Forge(write_ins),
            ..Self::default()
        }
    }

    /// True iff any policy deviates from the honest default.
    pub fn is_adversarial(&self) -> bool {
        *self != Self::honest()
    }
}

// ---------------------------------------------------------------------------
// StrategySigner
// ---------------------------------------------------------------------------

/// A [`MessageSigner`] that applies a node's signing policy.
///
/// Borrowing the keypair (rather than the whole node) lets consensus code
/// sign block headers while other node fields are mutably borrowed.
pub struct StrategySigner<'a> {
    keypair: &'a NodeKeypair,
    policy: SigningPolicy,
}

impl<'a> StrategySigner<'a> {
    pub fn new(keypair: &'a NodeKeypair, policy: SigningPolicy) -> Self {
        Self { keypair, policy }
    }
}

impl MessageSigner for StrategySigner<'_> {
    fn signer_identity(&self) -> NodePublicKey {
        // All policies advertise the enrolled identity; forgery lives in the
        // signature, not the claimed key.
        self.keypair.public_key().clone()
    }

    fn sign_message(&self, message: &[u8]) -> Result<NodeSignature, KeyError> {
        match self.policy {
            SigningPolicy::Honest => self.keypair.sign(message),
            SigningPolicy::RotateKey => NodeKeypair::generate()?.sign(message),
            SigningPolicy::EchoMessage => Ok(NodeSignature::from_bytes(message.to_vec())),
        }
    }
}
