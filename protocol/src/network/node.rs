//! # Committee Nodes
//!
//! A [`Node`] is one member of one committee: an identity keypair, a peer
//! directory, a verified and a rejected transaction pool, per-round
//! consensus state, and a full blockchain replica. The same type serves both
//! committees; the [`NodeRole`] decides which content rules apply.
//!
//! Three behavior sets live on a node:
//!
//! - **admission** (this module): screening transactions that arrive by
//!   broadcast, classifying failures into the admission error kinds;
//! - **content operations** (this module): issuing claim tickets on
//!   Authenticators, accepting votes on Tabulators;
//! - **consensus participation** (`network::consensus`): the four-phase
//!   round behavior.
//!
//! Broadcast is direct synchronous delivery: "send to peer" appends to the
//! peer's pools before the call returns. Peer directories hold weak
//! references so the committee (which owns the nodes) can be dropped
//! without leaking reference cycles.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Weak};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::adversary::{BallotPolicy, IssuancePolicy, Participation, Strategy, StrategySigner};
use crate::crypto::{BlockHash, KeyError, NodeKeypair, NodePublicKey};
use crate::election::{Ballot, BallotError, ClaimTicket, Voter, VoterRoll};
use crate::error::AdmissionError;
use crate::ledger::{Blockchain, ChainError, EligibilityLedger, LedgerState, TallyLedger};
use crate::transaction::{StateTag, Transaction, TxContent};

/// A committee-owned node replica, shared behind a per-node lock.
///
/// The lock is held across a whole consensus phase; the driver's barrier
/// schedule means no cross-node lock ordering is ever required.
pub type SharedNode = Arc<RwLock<Node>>;

/// Errors surfaced by voter-facing node operations.
///
/// Admission rejections of broadcast traffic never reach a caller; these
/// errors exist for `generate_claim_ticket` and `vote`, where the voter at
/// the booth has to learn why they were turned away.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Ballot(#[from] BallotError),

    #[error("claim ticket has expired")]
    TicketExpired,

    #[error("operation requires a {expected} node")]
    WrongRole { expected: &'static str },
}

// ---------------------------------------------------------------------------
// NodeRole
// ---------------------------------------------------------------------------

/// Which committee a node serves, and the static context that committee
/// validates against.
#[derive(Debug, Clone)]
pub enum NodeRole {
    /// Authenticates voters against the roll and issues claim tickets.
    Authenticator {
        roll: VoterRoll,
    },
    /// Accepts ballots against claim tickets issued by trusted
    /// Authenticators.
    Tabulator {
        template: Ballot,
        /// Public identities of the Authenticator committee. Ticket
        /// signatures are only meaningful against keys on this list.
        trusted_issuers: HashSet<NodePublicKey>,
    },
}

impl NodeRole {
    fn initial_state(&self) -> LedgerState {
        match self {
            Self::Authenticator { roll } => {
                LedgerState::Eligibility(EligibilityLedger::from_roll(roll))
            }
            Self::Tabulator { template, .. } => {
                LedgerState::Tally(TallyLedger::from_template(template))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// One committee member.
#[derive(Debug)]
pub struct Node {
    pub(crate) keypair: NodeKeypair,
    pub(crate) identity: NodePublicKey,
    pub(crate) strategy: Strategy,
    pub(crate) role: NodeRole,
    pub(crate) peers: HashMap<NodePublicKey, Weak<RwLock<Node>>>,
    pub(crate) verified_pool: HashSet<Transaction>,
    pub(crate) rejected_pool: HashSet<Transaction>,
    pub(crate) tally: HashMap<Transaction, u32>,
    pub(crate) round_identities: HashMap<String, Transaction>,
    pub(crate) rejection_reasons: HashMap<Transaction, String>,
    pub(crate) last_round_approvals: HashSet<Transaction>,
    pub(crate) last_round_rejections: HashSet<Transaction>,
    pub(crate) chain: Blockchain,
}

impl Node {
    /// Creates a node with a fresh keypair and a genesis block carrying the
    /// role's initial ledger state. All replicas of a committee must share
    /// `genesis_at` so their genesis hashes agree.
    pub fn new(
        role: NodeRole,
        strategy: Strategy,
        genesis_at: DateTime<Utc>,
    ) -> Result<Self, NodeError> {
        let keypair = NodeKeypair::generate()?;
        let identity = keypair.public_key().clone();
        let chain = Blockchain::bootstrap(role.initial_state(), genesis_at, &keypair)?;
        Ok(Self {
            keypair,
            identity,
            strategy,
            role,
            peers: HashMap::new(),
            verified_pool: HashSet::new(),
            rejected_pool: HashSet::new(),
            tally: HashMap::new(),
            round_identities: HashMap::new(),
            rejection_reasons: HashMap::new(),
            last_round_approvals: HashSet::new(),
            last_round_rejections: HashSet::new(),
            chain,
        })
    }

    /// Installs the peer directory. The node's own entry, if present, is
    /// dropped: a node is not its own peer.
    pub fn set_peers(&mut self, mut peers: HashMap<NodePublicKey, Weak<RwLock<Node>>>) {
        peers.remove(&self.identity);
        self.peers = peers;
    }

    /// The roster identity this node advertises.
    pub fn identity(&self) -> &NodePublicKey {
        &self.identity
    }

    pub fn role(&self) -> &NodeRole {
        &self.role
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Observational only; the protocol never branches on it.
    pub fn is_adversary(&self) -> bool {
        self.strategy.is_adversarial()
    }

    /// Whether this node takes part in consensus rounds.
    pub fn participates(&self) -> bool {
        self.strategy.participation == Participation::Active
    }

    pub fn chain(&self) -> &Blockchain {
        &self.chain
    }

    pub fn head_hash(&self) -> BlockHash {
        self.chain.head_hash()
    }

    pub fn verified_pool(&self) -> &HashSet<Transaction> {
        &self.verified_pool
    }

    pub fn rejected_pool(&self) -> &HashSet<Transaction> {
        &self.rejected_pool
    }

    /// Transactions committed in the most recent round.
    pub fn last_round_approvals(&self) -> &HashSet<Transaction> {
        &self.last_round_approvals
    }

    /// Transactions that failed to reach the agreement threshold in the most
    /// recent round.
    pub fn last_round_rejections(&self) -> &HashSet<Transaction> {
        &self.last_round_rejections
    }

    /// Why each transaction was voted down this round.
    pub fn rejection_reasons(&self) -> &HashMap<Transaction, String> {
        &self.rejection_reasons
    }

    /// Signer that applies this node's signing policy.
    pub(crate) fn strategy_signer(&self) -> StrategySigner<'_> {
        StrategySigner::new(&self.keypair, self.strategy.signing)
    }

    /// Whether `key` belongs to this committee, counting the node itself.
    pub fn recognizes(&self, key: &NodePublicKey) -> bool {
        *key == self.identity || self.peers.contains_key(key)
    }

    // -----------------------------------------------------------------------
    // Admission
    // -----------------------------------------------------------------------

    /// Admits a broadcast transaction into the verified pool, or files it in
    /// the rejected pool. Idempotent: re-admitting an equal transaction is a
    /// no-op. Returns whether the transaction is (now) verified.
    pub fn admit(&mut self, tx: Transaction) -> bool {
        if self.verified_pool.contains(&tx) {
            return true;
        }
        match self.screen(&tx) {
            Ok(()) => {
                debug!(node = %self.identity, %tx, "transaction admitted");
                self.verified_pool.insert(tx);
                true
            }
            Err(err) => {
                debug!(node = %self.identity, %tx, %err, "transaction rejected at admission");
                self.rejected_pool.insert(tx);
                false
            }
        }
    }

    /// Full screening: issuer membership, signature, then content rules.
    pub(crate) fn screen(&self, tx: &Transaction) -> Result<(), AdmissionError> {
        if !self.recognizes(tx.issuer()) {
            return Err(AdmissionError::UnrecognizedNode);
        }
        if !tx.verify_signature() {
            return Err(AdmissionError::BadSignature);
        }
        self.validate_content(tx)
    }

    /// Committee-specific content validation.
    pub(crate) fn validate_content(&self, tx: &Transaction) -> Result<(), AdmissionError> {
        match (&self.role, tx.content()) {
            (NodeRole::Authenticator { .. }, TxContent::Voter(voter)) => {
                self.validate_retrieval(tx, voter)
            }
            (
                NodeRole::Tabulator {
                    template,
                    trusted_issuers,
                },
                TxContent::Ballot { ballot, ticket },
            ) => Self::validate_ballot_usage(&self.chain, template, trusted_issuers, tx, ballot, ticket),
            // Content from the other committee never has a legal transition
            // here.
            _ => Err(AdmissionError::InvalidTransition {
                from: tx.previous_state(),
                to: tx.new_state(),
            }),
        }
    }

    fn validate_retrieval(&self, tx: &Transaction, voter: &Voter) -> Result<(), AdmissionError> {
        let eligibility = self.eligibility();
        if !eligibility.contains(&voter.id) {
            return Err(AdmissionError::UnknownVoter(voter.id.clone()));
        }
        if self.claim_budget_exhausted(&voter.id) {
            return Err(AdmissionError::NotEnoughClaimTickets(voter.id.clone()));
        }
        if (tx.previous_state(), tx.new_state()) != (StateTag::NotRetrieved, StateTag::Retrieved) {
            return Err(AdmissionError::InvalidTransition {
                from: tx.previous_state(),
                to: tx.new_state(),
            });
        }
        Ok(())
    }

    fn validate_ballot_usage(
        chain: &Blockchain,
        template: &Ballot,
        trusted_issuers: &HashSet<NodePublicKey>,
        tx: &Transaction,
        ballot: &Ballot,
        ticket: &ClaimTicket,
    ) -> Result<(), AdmissionError> {
        if !trusted_issuers.contains(ticket.issuer()) {
            return Err(AdmissionError::UnrecognizedNode);
        }
        if !ticket.verify() {
            return Err(AdmissionError::BadSignature);
        }
        if chain.ticket_spent(ticket.id()) {
            return Err(AdmissionError::UsedClaimTicket(*ticket.id()));
        }
        template
            .conforms(ballot)
            .map_err(AdmissionError::InvalidBallot)?;
        if (tx.previous_state(), tx.new_state()) != (StateTag::Created, StateTag::Used) {
            return Err(AdmissionError::InvalidTransition {
                from: tx.previous_state(),
                to: tx.new_state(),
            });
        }
        Ok(())
    }

    /// Committed remaining tickets minus open retrievals in the verified
    /// pool. Open transactions leave the pool when a round commits them, so
    /// the pending window closes at the round boundary.
    fn claim_budget_exhausted(&self, voter_id: &str) -> bool {
        let committed = self.eligibility().remaining(voter_id).unwrap_or(0) as usize;
        committed <= self.pending_retrievals(voter_id)
    }

    fn pending_retrievals(&self, voter_id: &str) -> usize {
        self.verified_pool
            .iter()
            .filter(|tx| matches!(tx.content(), TxContent::Voter(v) if v.id == voter_id))
            .count()
    }

    fn eligibility(&self) -> &EligibilityLedger {
        self.chain
            .state()
            .as_eligibility()
            .expect("an authenticator replica always tracks an eligibility ledger")
    }

    // -----------------------------------------------------------------------
    // Authenticator operations
    // -----------------------------------------------------------------------

    /// Authenticates a voter, issues a signed claim ticket, and broadcasts
    /// the corresponding retrieval transaction to every peer.
    ///
    /// Errors return to the caller: the voter standing at the booth needs to
    /// know they were refused, and why.
    pub fn generate_claim_ticket(&mut self, voter_id: &str) -> Result<ClaimTicket, NodeError> {
        let bypass = self.strategy.issuance == IssuancePolicy::Bypass;
        let voter = match &self.role {
            NodeRole::Authenticator { roll } => match roll.get(voter_id) {
                Some(voter) => voter.clone(),
                // A bypassing booth vouches for anyone; honest peers will
                // reject the broadcast as UnknownVoter.
                None if bypass => Voter {
                    id: voter_id.to_string(),
                    name: voter_id.to_string(),
                    allotted_tickets: 0,
                },
                None => {
                    warn!(node = %self.identity, voter = voter_id, "voter not on roll");
                    return Err(AdmissionError::UnknownVoter(voter_id.to_string()).into());
                }
            },
            NodeRole::Tabulator { .. } => {
                return Err(NodeError::WrongRole {
                    expected: "authenticator",
                })
            }
        };

        if !bypass && self.claim_budget_exhausted(voter_id) {
            warn!(node = %self.identity, voter = voter_id, "claim ticket budget exhausted");
            return Err(AdmissionError::NotEnoughClaimTickets(voter_id.to_string()).into());
        }

        let ticket = {
            let signer = self.strategy_signer();
            ClaimTicket::issue(&signer)?
        };
        let tx = {
            let signer = self.strategy_signer();
            Transaction::voter_retrieval(voter, &signer)?
        };

        info!(
            node = %self.identity,
            voter = voter_id,
            ticket = %ticket.id(),
            "issued claim ticket"
        );
        self.verified_pool.insert(tx.clone());
        self.broadcast(&tx);
        Ok(ticket)
    }

    // -----------------------------------------------------------------------
    // Tabulator operations
    // -----------------------------------------------------------------------

    /// Accepts a voter's selections against a claim ticket: validates the
    /// ticket locally, fills a working copy of the template, signs the
    /// ballot transaction, and broadcasts it.
    ///
    /// Ticket-validation errors return to the caller. Peer-side rejections
    /// of the broadcast do not; the committee settles those in the next
    /// round.
    pub fn vote(
        &mut self,
        ticket: ClaimTicket,
        selections: &BTreeMap<String, Vec<usize>>,
    ) -> Result<(), NodeError> {
        let template = match &self.role {
            NodeRole::Tabulator {
                template,
                trusted_issuers,
            } => {
                if !trusted_issuers.contains(ticket.issuer()) {
                    warn!(node = %self.identity, ticket = %ticket.id(), "ticket issuer not trusted");
                    return Err(AdmissionError::UnrecognizedNode.into());
                }
                template.clone()
            }
            NodeRole::Authenticator { .. } => {
                return Err(NodeError::WrongRole {
                    expected: "tabulator",
                })
            }
        };
        if !ticket.verify() {
            warn!(node = %self.identity, ticket = %ticket.id(), "ticket signature invalid");
            return Err(AdmissionError::BadSignature.into());
        }
        if ticket.is_expired() {
            warn!(node = %self.identity, ticket = %ticket.id(), "ticket expired");
            return Err(NodeError::TicketExpired);
        }
        if self.chain.ticket_spent(ticket.id()) {
            warn!(node = %self.identity, ticket = %ticket.id(), "ticket already spent");
            return Err(AdmissionError::UsedClaimTicket(*ticket.id()).into());
        }

        let mut ballot = template.working_copy();
        ballot.fill(selections)?;

        if let BallotPolicy::Forge(write_ins) = &self.strategy.balloting {
            for write_in in write_ins {
                match ballot.add_choice(&write_in.position, write_in.candidate.clone()) {
                    Some(index) => ballot.select(&write_in.position, vec![index])?,
                    None => {
                        ballot.add_item(
                            write_in.position.clone(),
                            "write-in",
                            vec![write_in.candidate.clone()],
                            1,
                        );
                        ballot.select(&write_in.position, vec![0])?;
                    }
                }
            }
        }

        let tx = {
            let signer = self.strategy_signer();
            Transaction::ballot_usage(ballot, ticket, &signer)?
        };

        info!(node = %self.identity, %tx, "ballot cast");
        self.verified_pool.insert(tx.clone());
        self.broadcast(&tx);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Broadcast
    // -----------------------------------------------------------------------

    /// Delivers a transaction to every live peer. Synchronous: each peer has
    /// admitted or rejected the transaction before this returns.
    fn broadcast(&self, tx: &Transaction) {
        for peer in self.peers.values() {
            if let Some(peer) = peer.upgrade() {
                peer.write().admit(tx.clone());
            }
        }
    }
}
