//! # Consensus Participation
//!
//! The per-node half of the round protocol, in the Ripple/PBFT family:
//! federated agreement across a known committee, no leader, an 80%
//! approval threshold per transaction. A round is four phases:
//!
//! ```text
//! A  peer agreement      compare head hashes, form the peer set
//! B  broadcast & vote    exchange verified pools, validate, tally 0/1
//! C  tally aggregation   exchange tallies, sum votes for known txs
//! D  commit              threshold check, append one block
//! ```
//!
//! The committee driver owns the barrier schedule (`network::driver`); this
//! module implements what a single node does inside each phase.
//!
//! Two properties carry all the adversary tolerance:
//!
//! - a node's phase-B vote is an idempotent assignment (1 for valid, 0 with
//!   a reason for invalid), so replaying a transaction never inflates its
//!   count; and
//! - phase C only aggregates counts for transactions the recipient already
//!   voted on, so a minority cannot inject state the majority never saw.
//!
//! Conflicting transactions (same voter, or same claim ticket) are settled
//! deterministically: earliest timestamp wins, signature bytes break exact
//! ties, and the loser is voted down with a recorded reason. The rule runs
//! on every transaction that passes validation, including ones already
//! sitting in the local pool; a double spend where both halves got admitted
//! before either committed must still lose one of them.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config;
use crate::crypto::{short_hex, BlockHash};
use crate::error::AdmissionError;
use crate::network::node::{Node, NodeError};
use crate::transaction::Transaction;

/// What one node committed at the end of a round.
#[derive(Debug, Clone)]
pub struct RoundOutcome {
    /// Transactions committed into the new block.
    pub approved: usize,
    /// Transactions that failed to reach the threshold.
    pub rejected: usize,
    /// Head hash after the commit.
    pub head: BlockHash,
}

impl Node {
    // -----------------------------------------------------------------------
    // Phase A
    // -----------------------------------------------------------------------

    /// Peers whose current head hash equals this node's. Forked or
    /// out-of-network replicas drop out of the round here.
    pub fn peers_in_agreement(&self) -> Vec<crate::crypto::NodePublicKey> {
        let own = self.chain.head_hash();
        self.peers
            .iter()
            .filter_map(|(id, peer)| {
                let peer = peer.upgrade()?;
                let agrees = peer.read().chain.head_hash() == own;
                agrees.then(|| id.clone())
            })
            .collect()
    }

    /// Resets per-round state. The previous round's observables
    /// (approvals, rejections, reasons) stay readable up to this point.
    pub fn begin_round(&mut self) {
        self.tally.clear();
        self.round_identities.clear();
        self.rejection_reasons.clear();
        self.last_round_approvals.clear();
        self.last_round_rejections.clear();
    }

    // -----------------------------------------------------------------------
    // Phase B
    // -----------------------------------------------------------------------

    /// Snapshot of the verified pool for broadcasting.
    pub fn verified_snapshot(&self) -> Vec<Transaction> {
        self.verified_pool.iter().cloned().collect()
    }

    /// Receives a peer's candidate set and votes on each transaction.
    ///
    /// Transactions already in the local verified pool count as valid
    /// without re-running content validation; everything else goes through
    /// the full admission screen. Every valid transaction then passes
    /// through conflict resolution.
    pub fn validate_transactions_for_consensus(&mut self, transactions: &[Transaction]) {
        if !self.participates() {
            return;
        }
        for tx in transactions {
            let verdict = if self.verified_pool.contains(tx) {
                Ok(())
            } else {
                self.screen(tx)
            };
            match verdict {
                Ok(()) => self.tally_valid(tx),
                Err(err) => {
                    debug!(node = %self.identity, %tx, %err, "consensus vote: invalid");
                    self.rejection_reasons.insert(tx.clone(), err.to_string());
                    self.tally.insert(tx.clone(), 0);
                }
            }
        }
    }

    /// Records a positive vote, demoting whichever side of a content-identity
    /// conflict loses the timestamp race.
    fn tally_valid(&mut self, tx: &Transaction) {
        let identity = tx.content_identity();
        match self.round_identities.get(&identity).cloned() {
            None => {
                self.round_identities.insert(identity, tx.clone());
                self.tally.insert(tx.clone(), 1);
            }
            Some(existing) if existing == *tx => {
                self.tally.insert(tx.clone(), 1);
            }
            Some(existing) => {
                let conflict = AdmissionError::ConflictingTransaction.to_string();
                if tx.precedes(&existing) {
                    debug!(node = %self.identity, loser = %existing, winner = %tx, "conflict: earlier transaction wins");
                    self.tally.insert(existing.clone(), 0);
                    self.rejection_reasons.insert(existing, conflict);
                    self.round_identities.insert(identity, tx.clone());
                    self.tally.insert(tx.clone(), 1);
                } else {
                    debug!(node = %self.identity, loser = %tx, winner = %existing, "conflict: earlier transaction wins");
                    self.tally.insert(tx.clone(), 0);
                    self.rejection_reasons.insert(tx.clone(), conflict);
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Phase C
    // -----------------------------------------------------------------------

    /// This node's votes, as broadcast to its peer set.
    pub fn tally_snapshot(&self) -> HashMap<Transaction, u32> {
        self.tally.clone()
    }

    /// Adds a peer's votes to the local tally, but only for transactions
    /// this node already voted on. Unknown transactions cannot be smuggled
    /// in through aggregation.
    pub fn aggregate_tally(&mut self, incoming: &HashMap<Transaction, u32>) {
        if !self.participates() {
            return;
        }
        for (tx, votes) in incoming {
            if let Some(count) = self.tally.get_mut(tx) {
                *count += votes;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Phase D
    // -----------------------------------------------------------------------

    /// Commits every transaction whose approval ratio reaches the minimum
    /// agreement, appends the round's block (possibly empty), and clears
    /// round state.
    ///
    /// The denominator is the peer set plus this node; the node's own vote
    /// entered the tally exactly once in phase B.
    pub fn finalize_round(
        &mut self,
        peer_count: usize,
        at: DateTime<Utc>,
    ) -> Result<RoundOutcome, NodeError> {
        let network_size = (peer_count + 1) as f64;
        let mut approvals = Vec::new();
        for (tx, votes) in &self.tally {
            if f64::from(*votes) / network_size >= config::MINIMUM_AGREEMENT_PCT {
                approvals.push(tx.clone());
                self.last_round_approvals.insert(tx.clone());
            } else {
                self.last_round_rejections.insert(tx.clone());
            }
        }

        // Approved transactions leave both pools; everything else that was
        // up for a vote moves to the rejected pool so a later round does not
        // blindly re-certify it.
        for tx in &approvals {
            self.verified_pool.remove(tx);
            self.rejected_pool.remove(tx);
        }
        for tx in &self.last_round_rejections {
            if self.verified_pool.remove(tx) {
                self.rejected_pool.insert(tx.clone());
            }
        }

        let signer =
            crate::adversary::StrategySigner::new(&self.keypair, self.strategy.signing);
        self.chain.commit(approvals, at, &signer)?;

        let outcome = RoundOutcome {
            approved: self.last_round_approvals.len(),
            rejected: self.last_round_rejections.len(),
            head: self.chain.head_hash(),
        };

        self.tally.clear();
        self.round_identities.clear();

        info!(
            node = %self.identity,
            approved = outcome.approved,
            rejected = outcome.rejected,
            head = %short_hex(&outcome.head),
            "round finalized"
        );
        Ok(outcome)
    }
}
