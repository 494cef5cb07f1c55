//! # Committee Driver
//!
//! A [`Committee`] owns one committee's node replicas and runs the
//! barrier-synchronous consensus schedule: phase A for every node, then B
//! for every node, then C, then D. No node observes a later phase's effects
//! while an earlier phase is still in flight anywhere, which is what makes
//! the per-transaction vote arithmetic exact:
//!
//! - peer sets are computed for all nodes before any pool is exchanged;
//! - phase-C tallies are snapshotted for all nodes before any delivery, so
//!   one node's votes can never cascade through another's aggregation;
//! - one shared timestamp stamps every replica's phase-D block, so replica
//!   hashes cannot be split by a minute boundary mid-round.
//!
//! The driver holds no consensus state of its own beyond the node list; a
//! node that drops out of agreement simply stops appearing in peer sets.

use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::config;
use crate::crypto::{short_hex, NodePublicKey};
use crate::ledger::LedgerState;
use crate::network::node::{Node, NodeError, SharedNode};

/// Summary of one committee round, read from an honest replica.
#[derive(Debug, Clone)]
pub struct RoundReport {
    /// Transactions committed by honest replicas.
    pub approved: usize,
    /// Transactions voted down by honest replicas.
    pub rejected: usize,
    /// Distinct rejection reasons recorded this round.
    pub reasons: Vec<String>,
}

/// One committee: a named, fully connected set of node replicas.
pub struct Committee {
    name: String,
    nodes: Vec<SharedNode>,
    directory: HashMap<NodePublicKey, SharedNode>,
}

impl Committee {
    /// Wires `nodes` into a fully connected committee. Every node receives
    /// a peer directory holding weak references to every other node.
    pub fn new(name: impl Into<String>, nodes: Vec<Node>) -> Self {
        let nodes: Vec<SharedNode> = nodes
            .into_iter()
            .map(|n| Arc::new(RwLock::new(n)))
            .collect();
        let directory: HashMap<NodePublicKey, SharedNode> = nodes
            .iter()
            .map(|n| (n.read().identity().clone(), Arc::clone(n)))
            .collect();
        for node in &nodes {
            let peers = directory
                .iter()
                .map(|(id, arc)| (id.clone(), Arc::downgrade(arc)))
                .collect();
            // set_peers drops the node's own entry.
            node.write().set_peers(peers);
        }
        Self {
            name: name.into(),
            nodes,
            directory,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &[SharedNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: usize) -> &SharedNode {
        &self.nodes[index]
    }

    /// First honest replica, the canonical read point for results.
    pub fn honest_node(&self) -> Option<&SharedNode> {
        self.nodes.iter().find(|n| !n.read().is_adversary())
    }

    /// Runs one full consensus round across the committee.
    pub fn run_round(&self) -> Result<RoundReport, NodeError> {
        info!(committee = %self.name, nodes = self.nodes.len(), "consensus round starting");

        // Phase A: every node forms its peer set against current heads,
        // before anyone commits anything.
        let peer_sets: Vec<Vec<NodePublicKey>> = self
            .nodes
            .iter()
            .map(|n| n.read().peers_in_agreement())
            .collect();
        for node in &self.nodes {
            node.write().begin_round();
        }

        // Phase B: candidate sets travel to the peer set. The sender also
        // processes its own snapshot, so every pooled transaction holds a
        // tally entry (its own vote) even before any peer echoes it back.
        for (node, peers) in self.nodes.iter().zip(&peer_sets) {
            let (snapshot, active) = {
                let guard = node.read();
                (guard.verified_snapshot(), guard.participates())
            };
            if !active {
                continue;
            }
            node.write().validate_transactions_for_consensus(&snapshot);
            for peer_id in peers {
                if let Some(peer) = self.directory.get(peer_id) {
                    peer.write().validate_transactions_for_consensus(&snapshot);
                }
            }
        }

        // Phase C: snapshot all tallies first, then deliver. Aggregating
        // in place would let early deliveries inflate later broadcasts.
        let tallies: Vec<_> = self
            .nodes
            .iter()
            .map(|n| n.read().tally_snapshot())
            .collect();
        for ((node, peers), tally) in self.nodes.iter().zip(&peer_sets).zip(&tallies) {
            if !node.read().participates() {
                continue;
            }
            for peer_id in peers {
                if let Some(peer) = self.directory.get(peer_id) {
                    peer.write().aggregate_tally(tally);
                }
            }
        }

        // Phase D: every node commits against its own peer-set size, all
        // stamped with one round timestamp.
        let at = Utc::now();
        for (node, peers) in self.nodes.iter().zip(&peer_sets) {
            node.write().finalize_round(peers.len(), at)?;
        }

        let report = self.report();
        info!(
            committee = %self.name,
            approved = report.approved,
            rejected = report.rejected,
            reasons = ?report.reasons,
            "consensus round complete"
        );
        Ok(report)
    }

    fn report(&self) -> RoundReport {
        let Some(honest) = self.honest_node() else {
            return RoundReport {
                approved: 0,
                rejected: 0,
                reasons: Vec::new(),
            };
        };
        let honest = honest.read();
        let reasons: Vec<String> = honest
            .rejection_reasons()
            .values()
            .cloned()
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        RoundReport {
            approved: honest.last_round_approvals().len(),
            rejected: honest.last_round_rejections().len(),
            reasons,
        }
    }

    /// Fraction of replicas sharing the most common head hash.
    pub fn sync_ratio(&self) -> f64 {
        if self.nodes.is_empty() {
            return 0.0;
        }
        let mut frequency: HashMap<_, usize> = HashMap::new();
        for node in &self.nodes {
            *frequency.entry(node.read().head_hash()).or_default() += 1;
        }
        let most_common = frequency.values().copied().max().unwrap_or(0);
        most_common as f64 / self.nodes.len() as f64
    }

    /// A committee is in sync when at least the agreement threshold of
    /// replicas share one head hash.
    pub fn is_in_sync(&self) -> bool {
        self.sync_ratio() >= config::MINIMUM_AGREEMENT_PCT
    }

    /// The ledger state of the head block shared by at least the agreement
    /// threshold of replicas, if any.
    pub fn majority_state(&self) -> Option<LedgerState> {
        let mut frequency: HashMap<_, (usize, usize)> = HashMap::new();
        for (index, node) in self.nodes.iter().enumerate() {
            let entry = frequency.entry(node.read().head_hash()).or_insert((0, index));
            entry.0 += 1;
        }
        let (count, index) = frequency.values().max_by_key(|(count, _)| *count)?;
        // Same ratio rule as transaction approval, so an 80% share passes
        // exactly.
        if *count as f64 / self.nodes.len() as f64 >= config::MINIMUM_AGREEMENT_PCT {
            let state = self.nodes[*index].read().chain().state().clone();
            info!(
                committee = %self.name,
                replicas = count,
                head = %short_hex(&self.nodes[*index].read().head_hash()),
                "majority state resolved"
            );
            Some(state)
        } else {
            None
        }
    }
}
