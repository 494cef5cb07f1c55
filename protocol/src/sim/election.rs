//! # Election
//!
//! The top-level harness: one ballot template, one voter roll, and the two
//! committees running side by side. Voting is a two-stop flow, exactly as a
//! polling place would stage it:
//!
//! 1. the voter authenticates at an Authenticator booth and receives a
//!    signed claim ticket (a `VoterTx` fans out across that committee);
//! 2. the voter presents the ticket at a Tabulator and submits selections
//!    (a `BallotTx` fans out across the other committee).
//!
//! Consensus rounds run per committee, independently; an election is over
//! once every roll entry has been processed and both committees have
//! committed their final rounds.

use rand::Rng;
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

use crate::adversary::Strategy;
use crate::crypto::NodePublicKey;
use crate::election::{Ballot, ClaimTicket, VoterRoll};
use crate::network::driver::{Committee, RoundReport};
use crate::network::node::{Node, NodeError, NodeRole};
use crate::sim::SimulationConfig;

/// A running election: template, roll, and both committees.
pub struct Election {
    template: Ballot,
    roll: VoterRoll,
    authenticators: Committee,
    tabulators: Committee,
}

impl Election {
    /// Builds both committees for the given template and roll.
    ///
    /// Honest nodes come first in each committee; if the config names an
    /// adversary profile for a committee, the tolerated maximum number of
    /// nodes at the tail of that committee run it. Every Tabulator receives
    /// the full Authenticator roster as its ticket trust list, adversarial
    /// members included: trust-list membership says who may issue tickets,
    /// and their signatures still have to verify.
    pub fn new(
        mut template: Ballot,
        roll: VoterRoll,
        config: &SimulationConfig,
    ) -> Result<Self, NodeError> {
        template.finalize();
        let genesis_at = chrono::Utc::now();
        let adversaries = config
            .adversaries_per_committee()
            .min(config.committee_size);

        let booth_strategy = config
            .authenticator_adversary
            .as_ref()
            .map(|kind| kind.strategy(&config.write_ins));
        let mut booths = Vec::with_capacity(config.committee_size);
        for index in 0..config.committee_size {
            let strategy = match &booth_strategy {
                Some(strategy) if index >= config.committee_size - adversaries => {
                    strategy.clone()
                }
                _ => Strategy::honest(),
            };
            booths.push(Node::new(
                NodeRole::Authenticator { roll: roll.clone() },
                strategy,
                genesis_at,
            )?);
        }
        let trusted_issuers: HashSet<NodePublicKey> =
            booths.iter().map(|n| n.identity().clone()).collect();
        let authenticators = Committee::new("authenticators", booths);

        let tabulator_strategy = config
            .tabulator_adversary
            .as_ref()
            .map(|kind| kind.strategy(&config.write_ins));
        let mut tabulators = Vec::with_capacity(config.committee_size);
        for index in 0..config.committee_size {
            let strategy = match &tabulator_strategy {
                Some(strategy) if index >= config.committee_size - adversaries => {
                    strategy.clone()
                }
                _ => Strategy::honest(),
            };
            tabulators.push(Node::new(
                NodeRole::Tabulator {
                    template: template.clone(),
                    trusted_issuers: trusted_issuers.clone(),
                },
                strategy,
                genesis_at,
            )?);
        }
        let tabulators = Committee::new("tabulators", tabulators);

        info!(
            committee_size = config.committee_size,
            voters = roll.len(),
            adversaries_per_committee = adversaries,
            "election set up"
        );
        Ok(Self {
            template,
            roll,
            authenticators,
            tabulators,
        })
    }

    pub fn template(&self) -> &Ballot {
        &self.template
    }

    pub fn roll(&self) -> &VoterRoll {
        &self.roll
    }

    pub fn authenticators(&self) -> &Committee {
        &self.authenticators
    }

    pub fn tabulators(&self) -> &Committee {
        &self.tabulators
    }

    /// Issues a claim ticket at a specific booth.
    pub fn issue_ticket_at(
        &self,
        voter_id: &str,
        booth: usize,
    ) -> Result<ClaimTicket, NodeError> {
        self.authenticators
            .node(booth)
            .write()
            .generate_claim_ticket(voter_id)
    }

    /// Casts selections at a specific tabulator against a ticket.
    pub fn cast_ballot_at(
        &self,
        ticket: ClaimTicket,
        tabulator: usize,
        selections: &BTreeMap<String, Vec<usize>>,
    ) -> Result<(), NodeError> {
        self.tabulators.node(tabulator).write().vote(ticket, selections)
    }

    /// The full voter flow through randomly chosen stations, mirroring a
    /// voter walking up to whichever booth is free.
    pub fn cast_vote(
        &self,
        voter_id: &str,
        selections: &BTreeMap<String, Vec<usize>>,
    ) -> Result<(), NodeError> {
        let mut rng = rand::thread_rng();
        let booth = rng.gen_range(0..self.authenticators.len());
        let tabulator = rng.gen_range(0..self.tabulators.len());
        self.cast_vote_at(voter_id, booth, tabulator, selections)
    }

    /// The full voter flow through explicit stations.
    pub fn cast_vote_at(
        &self,
        voter_id: &str,
        booth: usize,
        tabulator: usize,
        selections: &BTreeMap<String, Vec<usize>>,
    ) -> Result<(), NodeError> {
        let ticket = match self.issue_ticket_at(voter_id, booth) {
            Ok(ticket) => ticket,
            Err(err) => {
                warn!(voter = voter_id, %err, "authentication refused");
                return Err(err);
            }
        };
        match self.cast_ballot_at(ticket, tabulator, selections) {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(voter = voter_id, %err, "ballot refused");
                Err(err)
            }
        }
    }

    /// Runs one consensus round on each committee.
    pub fn run_consensus_round(&self) -> Result<(RoundReport, RoundReport), NodeError> {
        let voters = self.authenticators.run_round()?;
        let ballots = self.tabulators.run_round()?;
        Ok((voters, ballots))
    }

    /// The tally held by at least 80% of Tabulator replicas, as JSON.
    /// `None` while the committee is out of sync; wait for the next round.
    pub fn results(&self) -> Option<serde_json::Value> {
        let state = self.tabulators.majority_state()?;
        serde_json::to_value(&state).ok()
    }

    /// The eligibility ledger held by at least 80% of Authenticator
    /// replicas, as JSON.
    pub fn remaining_tickets(&self) -> Option<serde_json::Value> {
        let state = self.authenticators.majority_state()?;
        serde_json::to_value(&state).ok()
    }

    /// Both committees at threshold agreement on their heads.
    pub fn is_in_sync(&self) -> bool {
        self.authenticators.is_in_sync() && self.tabulators.is_in_sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> Ballot {
        let mut ballot = Ballot::new("2026 Civic Election");
        ballot.add_item("Chair", "chair", vec!["A".into(), "B".into()], 1);
        ballot.finalize();
        ballot
    }

    fn small_config() -> SimulationConfig {
        SimulationConfig {
            committee_size: 4,
            num_voters: 2,
            ..SimulationConfig::default()
        }
    }

    fn chair(selection: usize) -> BTreeMap<String, Vec<usize>> {
        BTreeMap::from([("Chair".to_string(), vec![selection])])
    }

    #[test]
    fn vote_flow_commits_on_both_ledgers() {
        let roll = VoterRoll::synthetic(2, 1);
        let election = Election::new(template(), roll, &small_config()).unwrap();

        election.cast_vote_at("1", 0, 0, &chair(0)).unwrap();
        election.cast_vote_at("2", 1, 2, &chair(1)).unwrap();
        election.run_consensus_round().unwrap();

        assert!(election.is_in_sync());
        let results = election.results().unwrap();
        assert_eq!(results["Chair"]["A"], 1);
        assert_eq!(results["Chair"]["B"], 1);
        let remaining = election.remaining_tickets().unwrap();
        assert_eq!(remaining["1"], 0);
        assert_eq!(remaining["2"], 0);
    }

    #[test]
    fn unregistered_voter_is_turned_away() {
        let roll = VoterRoll::synthetic(1, 1);
        let election = Election::new(template(), roll, &small_config()).unwrap();
        let err = election.cast_vote_at("99", 0, 0, &chair(0)).unwrap_err();
        assert!(matches!(
            err,
            NodeError::Admission(crate::error::AdmissionError::UnknownVoter(_))
        ));
    }

    #[test]
    fn fresh_committees_report_the_zero_tally() {
        let roll = VoterRoll::synthetic(1, 1);
        let election = Election::new(template(), roll, &small_config()).unwrap();
        let results = election.results().unwrap();
        assert_eq!(results["Chair"]["A"], 0);
    }
}
