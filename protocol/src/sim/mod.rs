//! # Simulation Harness
//!
//! Wires a complete election out of the core pieces: a ballot template, a
//! voter roll, and the two committees, plus the knobs a simulation driver
//! turns (committee size, voter mix, adversary injection, round cadence).

pub mod election;

pub use election::Election;

use crate::adversary::{Strategy, WriteIn};
use crate::config;

/// Which adversary profile to inject into a committee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdversaryKind {
    /// Signs with throwaway keys under its enrolled identity.
    KeyRotating,
    /// Issues unsigned claim tickets to anyone.
    AuthBypass,
    /// Drops out of consensus rounds entirely.
    Silent,
    /// Splices write-ins into every ballot it handles.
    BallotForging,
}

impl AdversaryKind {
    /// The strategy this kind expands to. Ballot forgers pick up the
    /// configured write-ins.
    pub fn strategy(&self, write_ins: &[WriteIn]) -> Strategy {
        match self {
            Self::KeyRotating => Strategy::key_rotating(),
            Self::AuthBypass => Strategy::auth_bypass(),
            Self::Silent => Strategy::silent(),
            Self::BallotForging => Strategy::ballot_forger(write_ins.to_vec()),
        }
    }
}

/// Parameters for one simulated election.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Nodes per committee.
    pub committee_size: usize,
    /// Registered voters on the synthetic roll.
    pub num_voters: usize,
    /// Claim tickets allotted to each synthetic voter.
    pub tickets_per_voter: u32,
    /// Extra, unregistered identities that will try to vote anyway.
    pub num_unregistered_voters: usize,
    /// Registered voters that will try to vote twice.
    pub num_double_voting_voters: usize,
    /// Adversary profile for the Authenticator committee, if any.
    pub authenticator_adversary: Option<AdversaryKind>,
    /// Adversary profile for the Tabulator committee, if any.
    pub tabulator_adversary: Option<AdversaryKind>,
    /// Write-ins forged ballots carry.
    pub write_ins: Vec<WriteIn>,
    /// Votes between consensus rounds.
    pub round_interval: usize,
    /// Explicit adversary head count per committee. `None` uses the
    /// tolerated maximum for the committee size.
    pub adversary_count: Option<usize>,
}

impl SimulationConfig {
    /// Adversaries injected per committee when a profile is configured.
    /// Defaults to the maximum the committee tolerates by design.
    pub fn adversaries_per_committee(&self) -> usize {
        self.adversary_count
            .unwrap_or_else(|| config::max_tolerated_adversaries(self.committee_size))
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            committee_size: config::DEFAULT_COMMITTEE_SIZE,
            num_voters: 10,
            tickets_per_voter: 1,
            num_unregistered_voters: 0,
            num_double_voting_voters: 0,
            authenticator_adversary: None,
            tabulator_adversary: None,
            write_ins: vec![WriteIn {
                position: "Chancellor of Nowhere".into(),
                candidate: "A. Nonymous".into(),
            }],
            round_interval: 4,
            adversary_count: None,
        }
    }
}
