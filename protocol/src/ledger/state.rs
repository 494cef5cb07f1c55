//! # Ledger State
//!
//! Each committee tracks one cumulative view of its transaction history:
//!
//! - [`EligibilityLedger`] (Authenticator): voter id to remaining claim
//!   tickets, seeded from the voter roll.
//! - [`TallyLedger`] (Tabulator): position to per-candidate vote counts,
//!   zeroed from the finalized ballot template.
//!
//! State lives inside blocks and is only ever produced by applying an
//! approved transaction set to a predecessor's state. Application is not a
//! validation layer: by the time a transaction reaches `apply`, admission
//! and the consensus round have both vouched for it, so an impossible
//! application (ticket underflow, wrong content kind) is a protocol bug and
//! surfaces as a fatal [`StateError`] rather than a rejection.
//!
//! Both maps are `BTreeMap` so serialized results render in a stable order.

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::election::{Ballot, VoterRoll};
use crate::transaction::{Transaction, TxContent};

/// Fatal state-application failures. These indicate validation let
/// something through that it must not have.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("voter {0} is not tracked by the eligibility ledger")]
    MissingVoter(String),

    #[error("applying transaction would underflow voter {0}'s ticket count")]
    TicketUnderflow(String),

    #[error("{got} transaction cannot be applied to the {expected} ledger")]
    ContentMismatch {
        expected: &'static str,
        got: &'static str,
    },
}

// ---------------------------------------------------------------------------
// EligibilityLedger
// ---------------------------------------------------------------------------

/// Remaining claim tickets per voter id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EligibilityLedger {
    remaining: BTreeMap<String, u32>,
}

impl EligibilityLedger {
    /// Seeds the ledger with every voter's full allotment.
    pub fn from_roll(roll: &VoterRoll) -> Self {
        let remaining = roll
            .iter()
            .map(|v| (v.id.clone(), v.allotted_tickets))
            .collect();
        Self { remaining }
    }

    /// Remaining tickets for a voter, `None` if the voter is not on the
    /// committed roll.
    pub fn remaining(&self, voter_id: &str) -> Option<u32> {
        self.remaining.get(voter_id).copied()
    }

    pub fn contains(&self, voter_id: &str) -> bool {
        self.remaining.contains_key(voter_id)
    }

    /// Sum of all remaining tickets.
    pub fn total_remaining(&self) -> u64 {
        self.remaining.values().map(|&v| u64::from(v)).sum()
    }

    fn apply(&mut self, tx: &Transaction) -> Result<(), StateError> {
        let TxContent::Voter(voter) = tx.content() else {
            return Err(StateError::ContentMismatch {
                expected: "eligibility",
                got: tx.content().kind(),
            });
        };
        let remaining = self
            .remaining
            .get_mut(&voter.id)
            .ok_or_else(|| StateError::MissingVoter(voter.id.clone()))?;
        if *remaining == 0 {
            return Err(StateError::TicketUnderflow(voter.id.clone()));
        }
        *remaining -= 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TallyLedger
// ---------------------------------------------------------------------------

/// Vote counts per position and candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TallyLedger {
    counts: BTreeMap<String, BTreeMap<String, u64>>,
}

impl TallyLedger {
    /// Zeroes a tally over every position and choice the template declares.
    pub fn from_template(template: &Ballot) -> Self {
        let counts = template
            .items()
            .iter()
            .map(|item| {
                let choices = item.choices().iter().map(|c| (c.clone(), 0)).collect();
                (item.position().to_string(), choices)
            })
            .collect();
        Self { counts }
    }

    /// Current count for one (position, choice) pair.
    pub fn count(&self, position: &str, choice: &str) -> Option<u64> {
        self.counts.get(position)?.get(choice).copied()
    }

    /// Per-position totals, for cross-checking against committed ballots.
    pub fn position_total(&self, position: &str) -> u64 {
        self.counts
            .get(position)
            .map(|c| c.values().sum())
            .unwrap_or(0)
    }

    /// Grand total across every position.
    pub fn total_votes(&self) -> u64 {
        self.counts.values().flat_map(|c| c.values()).sum()
    }

    fn apply(&mut self, tx: &Transaction) -> Result<(), StateError> {
        let TxContent::Ballot { ballot, .. } = tx.content() else {
            return Err(StateError::ContentMismatch {
                expected: "tally",
                got: tx.content().kind(),
            });
        };
        for item in ballot.items() {
            // Positions or choices the template never declared cannot occur
            // once validation has run; skip them rather than invent rows.
            let Some(position_counts) = self.counts.get_mut(item.position()) else {
                continue;
            };
            for &index in item.selected() {
                let Some(choice) = item.choices().get(index) else {
                    continue;
                };
                if let Some(count) = position_counts.get_mut(choice) {
                    *count += 1;
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LedgerState
// ---------------------------------------------------------------------------

/// The committed state carried by a block, tagged by committee kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum LedgerState {
    Eligibility(EligibilityLedger),
    Tally(TallyLedger),
}

impl LedgerState {
    /// Applies a slice of approved transactions in order.
    pub fn apply_all(&mut self, transactions: &[Transaction]) -> Result<(), StateError> {
        for tx in transactions {
            match self {
                Self::Eligibility(ledger) => ledger.apply(tx)?,
                Self::Tally(ledger) => ledger.apply(tx)?,
            }
        }
        Ok(())
    }

    pub fn as_eligibility(&self) -> Option<&EligibilityLedger> {
        match self {
            Self::Eligibility(ledger) => Some(ledger),
            Self::Tally(_) => None,
        }
    }

    pub fn as_tally(&self) -> Option<&TallyLedger> {
        match self {
            Self::Tally(ledger) => Some(ledger),
            Self::Eligibility(_) => None,
        }
    }
}
