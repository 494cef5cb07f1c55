//! # Voters and the Voter Roll
//!
//! The roll is the static registry of who may vote and how many claim
//! tickets each voter is allotted. It is loaded once at election setup and
//! never mutated; everything downstream (eligibility ledgers, issuance
//! checks) derives from it.
//!
//! The input document is a JSON array of records:
//!
//! ```json
//! [
//!   {"name": "Ada Lovelace", "num_claim_tickets": 1},
//!   {"name": "Grace Hopper"}
//! ]
//! ```
//!
//! Voter ids are assigned sequentially starting at 1 in file order. Names
//! are trimmed and lowercased for matching; records with blank names are
//! skipped. A missing `num_claim_tickets` defaults to 1.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::encoding::{join_fields, Canonical, CanonicalOpts};

/// Errors loading a voter roll document.
#[derive(Debug, Error)]
pub enum RollError {
    #[error("failed to read voter roll: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse voter roll: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One registered voter. Immutable once the roll is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    /// Stable identifier, assigned from the roll's file order.
    pub id: String,
    /// Display name, lowercased.
    pub name: String,
    /// How many claim tickets this voter may be issued in total.
    pub allotted_tickets: u32,
}

impl Canonical for Voter {
    fn canonical(&self, _opts: CanonicalOpts) -> Vec<u8> {
        join_fields([self.id.as_str(), self.name.as_str()])
    }
}

/// On-disk record shape for one roll entry.
#[derive(Debug, Deserialize)]
struct RollRecord {
    name: String,
    #[serde(default = "default_allotment")]
    num_claim_tickets: u32,
}

fn default_allotment() -> u32 {
    1
}

/// The loaded voter roll: an ordered, immutable list of [`Voter`]s.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VoterRoll {
    voters: Vec<Voter>,
}

impl VoterRoll {
    /// Loads a roll from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RollError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Parses a roll from a JSON string.
    pub fn from_json(raw: &str) -> Result<Self, RollError> {
        let records: Vec<RollRecord> = serde_json::from_str(raw)?;
        let mut voters = Vec::with_capacity(records.len());
        for record in records {
            let name = record.name.trim().to_lowercase();
            if name.is_empty() {
                continue;
            }
            voters.push(Voter {
                id: (voters.len() + 1).to_string(),
                name,
                allotted_tickets: record.num_claim_tickets,
            });
        }
        Ok(Self { voters })
    }

    /// Builds a synthetic roll of `num_voters` voters named `voter1`,
    /// `voter2`, ... with a uniform ticket allotment. Used by simulations.
    pub fn synthetic(num_voters: usize, tickets_each: u32) -> Self {
        let voters = (1..=num_voters)
            .map(|i| Voter {
                id: i.to_string(),
                name: format!("voter{i}"),
                allotted_tickets: tickets_each,
            })
            .collect();
        Self { voters }
    }

    /// Looks a voter up by id.
    pub fn get(&self, voter_id: &str) -> Option<&Voter> {
        self.voters.iter().find(|v| v.id == voter_id)
    }

    /// All voters whose (lowercased) name matches. Multiple matches are
    /// possible; the caller disambiguates by id.
    pub fn find_by_name(&self, name: &str) -> Vec<&Voter> {
        let needle = name.trim().to_lowercase();
        self.voters.iter().filter(|v| v.name == needle).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Voter> {
        self.voters.iter()
    }

    pub fn len(&self) -> usize {
        self.voters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voters.is_empty()
    }
}
