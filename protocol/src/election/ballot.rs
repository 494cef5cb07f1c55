//! # Ballots
//!
//! A [`Ballot`] is an election label plus an ordered list of positions, each
//! carrying a description, an ordered choice list, a selection cap, and the
//! current selections. The same type serves two modes:
//!
//! - **template**: built at election setup, then finalized. No selections.
//!   Tabulators validate every incoming ballot against it.
//! - **filled**: a working copy handed to a voter, selections populated,
//!   then frozen inside a signed transaction.
//!
//! Invariants the template enforces on conforming ballots: position names
//! unique within an election, every selection an index into its position's
//! declared choices, and selection counts within each position's maximum.
//!
//! The mutation surface is deliberately wider than the honest path needs:
//! `add_item`, `add_choice`, and `select` let a misbehaving tabulator build
//! a write-in ballot that the committee must then reject. Template
//! conformance, not construction, is the security boundary.

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::encoding::{push_field, Canonical, CanonicalOpts};

/// Errors from filling out a ballot against its own declared positions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BallotError {
    #[error("ballot has no position named {0:?}")]
    UnknownPosition(String),

    #[error("selection {index} is out of range for position {position:?}")]
    ChoiceOutOfRange { position: String, index: usize },

    #[error("position {position:?} allows at most {max} selection(s)")]
    TooManySelections { position: String, max: usize },
}

// ---------------------------------------------------------------------------
// BallotItem
// ---------------------------------------------------------------------------

/// One position on a ballot: a contest with an ordered list of choices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BallotItem {
    position: String,
    description: String,
    choices: Vec<String>,
    max_selections: usize,
    selected: Vec<usize>,
}

impl BallotItem {
    /// The position name, unique within the election.
    pub fn position(&self) -> &str {
        &self.position
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Choices in declared order.
    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    /// Maximum number of selections permitted for this position.
    pub fn max_selections(&self) -> usize {
        self.max_selections
    }

    /// Indices of the currently selected choices.
    pub fn selected(&self) -> &[usize] {
        &self.selected
    }
}

// ---------------------------------------------------------------------------
// Ballot
// ---------------------------------------------------------------------------

/// An election ballot: template or filled, depending on lifecycle stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ballot {
    election: String,
    items: Vec<BallotItem>,
    finalized: bool,
}

impl Ballot {
    /// Starts an empty ballot for the named election.
    pub fn new(election: impl Into<String>) -> Self {
        Self {
            election: election.into(),
            items: Vec::new(),
            finalized: false,
        }
    }

    pub fn election(&self) -> &str {
        &self.election
    }

    /// Positions in insertion order.
    pub fn items(&self) -> &[BallotItem] {
        &self.items
    }

    /// Looks a position up by name.
    pub fn item(&self, position: &str) -> Option<&BallotItem> {
        self.items.iter().find(|i| i.position == position)
    }

    /// Adds a position. Ignored once the ballot is finalized; a repeated
    /// position name replaces the earlier entry (one position per name).
    pub fn add_item(
        &mut self,
        position: impl Into<String>,
        description: impl Into<String>,
        choices: Vec<String>,
        max_selections: usize,
    ) {
        if self.finalized {
            return;
        }
        let position = position.into();
        let item = BallotItem {
            position: position.clone(),
            description: description.into(),
            choices,
            max_selections,
            selected: Vec::new(),
        };
        match self.items.iter_mut().find(|i| i.position == position) {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
    }

    /// Appends a write-in choice to an existing position and returns its
    /// index. This exists for misbehaving tabulators; the committee rejects
    /// the result during validation.
    pub fn add_choice(&mut self, position: &str, candidate: impl Into<String>) -> Option<usize> {
        if self.finalized {
            return None;
        }
        let item = self.items.iter_mut().find(|i| i.position == position)?;
        item.choices.push(candidate.into());
        Some(item.choices.len() - 1)
    }

    /// Freezes the set of positions. Selections stay mutable; working copies
    /// handed to voters are filled out after the template is finalized.
    pub fn finalize(&mut self) {
        self.finalized = true;
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// True while no position carries a selection.
    pub fn is_template(&self) -> bool {
        self.items.iter().all(|i| i.selected.is_empty())
    }

    /// An unfinalized, selection-free copy for handing to a voter.
    pub fn working_copy(&self) -> Ballot {
        let mut copy = self.clone();
        copy.finalized = false;
        for item in &mut copy.items {
            item.selected.clear();
        }
        copy
    }

    /// Overwrites the selections for one position. Indices must refer to the
    /// ballot's own declared choices; the per-position maximum is enforced
    /// by [`fill`](Self::fill) and by committee validation, not here.
    pub fn select(&mut self, position: &str, selected: Vec<usize>) -> Result<(), BallotError> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.position == position)
            .ok_or_else(|| BallotError::UnknownPosition(position.to_string()))?;
        if let Some(&index) = selected.iter().find(|&&s| s >= item.choices.len()) {
            return Err(BallotError::ChoiceOutOfRange {
                position: position.to_string(),
                index,
            });
        }
        item.selected = selected;
        Ok(())
    }

    /// Fills the ballot from a selection map, enforcing every per-position
    /// rule. This is the honest front-end path.
    pub fn fill(&mut self, selections: &BTreeMap<String, Vec<usize>>) -> Result<(), BallotError> {
        for (position, selected) in selections {
            let item = self
                .item(position)
                .ok_or_else(|| BallotError::UnknownPosition(position.clone()))?;
            if selected.len() > item.max_selections {
                return Err(BallotError::TooManySelections {
                    position: position.clone(),
                    max: item.max_selections,
                });
            }
            self.select(position, selected.clone())?;
        }
        Ok(())
    }

    /// Wipes all selections.
    pub fn clear(&mut self) {
        for item in &mut self.items {
            item.selected.clear();
        }
    }

    /// Checks a filled ballot against this template.
    ///
    /// Violations: mismatched election label, a position the template does
    /// not declare, a selection index at or past the template's choice
    /// count, or more selections than the template's maximum for that
    /// position. The error string names the first violation found.
    pub fn conforms(&self, candidate: &Ballot) -> Result<(), String> {
        if candidate.election != self.election {
            return Err(format!(
                "ballot is for election {:?}, expected {:?}",
                candidate.election, self.election
            ));
        }
        for item in &candidate.items {
            let Some(template_item) = self.item(&item.position) else {
                return Err(format!("unknown position {:?}", item.position));
            };
            if item.selected.len() > template_item.max_selections {
                return Err(format!(
                    "{} selections for position {:?}, maximum is {}",
                    item.selected.len(),
                    item.position,
                    template_item.max_selections
                ));
            }
            if let Some(&index) = item
                .selected
                .iter()
                .find(|&&s| s >= template_item.choices.len())
            {
                return Err(format!(
                    "selection {} is not a declared choice for position {:?}",
                    index, item.position
                ));
            }
        }
        Ok(())
    }
}

impl Canonical for Ballot {
    /// Election label, then each position in insertion order with its
    /// description, declared choices, and cap. Selections participate only
    /// when the options ask for a filled encoding, so the template signature
    /// and the usage signature of the same ballot stay independently
    /// verifiable.
    fn canonical(&self, opts: CanonicalOpts) -> Vec<u8> {
        let mut buf = self.election.as_bytes().to_vec();
        for item in &self.items {
            push_field(&mut buf, item.position.as_bytes());
            push_field(&mut buf, item.description.as_bytes());
            push_field(&mut buf, item.choices.len().to_string().as_bytes());
            for choice in &item.choices {
                push_field(&mut buf, choice.as_bytes());
            }
            push_field(&mut buf, item.max_selections.to_string().as_bytes());
            if opts.include_selections {
                push_field(&mut buf, item.selected.len().to_string().as_bytes());
                for index in &item.selected {
                    push_field(&mut buf, index.to_string().as_bytes());
                }
            }
        }
        buf
    }
}

impl fmt::Display for Ballot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} positions)", self.election, self.items.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> Ballot {
        let mut ballot = Ballot::new("2026 Civic Election");
        ballot.add_item(
            "Council Chair",
            "Chair of the city council",
            vec!["Ada Lovelace".into(), "Grace Hopper".into()],
            1,
        );
        ballot.add_item(
            "Treasurer",
            "Keeper of the city purse",
            vec!["Alan Turing".into(), "John von Neumann".into()],
            1,
        );
        ballot.finalize();
        ballot
    }

    fn selections(chair: usize, treasurer: usize) -> BTreeMap<String, Vec<usize>> {
        BTreeMap::from([
            ("Council Chair".to_string(), vec![chair]),
            ("Treasurer".to_string(), vec![treasurer]),
        ])
    }

    #[test]
    fn finalize_freezes_positions() {
        let mut ballot = template();
        ballot.add_item("Sheriff", "ignored", vec!["X".into()], 1);
        assert_eq!(ballot.items().len(), 2);
        assert!(ballot.add_choice("Council Chair", "Write-in").is_none());
    }

    #[test]
    fn repeated_position_replaces_earlier_entry() {
        let mut ballot = Ballot::new("e");
        ballot.add_item("P", "first", vec!["a".into()], 1);
        ballot.add_item("P", "second", vec!["b".into(), "c".into()], 2);
        assert_eq!(ballot.items().len(), 1);
        assert_eq!(ballot.item("P").unwrap().description(), "second");
        assert_eq!(ballot.item("P").unwrap().max_selections(), 2);
    }

    #[test]
    fn fill_applies_selections() {
        let mut ballot = template().working_copy();
        ballot.fill(&selections(0, 1)).unwrap();
        assert_eq!(ballot.item("Council Chair").unwrap().selected(), &[0]);
        assert_eq!(ballot.item("Treasurer").unwrap().selected(), &[1]);
        assert!(!ballot.is_template());
    }

    #[test]
    fn fill_rejects_unknown_position() {
        let mut ballot = template().working_copy();
        let bad = BTreeMap::from([("Mayor".to_string(), vec![0])]);
        assert!(matches!(
            ballot.fill(&bad),
            Err(BallotError::UnknownPosition(_))
        ));
    }

    #[test]
    fn fill_rejects_excess_selections() {
        let mut ballot = template().working_copy();
        let bad = BTreeMap::from([("Council Chair".to_string(), vec![0, 1])]);
        assert!(matches!(
            ballot.fill(&bad),
            Err(BallotError::TooManySelections { .. })
        ));
    }

    #[test]
    fn select_rejects_out_of_range_index() {
        let mut ballot = template().working_copy();
        assert!(matches!(
            ballot.select("Treasurer", vec![7]),
            Err(BallotError::ChoiceOutOfRange { index: 7, .. })
        ));
    }

    #[test]
    fn working_copy_is_mutable_and_clean() {
        let tpl = template();
        let mut copy = tpl.working_copy();
        assert!(copy.is_template());
        assert!(!copy.is_finalized());
        let idx = copy.add_choice("Council Chair", "Write-in").unwrap();
        assert_eq!(idx, 2);
        // Template untouched.
        assert_eq!(tpl.item("Council Chair").unwrap().choices().len(), 2);
    }

    #[test]
    fn conforming_ballot_passes() {
        let tpl = template();
        let mut ballot = tpl.working_copy();
        ballot.fill(&selections(1, 0)).unwrap();
        assert!(tpl.conforms(&ballot).is_ok());
    }

    #[test]
    fn foreign_position_fails_conformance() {
        let tpl = template();
        let mut forged = tpl.working_copy();
        forged.add_item("Mayor", "write-in", vec!["Anyone".into()], 1);
        forged.select("Mayor", vec![0]).unwrap();
        let err = tpl.conforms(&forged).unwrap_err();
        assert!(err.contains("Mayor"));
    }

    #[test]
    fn write_in_choice_fails_conformance() {
        let tpl = template();
        let mut forged = tpl.working_copy();
        let idx = forged.add_choice("Council Chair", "Anyone").unwrap();
        forged.select("Council Chair", vec![idx]).unwrap();
        assert!(tpl.conforms(&forged).is_err());
    }

    #[test]
    fn excess_selections_fail_conformance() {
        let tpl = template();
        let mut forged = tpl.working_copy();
        // Bypass fill's cap by assigning directly.
        forged.select("Council Chair", vec![0, 1]).unwrap();
        assert!(tpl.conforms(&forged).is_err());
    }

    #[test]
    fn wrong_election_fails_conformance() {
        let tpl = template();
        let other = Ballot::new("Some Other Election");
        assert!(tpl.conforms(&other).is_err());
    }

    #[test]
    fn canonical_distinguishes_selections_only_when_included() {
        let tpl = template();
        let mut filled = tpl.working_copy();
        filled.fill(&selections(0, 0)).unwrap();

        let with = CanonicalOpts::filled();
        let without = CanonicalOpts::template();

        // Under the template encoding the filled ballot matches its source.
        assert_eq!(filled.canonical(without), tpl.working_copy().canonical(without));
        // Under the filled encoding it does not.
        assert_ne!(filled.canonical(with), tpl.working_copy().canonical(with));
    }

    #[test]
    fn canonical_is_order_sensitive() {
        let mut a = Ballot::new("e");
        a.add_item("P1", "", vec!["x".into()], 1);
        a.add_item("P2", "", vec!["y".into()], 1);
        let mut b = Ballot::new("e");
        b.add_item("P2", "", vec!["y".into()], 1);
        b.add_item("P1", "", vec!["x".into()], 1);
        let opts = CanonicalOpts::default();
        assert_ne!(a.canonical(opts), b.canonical(opts));
    }
}
