//! End-to-end committee scenarios: full elections driven through the
//! simulation harness, with and without injected adversaries, checked
//! against the ledger invariants every honest replica must uphold.

use std::collections::{BTreeMap, HashSet};

use civitas_protocol::election::{Ballot, VoterRoll};
use civitas_protocol::error::AdmissionError;
use civitas_protocol::network::node::NodeError;
use civitas_protocol::sim::{AdversaryKind, Election, SimulationConfig};
use civitas_protocol::transaction::TxContent;

fn two_position_template() -> Ballot {
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

fn first_choices() -> BTreeMap<String, Vec<usize>> {
    BTreeMap::from([
        ("Council Chair".to_string(), vec![0]),
        ("Treasurer".to_string(), vec![0]),
    ])
}

fn config(committee_size: usize) -> SimulationConfig {
    SimulationConfig {
        committee_size,
        ..SimulationConfig::default()
    }
}

/// Every honest Tabulator replica upholds the chain-level bookkeeping:
/// per-position totals match the committed ballots, committed ticket ids are
/// unique across history, and honest heads agree.
fn assert_tabulator_invariants(election: &Election) {
    let mut honest_heads = HashSet::new();
    for node in election.tabulators().nodes() {
        let node = node.read();
        if node.is_adversary() {
            continue;
        }
        honest_heads.insert(node.head_hash());

        let chain = node.chain();
        let committed_ballots = chain.committed_ballots() as u64;
        let tally = chain.state().as_tally().expect("tabulator tracks a tally");
        for item in election.template().items() {
            assert!(
                tally.position_total(item.position()) <= committed_ballots,
                "position {} counts more votes than committed ballots",
                item.position()
            );
        }

        let mut seen_tickets = HashSet::new();
        for tx in chain.committed() {
            if let TxContent::Ballot { ticket, .. } = tx.content() {
                assert!(
                    seen_tickets.insert(*ticket.id()),
                    "claim ticket {} committed twice",
                    ticket.id()
                );
            }
        }
    }
    assert_eq!(honest_heads.len(), 1, "honest tabulator replicas disagree");
}

/// Every honest Authenticator replica's arithmetic checks out: initial
/// allotment minus remaining equals committed retrievals, per voter.
fn assert_authenticator_invariants(election: &Election) {
    let mut honest_heads = HashSet::new();
    for node in election.authenticators().nodes() {
        let node = node.read();
        if node.is_adversary() {
            continue;
        }
        honest_heads.insert(node.head_hash());

        let chain = node.chain();
        let ledger = chain
            .state()
            .as_eligibility()
            .expect("authenticator tracks eligibility");
        for voter in election.roll().iter() {
            let remaining = ledger.remaining(&voter.id).unwrap_or(0);
            let spent = voter.allotted_tickets - remaining;
            assert_eq!(
                spent as usize,
                chain.committed_retrievals(&voter.id),
                "voter {} retrieval arithmetic is off",
                voter.id
            );
        }
    }
    assert_eq!(
        honest_heads.len(),
        1,
        "honest authenticator replicas disagree"
    );
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[test]
fn full_committee_happy_path() {
    let roll = VoterRoll::synthetic(3, 1);
    let election = Election::new(two_position_template(), roll, &config(50)).unwrap();

    for voter_id in ["1", "2", "3"] {
        election.cast_vote(voter_id, &first_choices()).unwrap();
    }
    election.run_consensus_round().unwrap();

    assert!(election.is_in_sync());
    let results = election.results().unwrap();
    assert_eq!(results["Council Chair"]["Ada Lovelace"], 3);
    assert_eq!(results["Council Chair"]["Grace Hopper"], 0);
    assert_eq!(results["Treasurer"]["Alan Turing"], 3);
    assert_eq!(results["Treasurer"]["John von Neumann"], 0);

    let remaining = election.remaining_tickets().unwrap();
    for voter_id in ["1", "2", "3"] {
        assert_eq!(remaining[voter_id], 0);
    }

    assert_tabulator_invariants(&election);
    assert_authenticator_invariants(&election);
}

// ---------------------------------------------------------------------------
// Double issuance
// ---------------------------------------------------------------------------

#[test]
fn second_ticket_is_refused_before_and_after_commit() {
    let roll = VoterRoll::synthetic(1, 1);
    let election = Election::new(two_position_template(), roll, &config(5)).unwrap();

    election.issue_ticket_at("1", 0).unwrap();

    // Before the round commits: the pending transaction blocks reissue on
    // every booth, not just the one that issued.
    for booth in 0..5 {
        let err = election.issue_ticket_at("1", booth).unwrap_err();
        assert!(
            matches!(
                err,
                NodeError::Admission(AdmissionError::NotEnoughClaimTickets(_))
            ),
            "booth {booth} should refuse a second ticket"
        );
    }

    // After the round commits: the committed ledger itself is exhausted.
    election.run_consensus_round().unwrap();
    let err = election.issue_ticket_at("1", 2).unwrap_err();
    assert!(matches!(
        err,
        NodeError::Admission(AdmissionError::NotEnoughClaimTickets(_))
    ));
    assert_authenticator_invariants(&election);
}

// ---------------------------------------------------------------------------
// Double spend across tabulators
// ---------------------------------------------------------------------------

#[test]
fn one_ticket_cannot_buy_two_ballots() {
    let roll = VoterRoll::synthetic(1, 1);
    let election = Election::new(two_position_template(), roll, &config(5)).unwrap();

    let ticket = election.issue_ticket_at("1", 0).unwrap();
    election
        .cast_ballot_at(ticket.clone(), 0, &first_choices())
        .unwrap();

    // A different tabulator has not committed the first spend yet, so the
    // second ballot is admitted locally and the committee must resolve it.
    let second = BTreeMap::from([
        ("Council Chair".to_string(), vec![1]),
        ("Treasurer".to_string(), vec![1]),
    ]);
    election.cast_ballot_at(ticket, 1, &second).unwrap();

    let (_, ballots) = election.run_consensus_round().unwrap();
    assert_eq!(ballots.approved, 1);
    assert_eq!(ballots.rejected, 1);
    assert!(ballots
        .reasons
        .iter()
        .any(|r| r.contains("conflicting transaction") || r.contains("already been used")));

    // Exactly one ballot counted, on every honest replica.
    let results = election.results().unwrap();
    let chair_total = results["Council Chair"]["Ada Lovelace"].as_u64().unwrap()
        + results["Council Chair"]["Grace Hopper"].as_u64().unwrap();
    assert_eq!(chair_total, 1);
    assert_tabulator_invariants(&election);

    // The loser stays rejected: a later round does not resurrect it.
    election.run_consensus_round().unwrap();
    let results = election.results().unwrap();
    let chair_total = results["Council Chair"]["Ada Lovelace"].as_u64().unwrap()
        + results["Council Chair"]["Grace Hopper"].as_u64().unwrap();
    assert_eq!(chair_total, 1);
    assert_tabulator_invariants(&election);
}

// ---------------------------------------------------------------------------
// Signature-forging authenticators
// ---------------------------------------------------------------------------

#[test]
fn forged_issuance_signatures_never_commit() {
    let roll = VoterRoll::synthetic(3, 1);
    let cfg = SimulationConfig {
        committee_size: 50,
        authenticator_adversary: Some(AdversaryKind::KeyRotating),
        adversary_count: Some(10),
        ..SimulationConfig::default()
    };
    let election = Election::new(two_position_template(), roll, &cfg).unwrap();

    // Adversarial booths occupy the tail of the committee. Each fabricates
    // an issuance broadcast before any honest voting happens.
    for (offset, booth) in (40..50).enumerate() {
        let voter_id = ((offset % 3) + 1).to_string();
        let ticket = election.issue_ticket_at(&voter_id, booth).unwrap();
        // The tickets they hand out are unusable anyway.
        assert!(!ticket.verify());
    }

    // Legitimate voting proceeds through honest booths.
    for (index, voter_id) in ["1", "2", "3"].iter().enumerate() {
        election
            .cast_vote_at(voter_id, index, index, &first_choices())
            .unwrap();
    }

    let (voters, _) = election.run_consensus_round().unwrap();
    assert_eq!(voters.approved, 3, "only the legitimate retrievals commit");
    assert!(voters
        .reasons
        .iter()
        .any(|r| r.contains("signature verification failed")));

    // Honest replicas agree and carry exactly one retrieval per voter.
    assert_authenticator_invariants(&election);
    let remaining = election.remaining_tickets().unwrap();
    for voter_id in ["1", "2", "3"] {
        assert_eq!(remaining[voter_id], 0);
    }
}

// ---------------------------------------------------------------------------
// Ballot-forging tabulators
// ---------------------------------------------------------------------------

#[test]
fn write_in_ballots_are_rejected_by_the_committee() {
    let roll = VoterRoll::synthetic(3, 1);
    let cfg = SimulationConfig {
        committee_size: 50,
        tabulator_adversary: Some(AdversaryKind::BallotForging),
        adversary_count: Some(10),
        ..SimulationConfig::default()
    };
    let election = Election::new(two_position_template(), roll, &cfg).unwrap();

    // Two voters use honest tabulators; one is routed through a forger that
    // splices a write-in position into the ballot.
    election.cast_vote_at("1", 0, 0, &first_choices()).unwrap();
    election.cast_vote_at("2", 1, 1, &first_choices()).unwrap();
    election.cast_vote_at("3", 2, 45, &first_choices()).unwrap();

    let (_, ballots) = election.run_consensus_round().unwrap();
    assert_eq!(ballots.approved, 2);
    assert!(ballots.reasons.iter().any(|r| r.contains("invalid ballot")));

    // The forged ballot moved nothing: honest state reflects only the two
    // honest votes, and the invented position does not exist.
    let results = election.results().unwrap();
    assert_eq!(results["Council Chair"]["Ada Lovelace"], 2);
    assert_eq!(results["Treasurer"]["Alan Turing"], 2);
    assert!(results.get("Chancellor of Nowhere").is_none());
    assert_tabulator_invariants(&election);
}

// ---------------------------------------------------------------------------
// Silent denial of service at the exact threshold
// ---------------------------------------------------------------------------

#[test]
fn silent_tabulators_at_the_threshold_boundary() {
    let roll = VoterRoll::synthetic(3, 1);
    let cfg = SimulationConfig {
        committee_size: 50,
        tabulator_adversary: Some(AdversaryKind::Silent),
        adversary_count: Some(10),
        ..SimulationConfig::default()
    };
    let election = Election::new(two_position_template(), roll, &cfg).unwrap();

    // All voting goes through honest stations; the 10 silent tabulators
    // simply contribute nothing, leaving exactly 40 of 50 votes per ballot.
    for (index, voter_id) in ["1", "2", "3"].iter().enumerate() {
        election
            .cast_vote_at(voter_id, index, index, &first_choices())
            .unwrap();
    }

    let (_, ballots) = election.run_consensus_round().unwrap();
    // 40/50 is the agreement threshold exactly; the ballots still commit.
    assert_eq!(ballots.approved, 3);

    let results = election.results().unwrap();
    assert_eq!(results["Council Chair"]["Ada Lovelace"], 3);
    assert_eq!(results["Treasurer"]["Alan Turing"], 3);
    assert_tabulator_invariants(&election);

    // The silent replicas committed empty blocks and forked themselves off;
    // the honest 80% still constitutes a majority view.
    assert!(election.tabulators().is_in_sync());
    for node in election.tabulators().nodes() {
        let node = node.read();
        if node.is_adversary() {
            assert_eq!(node.chain().committed_ballots(), 0);
        } else {
            assert_eq!(node.chain().committed_ballots(), 3);
        }
    }
}

// ---------------------------------------------------------------------------
// Round idempotence
// ---------------------------------------------------------------------------

#[test]
fn rounds_with_empty_pools_preserve_state() {
    let roll = VoterRoll::synthetic(2, 1);
    let election = Election::new(two_position_template(), roll, &config(4)).unwrap();

    election.cast_vote_at("1", 0, 0, &first_choices()).unwrap();
    election.run_consensus_round().unwrap();
    let settled = election.results().unwrap();

    // Two idle rounds: blocks append, state does not move.
    election.run_consensus_round().unwrap();
    election.run_consensus_round().unwrap();

    assert!(election.is_in_sync());
    assert_eq!(election.results().unwrap(), settled);
    for node in election.tabulators().nodes() {
        assert_eq!(node.read().chain().height(), 4);
    }
}
