//! # Scenario Runner
//!
//! Maps a named scenario onto a simulation config, drives the voter flow,
//! triggers consensus rounds on the configured cadence, and renders the
//! final committed results.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use tracing::{info, warn};

use civitas_protocol::election::{Ballot, VoterRoll};
use civitas_protocol::sim::{AdversaryKind, Election, SimulationConfig};

use crate::cli::{Scenario, SimulateArgs};

/// The stock two-position ballot used by synthetic elections.
fn default_template() -> Ballot {
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

/// Scripted selections: roughly the first 60% of voters pick the first
/// choice in every position, the rest pick the second.
fn scripted_selections(
    template: &Ballot,
    voter_index: usize,
    num_voters: usize,
) -> BTreeMap<String, Vec<usize>> {
    let first_choice = (voter_index + 1) as f64 / num_voters.max(1) as f64 <= 0.6;
    template
        .items()
        .iter()
        .map(|item| {
            let selection = if first_choice {
                0
            } else {
                1usize.min(item.choices().len().saturating_sub(1))
            };
            (item.position().to_string(), vec![selection])
        })
        .collect()
}

fn config_for(scenario: Scenario, args: &SimulateArgs) -> SimulationConfig {
    let base = SimulationConfig {
        committee_size: args.committee_size,
        num_voters: args.voters,
        round_interval: args.round_interval.max(1),
        ..SimulationConfig::default()
    };
    match scenario {
        Scenario::HappyPath => base,
        Scenario::UnknownVoter => SimulationConfig {
            num_unregistered_voters: (args.voters / 2).max(1),
            ..base
        },
        Scenario::DoubleVote => SimulationConfig {
            num_double_voting_voters: (args.voters / 2).max(1),
            ..base
        },
        Scenario::BallotForger => SimulationConfig {
            tabulator_adversary: Some(AdversaryKind::BallotForging),
            ..base
        },
        Scenario::KeyRotating => SimulationConfig {
            authenticator_adversary: Some(AdversaryKind::KeyRotating),
            ..base
        },
        Scenario::AuthBypass => SimulationConfig {
            authenticator_adversary: Some(AdversaryKind::AuthBypass),
            ..base
        },
        Scenario::SilentDos => SimulationConfig {
            tabulator_adversary: Some(AdversaryKind::Silent),
            ..base
        },
    }
}

/// Runs one simulated election end to end and prints the committed results
/// to stdout.
pub fn run(args: &SimulateArgs) -> Result<()> {
    let config = config_for(args.scenario, args);
    let template = default_template();
    let roll = match &args.roll {
        Some(path) => VoterRoll::load(path)
            .with_context(|| format!("loading voter roll from {}", path.display()))?,
        None => VoterRoll::synthetic(config.num_voters, config.tickets_per_voter),
    };

    info!(
        scenario = ?args.scenario,
        committee_size = config.committee_size,
        voters = roll.len(),
        "starting simulation"
    );
    let election = Election::new(template.clone(), roll.clone(), &config)
        .context("setting up committees")?;

    // Every registered voter walks the full flow, plus the scenario's
    // scripted extras: unknown identities and repeat voters.
    let mut cast = 0usize;
    let mut refused = 0usize;
    let mut votes_since_round = 0usize;

    let mut attempts: Vec<String> = roll.iter().map(|v| v.id.clone()).collect();
    for extra in 0..config.num_unregistered_voters {
        attempts.push((roll.len() + 1 + extra).to_string());
    }
    for voter in roll.iter().take(config.num_double_voting_voters) {
        attempts.push(voter.id.clone());
    }

    let num_attempts = attempts.len();
    let mut last_round = std::time::Instant::now();
    for (index, voter_id) in attempts.iter().enumerate() {
        let selections = scripted_selections(&template, index, num_attempts);
        match election.cast_vote(voter_id, &selections) {
            Ok(()) => cast += 1,
            Err(err) => {
                // Refusals are the interesting output in the adversarial
                // scenarios; the election carries on without the ballot.
                warn!(voter = voter_id.as_str(), %err, "vote refused");
                refused += 1;
            }
        }
        votes_since_round += 1;
        let round_due = match args.round_seconds {
            Some(seconds) => last_round.elapsed().as_secs() >= seconds,
            None => votes_since_round >= config.round_interval,
        };
        if round_due {
            election.run_consensus_round().context("consensus round")?;
            votes_since_round = 0;
            last_round = std::time::Instant::now();
        }
    }

    // Final round so every broadcast transaction gets its commit vote.
    election.run_consensus_round().context("final consensus round")?;

    info!(cast, refused, "election over");
    println!("Election over. Ballots cast: {cast}, refused: {refused}.");
    match election.results() {
        Some(results) => {
            println!("Committed tally:");
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        None => println!("Tabulators are not in sync; wait for the next consensus round."),
    }
    match election.remaining_tickets() {
        Some(remaining) => {
            println!("Remaining claim tickets:");
            println!("{}", serde_json::to_string_pretty(&remaining)?);
        }
        None => println!("Authenticators are not in sync; wait for the next consensus round."),
    }
    Ok(())
}
