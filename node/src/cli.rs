//! # CLI Interface
//!
//! Command-line argument structure for `civitas-node` using `clap` derive.
//! Two subcommands: `simulate` runs a scripted election scenario, `version`
//! prints build information.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Civitas committee simulator.
///
/// Runs a simulated two-committee election: Authenticators issue claim
/// tickets against the voter roll, Tabulators accept ballots against those
/// tickets, and both committees commit their ledgers through periodic
/// consensus rounds.
#[derive(Parser, Debug)]
#[command(
    name = "civitas-node",
    about = "Civitas committee simulator",
    version,
    propagate_version = true
)]
pub struct CivitasCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a simulated election scenario.
    Simulate(SimulateArgs),
    /// Print version information and exit.
    Version,
}

/// Named scenarios, covering the honest path and each adversary class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Valid voters casting valid votes.
    HappyPath,
    /// Unknown voters attempting to cast votes.
    UnknownVoter,
    /// Valid voters attempting to cast extra votes.
    DoubleVote,
    /// Tabulators splicing arbitrary write-ins into ballots.
    BallotForger,
    /// Authenticators signing with throwaway keys.
    KeyRotating,
    /// Authenticators issuing unsigned claim tickets to anyone.
    AuthBypass,
    /// Tabulators silently dropping out of consensus rounds.
    SilentDos,
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = clap::ValueEnum::to_possible_value(self)
            .expect("scenario variants are never skipped");
        f.write_str(value.get_name())
    }
}

/// Arguments for the `simulate` subcommand.
#[derive(Parser, Debug)]
pub struct SimulateArgs {
    /// Scenario to run.
    #[arg(long, short = 's', value_enum, default_value_t = Scenario::HappyPath)]
    pub scenario: Scenario,

    /// Nodes per committee.
    #[arg(long, env = "CIVITAS_COMMITTEE_SIZE", default_value_t = 50)]
    pub committee_size: usize,

    /// Number of simulated registered voters.
    #[arg(long, env = "CIVITAS_VOTERS", default_value_t = 10)]
    pub voters: usize,

    /// Votes between consensus rounds.
    #[arg(long, default_value_t = 4)]
    pub round_interval: usize,

    /// Trigger consensus rounds by elapsed wall-clock seconds instead of by
    /// vote count. Advisory pacing only; the round itself never consults the
    /// clock.
    #[arg(long)]
    pub round_seconds: Option<u64>,

    /// Load the voter roll from a JSON file instead of synthesizing one.
    ///
    /// Records look like `{"name": "ada lovelace", "num_claim_tickets": 1}`;
    /// ids are assigned sequentially in file order.
    #[arg(long)]
    pub roll: Option<PathBuf>,

    /// Default log level when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log output format: pretty or json.
    #[arg(long, default_value = "pretty")]
    pub log_format: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        CivitasCli::command().debug_assert();
    }

    #[test]
    fn scenario_names_parse() {
        let cli =
            CivitasCli::try_parse_from(["civitas-node", "simulate", "-s", "silent-dos"]).unwrap();
        match cli.command {
            Commands::Simulate(args) => assert_eq!(args.scenario, Scenario::SilentDos),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
