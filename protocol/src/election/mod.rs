//! Election data model: voters, the voter roll, ballots, and claim tickets.

pub mod ballot;
pub mod ticket;
pub mod voter;

pub use ballot::{Ballot, BallotError, BallotItem};
pub use ticket::ClaimTicket;
pub use voter::{RollError, Voter, VoterRoll};
