// Copyright (c) 2026 Civitas Project. MIT License.
// See LICENSE for details.

//! # Civitas Core Library
//!
//! Civitas simulates a distributed electronic voting system as two parallel,
//! replicated append-only ledgers operated by fixed committees of signing
//! nodes:
//!
//! - the **Authenticator** committee tracks voter eligibility
//!   (voter id to remaining claim tickets), and
//! - the **Tabulator** committee tracks the ballot tally
//!   (position to candidate vote counts).
//!
//! Committees advance by a leaderless, round-based consensus protocol in the
//! Ripple family: federated agreement over a known participant set, with an
//! 80% approval threshold per transaction. Every ballot is bound to a
//! single-use claim ticket issued by an Authenticator, so double voting is
//! caught twice: once at local admission, and again when the committee votes.
//!
//! ## Architecture
//!
//! - **crypto**: RSA-PSS keys, signatures, and SHA-256 hashing.
//! - **encoding**: deterministic canonical byte encoding; the bytes that
//!   get signed are also the object's identity.
//! - **election**: voters, the voter roll, ballots, and claim tickets.
//! - **transaction**: signed state transitions over voters and ballots.
//! - **ledger**: blocks, per-committee ledger state, and chain replicas.
//! - **network**: node admission rules and the four-phase consensus round.
//! - **adversary**: per-node behavior strategies for fault injection.
//! - **sim**: the election harness that wires both committees together.
//!
//! ## Design Philosophy
//!
//! 1. Determinism over cleverness: honest replicas must agree byte for byte.
//! 2. Every rule the committee enforces is enforced twice (admission and
//!    consensus), because adversaries do not respect the first check.
//! 3. Adversaries are composed behaviors, not special node types.
//! 4. If it touches a ballot, it has tests.

pub mod adversary;
pub mod config;
pub mod crypto;
pub mod election;
pub mod encoding;
pub mod error;
pub mod ledger;
pub mod network;
pub mod sim;
pub mod transaction;
