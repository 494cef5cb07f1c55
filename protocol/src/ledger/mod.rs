//! Twin-ledger storage: per-committee state, blocks, and chain replicas.

pub mod block;
pub mod chain;
pub mod state;

pub use block::{Block, BlockError};
pub use chain::{Blockchain, ChainError};
pub use state::{EligibilityLedger, LedgerState, StateError, TallyLedger};
