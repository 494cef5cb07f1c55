//! Committee networking: node admission rules, the consensus participant
//! behavior, and the barrier-synchronous round driver.

pub mod consensus;
pub mod driver;
pub mod node;

pub use consensus::RoundOutcome;
pub use driver::{Committee, RoundReport};
pub use node::{Node, NodeError, NodeRole, SharedNode};
