//! # Blockchain Replica
//!
//! Each node holds its own full copy of its committee's chain. Blocks are
//! only appended, never removed; the chain is the committee's audit trail,
//! and correcting a mistake means committing a correcting block, not
//! rewriting history.
//!
//! Besides the head pointer, the replica answers the two history questions
//! validation needs: has this claim ticket ever been spent, and how many
//! retrievals has this voter committed.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::crypto::{BlockHash, MessageSigner};
use crate::ledger::block::{Block, BlockError};
use crate::ledger::state::LedgerState;
use crate::transaction::{Transaction, TxContent};

/// Errors appending to a chain.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error(transparent)]
    Block(#[from] BlockError),
}

/// An append-only chain of blocks, starting at genesis.
#[derive(Debug, Clone)]
pub struct Blockchain {
    blocks: Vec<Block>,
}

impl Blockchain {
    /// Creates a replica whose genesis block carries `initial` state.
    pub fn bootstrap(
        initial: LedgerState,
        at: DateTime<Utc>,
        signer: &dyn MessageSigner,
    ) -> Result<Self, ChainError> {
        let genesis = Block::genesis(initial, at, signer)?;
        Ok(Self {
            blocks: vec![genesis],
        })
    }

    /// The most recently committed block.
    pub fn head(&self) -> &Block {
        self.blocks
            .last()
            .expect("a blockchain always contains at least its genesis block")
    }

    /// Content hash of the head block; what peers compare in phase A.
    pub fn head_hash(&self) -> BlockHash {
        *self.head().hash()
    }

    /// Committed ledger state at the head.
    pub fn state(&self) -> &LedgerState {
        self.head().state()
    }

    /// Number of committed blocks, genesis included.
    pub fn height(&self) -> usize {
        self.blocks.len()
    }

    /// All blocks from genesis to head.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Commits a new block on the current head from a round's approved
    /// transactions and returns it.
    pub fn commit(
        &mut self,
        transactions: Vec<Transaction>,
        at: DateTime<Utc>,
        signer: &dyn MessageSigner,
    ) -> Result<&Block, ChainError> {
        let block = Block::next(self.head(), transactions, at, signer)?;
        self.blocks.push(block);
        Ok(self.head())
    }

    /// Whether a claim ticket id appears anywhere in committed history.
    pub fn ticket_spent(&self, ticket_id: &Uuid) -> bool {
        self.committed().any(|tx| match tx.content() {
            TxContent::Ballot { ticket, .. } => ticket.id() == ticket_id,
            TxContent::Voter(_) => false,
        })
    }

    /// Number of committed retrieval transactions referencing a voter.
    pub fn committed_retrievals(&self, voter_id: &str) -> usize {
        self.committed()
            .filter(|tx| match tx.content() {
                TxContent::Voter(voter) => voter.id == voter_id,
                TxContent::Ballot { .. } => false,
            })
            .count()
    }

    /// Number of committed ballot transactions across the whole chain.
    pub fn committed_ballots(&self) -> usize {
        self.committed()
            .filter(|tx| matches!(tx.content(), TxContent::Ballot { .. }))
            .count()
    }

    /// Every committed transaction, oldest block first.
    pub fn committed(&self) -> impl Iterator<Item = &Transaction> {
        self.blocks.iter().flat_map(|b| b.transactions().iter())
    }
}
