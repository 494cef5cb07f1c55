//! # Blocks
//!
//! A block packages one consensus round's approved transactions together
//! with the ledger state that results from applying them to the predecessor
//! block's state. Two separable pieces of identity:
//!
//! - the **content hash**, SHA-256 over
//!   `(transaction signatures in order || predecessor hash || minute timestamp
//!   || genesis flag)`. Honest replicas committing the same approved set on
//!   the same predecessor in the same minute produce the same hash, which is
//!   what peer-set agreement compares.
//! - the **header**, the committing node's signature over that hash. Headers
//!   differ per replica by design; they prove which node committed the
//!   block, nothing more.
//!
//! Transactions are ordered by signature bytes before hashing or applying,
//! so replica-local iteration order never leaks into consensus.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::crypto::{sha256, BlockHash, KeyError, MessageSigner, NodePublicKey, NodeSignature};
use crate::encoding::{format_minute, push_field};
use crate::ledger::state::{LedgerState, StateError};
use crate::transaction::Transaction;

/// Errors constructing a block.
#[derive(Debug, Error)]
pub enum BlockError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Signing(#[from] KeyError),
}

/// One committed block in a committee's chain.
#[derive(Debug, Clone)]
pub struct Block {
    transactions: Vec<Transaction>,
    issuer: NodePublicKey,
    predecessor: Option<BlockHash>,
    timestamp: DateTime<Utc>,
    state: LedgerState,
    hash: BlockHash,
    header: NodeSignature,
}

impl Block {
    /// Builds the genesis block carrying a committee's initial state.
    pub fn genesis(
        state: LedgerState,
        at: DateTime<Utc>,
        signer: &dyn MessageSigner,
    ) -> Result<Self, BlockError> {
        let hash = content_hash(&[], None, &at, true);
        let header = signer.sign_message(&hash)?;
        Ok(Self {
            transactions: Vec::new(),
            issuer: signer.signer_identity(),
            predecessor: None,
            timestamp: at,
            state,
            hash,
            header,
        })
    }

    /// Builds the successor of `prev` from a round's approved transactions.
    ///
    /// Sorts the set by signature bytes, applies it to the predecessor's
    /// state, and signs the resulting content hash. State application errors
    /// are protocol bugs surfaced verbatim.
    pub fn next(
        prev: &Block,
        mut transactions: Vec<Transaction>,
        at: DateTime<Utc>,
        signer: &dyn MessageSigner,
    ) -> Result<Self, BlockError> {
        transactions.sort_by(|a, b| a.signature().as_bytes().cmp(b.signature().as_bytes()));

        let mut state = prev.state.clone();
        state.apply_all(&transactions)?;

        let hash = content_hash(&transactions, Some(&prev.hash), &at, false);
        let header = signer.sign_message(&hash)?;
        Ok(Self {
            transactions,
            issuer: signer.signer_identity(),
            predecessor: Some(prev.hash),
            timestamp: at,
            state,
            hash,
            header,
        })
    }

    /// Transactions in committed (signature-byte) order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// The node that committed this replica's copy of the block.
    pub fn issuer(&self) -> &NodePublicKey {
        &self.issuer
    }

    pub fn predecessor(&self) -> Option<&BlockHash> {
        self.predecessor.as_ref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Ledger state after applying this block's transactions.
    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    /// Deterministic content hash; the cross-replica comparison key.
    pub fn hash(&self) -> &BlockHash {
        &self.hash
    }

    /// The committing node's signature over the content hash.
    pub fn header(&self) -> &NodeSignature {
        &self.header
    }

    pub fn is_genesis(&self) -> bool {
        self.predecessor.is_none()
    }
}

fn content_hash(
    transactions: &[Transaction],
    predecessor: Option<&BlockHash>,
    at: &DateTime<Utc>,
    genesis: bool,
) -> BlockHash {
    let mut buf = Vec::new();
    for tx in transactions {
        push_field(&mut buf, tx.signature().as_bytes());
    }
    push_field(&mut buf, predecessor.map(|h| h.as_slice()).unwrap_or(&[]));
    push_field(&mut buf, format_minute(at).as_bytes());
    push_field(&mut buf, if genesis { b"1" } else { b"0" });
    sha256(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::NodeKeypair;
    use crate::election::VoterRoll;
    use crate::ledger::state::EligibilityLedger;
    use crate::transaction::Transaction;

    fn initial_state() -> LedgerState {
        LedgerState::Eligibility(EligibilityLedger::from_roll(&VoterRoll::synthetic(2, 1)))
    }

    fn voter_tx(kp: &NodeKeypair, voter_id: &str) -> Transaction {
        let roll = VoterRoll::synthetic(2, 1);
        Transaction::voter_retrieval(roll.get(voter_id).unwrap().clone(), kp).unwrap()
    }

    #[test]
    fn genesis_has_no_predecessor() {
        let kp = NodeKeypair::generate().unwrap();
        let genesis = Block::genesis(initial_state(), Utc::now(), &kp).unwrap();
        assert!(genesis.is_genesis());
        assert!(genesis.predecessor().is_none());
        assert!(genesis.transactions().is_empty());
    }

    #[test]
    fn genesis_hash_agrees_across_replicas() {
        // Different nodes, same initial state and timestamp: same hash,
        // different headers.
        let kp1 = NodeKeypair::generate().unwrap();
        let kp2 = NodeKeypair::generate().unwrap();
        let at = Utc::now();
        let g1 = Block::genesis(initial_state(), at, &kp1).unwrap();
        let g2 = Block::genesis(initial_state(), at, &kp2).unwrap();
        assert_eq!(g1.hash(), g2.hash());
        assert_ne!(g1.header(), g2.header());
    }

    #[test]
    fn successor_links_and_applies() {
        let kp = NodeKeypair::generate().unwrap();
        let at = Utc::now();
        let genesis = Block::genesis(initial_state(), at, &kp).unwrap();
        let tx = voter_tx(&kp, "1");
        let block = Block::next(&genesis, vec![tx], at, &kp).unwrap();
        assert_eq!(block.predecessor(), Some(genesis.hash()));
        assert!(!block.is_genesis());
        assert_eq!(block.state().as_eligibility().unwrap().remaining("1"), Some(0));
        assert_eq!(block.state().as_eligibility().unwrap().remaining("2"), Some(1));
    }

    #[test]
    fn same_set_same_minute_same_hash() {
        let kp1 = NodeKeypair::generate().unwrap();
        let kp2 = NodeKeypair::generate().unwrap();
        let at = Utc::now();
        let g1 = Block::genesis(initial_state(), at, &kp1).unwrap();
        let g2 = Block::genesis(initial_state(), at, &kp2).unwrap();

        let tx_a = voter_tx(&kp1, "1");
        let tx_b = voter_tx(&kp1, "2");
        // Opposite insertion orders; sorting makes the hashes agree.
        let b1 = Block::next(&g1, vec![tx_a.clone(), tx_b.clone()], at, &kp1).unwrap();
        let b2 = Block::next(&g2, vec![tx_b, tx_a], at, &kp2).unwrap();
        assert_eq!(b1.hash(), b2.hash());
    }

    #[test]
    fn hash_depends_on_transaction_set() {
        let kp = NodeKeypair::generate().unwrap();
        let at = Utc::now();
        let genesis = Block::genesis(initial_state(), at, &kp).unwrap();
        let with_tx = Block::next(&genesis, vec![voter_tx(&kp, "1")], at, &kp).unwrap();
        let empty = Block::next(&genesis, vec![], at, &kp).unwrap();
        assert_ne!(with_tx.hash(), empty.hash());
    }

    #[test]
    fn hash_depends_on_predecessor() {
        let kp = NodeKeypair::generate().unwrap();
        let at = Utc::now();
        let genesis = Block::genesis(initial_state(), at, &kp).unwrap();
        let b1 = Block::next(&genesis, vec![], at, &kp).unwrap();
        let b2 = Block::next(&b1, vec![], at, &kp).unwrap();
        assert_ne!(b1.hash(), b2.hash());
    }

    #[test]
    fn empty_block_preserves_state() {
        let kp = NodeKeypair::generate().unwrap();
        let at = Utc::now();
        let genesis = Block::genesis(initial_state(), at, &kp).unwrap();
        let block = Block::next(&genesis, vec![], at, &kp).unwrap();
        assert_eq!(block.state(), genesis.state());
        assert!(block.transactions().is_empty());
    }

    #[test]
    fn invalid_application_refuses_to_build() {
        let kp = NodeKeypair::generate().unwrap();
        let at = Utc::now();
        let genesis = Block::genesis(initial_state(), at, &kp).unwrap();
        // Voter 1 has a single ticket; committing two retrievals is a bug.
        let txs = vec![voter_tx(&kp, "1"), voter_tx(&kp, "1")];
        assert!(matches!(
            Block::next(&genesis, txs, at, &kp),
            Err(BlockError::State(StateError::TicketUnderflow(_)))
        ));
    }
}
