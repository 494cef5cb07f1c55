//! # Key Management
//!
//! RSA keypairs and PSS signatures for committee node identities.
//!
//! Every node in a committee holds an RSA keypair. The public half, wrapped
//! in [`NodePublicKey`], is the node's identity: peers index each other by a
//! SHA-256 fingerprint over the public modulus and exponent, and every
//! transaction, claim ticket, and block header traces back to one of these
//! keys.
//!
//! ## Scheme
//!
//! RSA-PSS over SHA-256 with a fixed salt length (see `config`). PSS is
//! randomized: signing the same message twice yields different bytes, so a
//! signature identifies one concrete signing event. Civitas leans on that:
//! transactions are compared and hashed by their signature bytes.
//!
//! ## Security considerations
//!
//! - Private keys never leave this module and are never serialized.
//! - Key bytes are never logged; `Debug` prints the fingerprint only.
//! - Verification failures are a boolean `false`, not a reason. Callers map
//!   them to a single admission error so no oracle leaks out.

use rand::rngs::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{Pss, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

use crate::config;
use crate::crypto::hash::short_hex;
use crate::encoding::FIELD_SEPARATOR;

/// Errors raised by key operations.
///
/// Deliberately vague about causes; the details live in logs at the call
/// site, not in the error an attacker might observe.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("key generation failed")]
    Generation,

    #[error("signing failed")]
    Signing,
}

/// PSS padding configured the one way this protocol uses it.
fn pss() -> Pss {
    Pss::new_with_salt::<Sha256>(config::PSS_SALT_LEN)
}

// ---------------------------------------------------------------------------
// NodePublicKey
// ---------------------------------------------------------------------------

/// The public half of a node identity, safe to hand to every peer.
///
/// Equality and hashing go through the SHA-256 fingerprint of `(n, e)`, so
/// this type can key peer directories and trust lists directly.
#[derive(Clone)]
pub struct NodePublicKey {
    key: RsaPublicKey,
    fingerprint: [u8; 32],
}

impl NodePublicKey {
    fn from_rsa(key: RsaPublicKey) -> Self {
        let mut preimage = key.n().to_bytes_be();
        preimage.push(FIELD_SEPARATOR);
        preimage.extend_from_slice(&key.e().to_bytes_be());
        let fingerprint = crate::crypto::hash::sha256(&preimage);
        Self { key, fingerprint }
    }

    /// SHA-256 fingerprint over the public modulus and exponent. This is the
    /// address peers know the node by.
    pub fn fingerprint(&self) -> &[u8; 32] {
        &self.fingerprint
    }

    /// Hex-encoded fingerprint.
    pub fn to_hex(&self) -> String {
        hex::encode(self.fingerprint)
    }

    /// Verifies an RSA-PSS signature over `message` under this key.
    ///
    /// Returns a plain boolean: callers only ever need yes or no, and
    /// distinguishing "garbled signature" from "wrong key" helps nobody but
    /// an attacker.
    pub fn verify(&self, message: &[u8], signature: &NodeSignature) -> bool {
        let digest = Sha256::digest(message);
        self.key
            .verify(pss(), digest.as_slice(), signature.as_bytes())
            .is_ok()
    }
}

impl PartialEq for NodePublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
    }
}

impl Eq for NodePublicKey {}

impl Hash for NodePublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fingerprint.hash(state);
    }
}

impl fmt::Display for NodePublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for NodePublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodePublicKey({})", short_hex(&self.fingerprint))
    }
}

// ---------------------------------------------------------------------------
// NodeSignature
// ---------------------------------------------------------------------------

/// An RSA-PSS signature, stored as opaque bytes.
///
/// Opaque on purpose: adversarial strategies fabricate "signatures" that are
/// not valid PSS encodings at all, and the verifier must treat those exactly
/// like any other bad signature rather than panic while parsing.
#[derive(Clone, PartialEq, Eq)]
pub struct NodeSignature {
    bytes: Vec<u8>,
}

impl NodeSignature {
    /// Wraps raw signature bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// The raw signature bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Hex rendering of the full signature.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl Hash for NodeSignature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl fmt::Display for NodeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for NodeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeSignature({}.., {} bytes)", short_hex(&self.bytes), self.bytes.len())
    }
}

// ---------------------------------------------------------------------------
// NodeKeypair
// ---------------------------------------------------------------------------

/// An RSA keypair owned by one committee node.
///
/// Does not implement `Clone`, `Serialize`, or anything else that would make
/// private key material ambient. A node is its keypair; copies of it are
/// copies of the node's authority.
pub struct NodeKeypair {
    private: RsaPrivateKey,
    public: NodePublicKey,
}

impl NodeKeypair {
    /// Generates a fresh keypair from the OS RNG at the configured modulus
    /// size.
    pub fn generate() -> Result<Self, KeyError> {
        Self::generate_with_bits(config::RSA_KEY_BITS)
    }

    /// Generates a keypair with an explicit modulus size. Exposed so tests
    /// can trade security margin for speed.
    pub fn generate_with_bits(bits: usize) -> Result<Self, KeyError> {
        let private = RsaPrivateKey::new(&mut OsRng, bits).map_err(|_| KeyError::Generation)?;
        let public = NodePublicKey::from_rsa(private.to_public_key());
        Ok(Self { private, public })
    }

    /// The public identity derived from this keypair.
    pub fn public_key(&self) -> &NodePublicKey {
        &self.public
    }

    /// Signs `message` with RSA-PSS over SHA-256.
    pub fn sign(&self, message: &[u8]) -> Result<NodeSignature, KeyError> {
        let digest = Sha256::digest(message);
        let bytes = self
            .private
            .sign_with_rng(&mut OsRng, pss(), digest.as_slice())
            .map_err(|_| KeyError::Signing)?;
        Ok(NodeSignature::from_bytes(bytes))
    }
}

impl fmt::Debug for NodeKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print private key material, not even partially.
        write!(f, "NodeKeypair(pub={})", short_hex(&self.public.fingerprint))
    }
}

// ---------------------------------------------------------------------------
// MessageSigner
// ---------------------------------------------------------------------------

/// The signing seam between honest cryptography and injected misbehavior.
///
/// Transactions, claim tickets, and block headers are all signed through
/// this trait. Honest nodes pass a [`NodeKeypair`]; adversarial strategies
/// substitute implementations that rotate keys or skip signing entirely,
/// without the signed types knowing the difference.
pub trait MessageSigner {
    /// The public identity this signer advertises on its artifacts.
    fn signer_identity(&self) -> NodePublicKey;

    /// Produces a signature over `message`.
    fn sign_message(&self, message: &[u8]) -> Result<NodeSignature, KeyError>;
}

impl MessageSigner for NodeKeypair {
    fn signer_identity(&self) -> NodePublicKey {
        self.public.clone()
    }

    fn sign_message(&self, message: &[u8]) -> Result<NodeSignature, KeyError> {
        self.sign(message)
    }
}
