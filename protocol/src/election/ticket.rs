//! # Claim Tickets
//!
//! A claim ticket is the single-use bearer token that links the two
//! committees: an Authenticator issues it after checking the voter's
//! allotment, and a Tabulator accepts exactly one ballot against it. The
//! ticket carries no voter information at all; unlinkability between voter
//! identity and cast ballot is the point of splitting the ledgers.
//!
//! Single use is enforced by the Tabulator committee, which scans committed
//! chain history for the ticket id before admitting a ballot, and again by
//! consensus-round conflict resolution when two ballots race on one ticket.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::config;
use crate::crypto::{KeyError, MessageSigner, NodePublicKey, NodeSignature};
use crate::encoding::{Canonical, CanonicalOpts};

/// A bearer token authorising exactly one ballot.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimTicket {
    id: Uuid,
    issuer: NodePublicKey,
    issued_at: DateTime<Utc>,
    signature: NodeSignature,
}

impl ClaimTicket {
    /// Issues a fresh ticket: random 128-bit id, signed by the issuer over
    /// the id's canonical encoding.
    pub fn issue(signer: &dyn MessageSigner) -> Result<Self, KeyError> {
        let id = Uuid::new_v4();
        let issued_at = Utc::now();
        let payload = canonical_id(&id);
        let signature = signer.sign_message(&payload)?;
        Ok(Self {
            id,
            issuer: signer.signer_identity(),
            issued_at,
            signature,
        })
    }

    /// The ticket's 128-bit identifier.
    pub fn id(&self) -> &Uuid {
        &self.id
    }

    /// Public identity the ticket claims as its issuer.
    pub fn issuer(&self) -> &NodePublicKey {
        &self.issuer
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Verifies the issuer's signature over the ticket id.
    ///
    /// Note this only proves the ticket was signed by the key it names;
    /// whether that key belongs to a trusted Authenticator is the
    /// Tabulator's trust-list check, a separate question.
    pub fn verify(&self) -> bool {
        self.issuer.verify(&canonical_id(&self.id), &self.signature)
    }

    /// Whether the presentation window has lapsed. Checked only when a
    /// voter hands the ticket to a Tabulator; committed history never
    /// re-evaluates expiry.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Expiry check against an explicit clock, for tests.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.issued_at + Duration::seconds(config::TICKET_VALIDITY_SECS)
    }
}

impl Canonical for ClaimTicket {
    fn canonical(&self, _opts: CanonicalOpts) -> Vec<u8> {
        canonical_id(&self.id)
    }
}

fn canonical_id(id: &Uuid) -> Vec<u8> {
    id.as_hyphenated().to_string().into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::NodeKeypair;

    #[test]
    fn issued_ticket_verifies() {
        let kp = NodeKeypair::generate().unwrap();
        let ticket = ClaimTicket::issue(&kp).unwrap();
        assert!(ticket.verify());
        assert_eq!(ticket.issuer(), kp.public_key());
    }

    #[test]
    fn ids_are_unique() {
        let kp = NodeKeypair::generate().unwrap();
        let a = ClaimTicket::issue(&kp).unwrap();
        let b = ClaimTicket::issue(&kp).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn tampered_id_fails_verification() {
        let kp = NodeKeypair::generate().unwrap();
        let mut ticket = ClaimTicket::issue(&kp).unwrap();
        ticket.id = Uuid::new_v4();
        assert!(!ticket.verify());
    }

    #[test]
    fn foreign_issuer_fails_verification() {
        let kp = NodeKeypair::generate().unwrap();
        let other = NodeKeypair::generate().unwrap();
        let mut ticket = ClaimTicket::issue(&kp).unwrap();
        ticket.issuer = other.public_key().clone();
        assert!(!ticket.verify());
    }

    #[test]
    fn expiry_window() {
        let kp = NodeKeypair::generate().unwrap();
        let ticket = ClaimTicket::issue(&kp).unwrap();
        assert!(!ticket.is_expired());
        let later = ticket.issued_at() + Duration::seconds(config::TICKET_VALIDITY_SECS + 1);
        assert!(ticket.is_expired_at(later));
    }

    #[test]
    fn canonical_is_the_id() {
        let kp = NodeKeypair::generate().unwrap();
        let ticket = ClaimTicket::issue(&kp).unwrap();
        let bytes = ticket.canonical(CanonicalOpts::default());
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            ticket.id().as_hyphenated().to_string()
        );
    }
}
