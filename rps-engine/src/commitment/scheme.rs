use super::{BetHash, Secret};
use crate::Move;
use sha2::{Digest, Sha256};

/// Trait for commitment schemes
pub trait CommitmentScheme {
    fn commit(mv: Move, secret: &Secret) -> BetHash;

    fn verify(commitment: &BetHash, mv: Move, secret: &Secret) -> bool {
        Self::commit(mv, secret) == *commitment
    }
}

/// SHA-256 over the 33-byte pre-image `move_code || secret`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Scheme;

impl CommitmentScheme for Sha256Scheme {
    fn commit(mv: Move, secret: &Secret) -> BetHash {
        let mut hasher = Sha256::new();
        hasher.update([mv.code()]);
        hasher.update(secret.as_bytes());
        BetHash::from_bytes(hasher.finalize().into())
    }
}
