pub mod scheme;

pub use scheme::{CommitmentScheme, Sha256Scheme};

use crate::{Move, Result, RpsError};
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

macro_rules! hex_digest {
    ($name:ident) => {
        impl $name {
            pub const ZERO: $name = $name([0u8; 32]);

            pub fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; 32]
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = RpsError;

            fn from_str(s: &str) -> Result<Self> {
                decode_32(s).map(Self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

fn decode_32(s: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(s.trim_start_matches("0x"))
        .map_err(|e| RpsError::invalid_argument(format!("Invalid hex: {}", e)))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| RpsError::invalid_argument(format!("Expected 32 bytes, got {}", b.len())))
}

/// Hash binding a move to a secret.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BetHash([u8; 32]);

hex_digest!(BetHash);

impl BetHash {
    pub fn compute(mv: Move, secret: &Secret) -> Self {
        Sha256Scheme::commit(mv, secret)
    }

    pub fn verify(&self, mv: Move, secret: &Secret) -> bool {
        Sha256Scheme::verify(self, mv, secret)
    }
}

/// Game identifier derived from a human-readable name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GameId([u8; 32]);

hex_digest!(GameId);

impl GameId {
    pub fn from_name(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(RpsError::invalid_argument("Game name cannot be empty"));
        }
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        Ok(Self(hasher.finalize().into()))
    }
}

/// 32-byte secret kept by a player until reveal.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret([u8; 32]);

impl Secret {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Secret {
    type Err = RpsError;

    fn from_str(s: &str) -> Result<Self> {
        decode_32(s).map(Self)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}

/// Rnd secret for commitment
pub fn generate_secret() -> Secret {
    let mut secret = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut secret);
    Secret(secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commitment_scheme() {
        let secret = generate_secret();
        let hash = BetHash::compute(Move::Paper, &secret);

        assert!(hash.verify(Move::Paper, &secret));
        assert!(!hash.verify(Move::Rock, &secret));
        assert!(!hash.verify(Move::Paper, &generate_secret()));
    }

    #[test]
    fn test_encoding_is_move_tag_then_secret() {
        let secret = Secret::from_bytes([7u8; 32]);
        let mut preimage = vec![Move::Scissors.code()];
        preimage.extend_from_slice(&[7u8; 32]);
        let expected: [u8; 32] = Sha256::digest(&preimage).into();

        assert_eq!(
            BetHash::compute(Move::Scissors, &secret).as_bytes(),
            &expected
        );
    }

    #[test]
    fn test_hex_round_trip() {
        let hash = BetHash::compute(Move::Rock, &Secret::from_bytes([1u8; 32]));
        let parsed: BetHash = hash.to_hex().parse().unwrap();
        assert_eq!(parsed, hash);

        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash.to_hex()));
        assert!("abcd".parse::<BetHash>().is_err());
    }

    #[test]
    fn test_game_id_from_name() {
        let a = GameId::from_name("my game").unwrap();
        let b = GameId::from_name("my game").unwrap();
        let c = GameId::from_name("other game").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(!a.is_zero());
        assert!(GameId::from_name("").is_err());
    }
}
