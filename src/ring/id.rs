use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Width of the identifier space in bits. Fixed at build time and must be the
/// same on every peer of a ring.
pub const RING_BITS: usize = 128;

/// A point on the ring, mod 2^128.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identifier(pub u128);

impl Identifier {
    /// Start of the i-th finger interval: `(self + 2^i) mod 2^128`.
    pub fn finger_start(&self, i: usize) -> Identifier {
        Identifier(self.0.wrapping_add(1u128 << i))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({:032x})", self.0)
    }
}

impl FromStr for Identifier {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u128::from_str_radix(s, 16).map(Identifier)
    }
}

/// Hashes arbitrary bytes uniformly onto the ring: the first 16 bytes of
/// SHA-256, big-endian.
pub fn hash_id(bytes: &[u8]) -> Identifier {
    let digest = Sha256::digest(bytes);
    let mut buf = [0u8; 16];
    buf.copy_from_slice(&digest[..16]);
    Identifier(u128::from_be_bytes(buf))
}

/// True iff `x` lies on the clockwise arc from `a` (exclusive) to `b`
/// (inclusive per `inclusive_b`).
///
/// `a == b` denotes the full ring, so a singleton node owns every key. The
/// wrap-around case `b < a` is the one every lookup leans on.
pub fn in_arc(x: Identifier, a: Identifier, b: Identifier, inclusive_b: bool) -> bool {
    if a == b {
        return x != a || inclusive_b;
    }
    if a < b {
        x > a && (x < b || (inclusive_b && x == b))
    } else {
        x > a || x < b || (inclusive_b && x == b)
    }
}
