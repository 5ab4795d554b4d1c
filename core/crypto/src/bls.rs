use ark_bn254::{Bn254, Fq, G1Affine, G2Affine};
use ark_ec::pairing::Pairing;
use ark_ec::AffineRepr;
use ark_ff::{Field, PrimeField};
use avs_types::TaskDigest;
use sha3::{Digest, Keccak256};

use crate::points::{G1Point, G2Point};

/// Maps a task digest onto a point in G1 via try-and-increment: hash the
/// digest with an incrementing counter until the resulting x-coordinate has
/// a square root satisfying `y^2 = x^3 + 3` (the BN254 short Weierstrass
/// equation).
pub fn hash_to_g1(digest: &TaskDigest) -> G1Point {
    let three = Fq::from(3u64);
    for counter in 0u16..=u16::MAX {
        let mut preimage = Vec::with_capacity(34);
        preimage.extend_from_slice(digest);
        preimage.extend_from_slice(&counter.to_be_bytes());
        let x_bytes: [u8; 32] = Keccak256::digest(&preimage).into();
        let x = Fq::from_be_bytes_mod_order(&x_bytes);
        let y_squared = x * x * x + three;
        if let Some(y) = y_squared.sqrt() {
            return G1Point(G1Affine::new_unchecked(x, y));
        }
    }
    unreachable!("a quadratic residue is found within 2^16 attempts with overwhelming probability")
}

/// Verifies a BLS signature on `digest` under an operator's public key.
/// The pairing check always uses the G2 public key; the G1 public key is
/// only used by on-chain verification of individual signers, which this
/// core never performs itself.
pub fn verify(signature: &G1Point, digest: &TaskDigest, pubkey_g2: &G2Point) -> bool {
    let h = hash_to_g1(digest).0;
    let g2_generator = G2Affine::generator();
    let lhs = Bn254::pairing(signature.0, g2_generator);
    let rhs = Bn254::pairing(h, pubkey_g2.0);
    lhs == rhs
}
