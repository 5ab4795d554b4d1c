use ark_bn254::{Fq, G1Affine, G2Affine};
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::{BigInteger, PrimeField};
use serde::{Deserialize, Serialize};

/// A point in the BN254 G1 group, stored in affine form. The aggregation
/// engine treats these as opaque monoid elements; only this crate ever
/// looks at the serialized wire form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct G1Point(pub G1Affine);

/// A point in the BN254 G2 group, stored in affine form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct G2Point(pub G2Affine);

impl G1Point {
    pub fn identity() -> Self {
        G1Point(G1Affine::identity())
    }

    /// Group addition. Commutative and associative, so the order in which
    /// signatures/pubkeys are folded in never affects the result.
    pub fn add(&self, other: &Self) -> Self {
        G1Point((self.0 + other.0).into_affine())
    }
}

impl G2Point {
    pub fn identity() -> Self {
        G2Point(G2Affine::identity())
    }

    pub fn add(&self, other: &Self) -> Self {
        G2Point((self.0 + other.0).into_affine())
    }
}

impl Default for G1Point {
    fn default() -> Self {
        Self::identity()
    }
}

impl Default for G2Point {
    fn default() -> Self {
        Self::identity()
    }
}

fn fq_to_be_bytes(f: &Fq) -> [u8; 32] {
    let mut bytes = f.into_bigint().to_bytes_be();
    // BigInteger::to_bytes_be is already 32 bytes for the BN254 base field,
    // but pad defensively in case of a shorter canonical representation.
    while bytes.len() < 32 {
        bytes.insert(0, 0);
    }
    bytes.try_into().expect("bn254 base field element is <= 32 bytes")
}

fn fq_from_be_bytes(bytes: &[u8; 32]) -> Fq {
    Fq::from_be_bytes_mod_order(bytes)
}

/// On-chain tuple form of a G1 point: `{X, Y}`, big-integer representatives
/// modulo the BN254 field prime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnChainG1Point {
    pub x: [u8; 32],
    pub y: [u8; 32],
}

/// On-chain tuple form of a G2 point: `{X=[x1,x0], Y=[y1,y0]}` -- component
/// order matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnChainG2Point {
    pub x: [[u8; 32]; 2],
    pub y: [[u8; 32]; 2],
}

/// Total conversion: never panics for points produced by the registry view
/// or the engine's running sums.
pub fn g1_to_onchain(p: &G1Point) -> OnChainG1Point {
    if p.0.is_zero() {
        return OnChainG1Point {
            x: [0u8; 32],
            y: [0u8; 32],
        };
    }
    OnChainG1Point {
        x: fq_to_be_bytes(&p.0.x),
        y: fq_to_be_bytes(&p.0.y),
    }
}

pub fn g1_from_onchain(p: &OnChainG1Point) -> G1Point {
    if p.x == [0u8; 32] && p.y == [0u8; 32] {
        return G1Point::identity();
    }
    let x = fq_from_be_bytes(&p.x);
    let y = fq_from_be_bytes(&p.y);
    G1Point(G1Affine::new_unchecked(x, y))
}

pub fn g2_to_onchain(p: &G2Point) -> OnChainG2Point {
    if p.0.is_zero() {
        return OnChainG2Point {
            x: [[0u8; 32]; 2],
            y: [[0u8; 32]; 2],
        };
    }
    OnChainG2Point {
        x: [fq_to_be_bytes(&p.0.x.c1), fq_to_be_bytes(&p.0.x.c0)],
        y: [fq_to_be_bytes(&p.0.y.c1), fq_to_be_bytes(&p.0.y.c0)],
    }
}

#[cfg(test)]
mod tests {
    use ark_bn254::G1Projective;
    use ark_ec::CurveGroup;
    use ark_std::UniformRand;

    use super::*;

    #[test]
    fn identity_round_trips_through_onchain_form() {
        let id = G1Point::identity();
        let onchain = g1_to_onchain(&id);
        assert_eq!(onchain.x, [0u8; 32]);
        assert_eq!(onchain.y, [0u8; 32]);
        assert_eq!(g1_from_onchain(&onchain), id);
    }

    #[test]
    fn addition_is_commutative() {
        let mut rng = ark_std::test_rng();
        let a = G1Point(G1Projective::rand(&mut rng).into_affine());
        let b = G1Point(G1Projective::rand(&mut rng).into_affine());
        assert_eq!(a.add(&b), b.add(&a));
    }
}
