//! BN254 digest, point codec, and BLS aggregation primitives. Everything
//! outside this crate treats [`G1Point`]/[`G2Point`] as opaque monoid
//! elements; only code here ever touches the serialized on-chain tuple
//! form or does curve arithmetic directly.

mod bls;
mod digest;
mod points;

pub use ark_bn254::{G1Affine, G2Affine};
pub use bls::{hash_to_g1, verify};
pub use digest::{alert_task_digest, generic_task_digest, hash_call_params};
pub use points::{
    g1_from_onchain, g1_to_onchain, g2_to_onchain, G1Point, G2Point, OnChainG1Point,
    OnChainG2Point,
};
