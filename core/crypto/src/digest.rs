use avs_types::TaskDigest;
use ethers::abi::{encode, Token};
use ethers::types::U256;
use sha3::{Digest, Keccak256};

/// Canonical digest for the alert task shape: Keccak-256 over the ABI
/// tuple `(bytes32 messageHash, uint32 referenceBlockNumber)`.
///
/// Must never depend on quorum membership or stakes -- only on the task
/// identity and the reference block, so a later change to the registry
/// snapshot can never change a task's digest.
pub fn alert_task_digest(message_hash: [u8; 32], reference_block_number: u32) -> TaskDigest {
    let encoded = encode(&[
        Token::FixedBytes(message_hash.to_vec()),
        Token::Uint(U256::from(reference_block_number)),
    ]);
    Keccak256::digest(&encoded).into()
}

/// Canonical digest for the generic task shape: additionally binds the
/// method selector and chain id ahead of the hash, since a generic task
/// can otherwise be replayed across chains or against the wrong method.
pub fn generic_task_digest(
    message_hash: [u8; 32],
    reference_block_number: u32,
    method: [u8; 32],
    chain_id: u64,
) -> TaskDigest {
    let encoded = encode(&[
        Token::FixedBytes(message_hash.to_vec()),
        Token::Uint(U256::from(reference_block_number)),
        Token::FixedBytes(method.to_vec()),
        Token::Uint(U256::from(chain_id)),
    ]);
    Keccak256::digest(&encoded).into()
}

/// Hashes a generic task's call parameters into the 32-byte slot
/// `generic_task_digest` expects as `message_hash`, since the generic
/// shape carries no message hash of its own.
pub fn hash_call_params(call_params: &[Vec<u8>]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for param in call_params {
        hasher.update(param);
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_and_deterministic() {
        let a = alert_task_digest([7u8; 32], 42);
        let b = alert_task_digest([7u8; 32], 42);
        assert_eq!(a, b);
    }

    #[test]
    fn digest_depends_only_on_message_and_block() {
        let a = alert_task_digest([1u8; 32], 1);
        let b = alert_task_digest([1u8; 32], 2);
        let c = alert_task_digest([2u8; 32], 1);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn generic_digest_binds_method_and_chain() {
        let base = generic_task_digest([1u8; 32], 1, [0u8; 32], 1);
        let diff_method = generic_task_digest([1u8; 32], 1, [9u8; 32], 1);
        let diff_chain = generic_task_digest([1u8; 32], 1, [0u8; 32], 2);
        assert_ne!(base, diff_method);
        assert_ne!(base, diff_chain);
    }
}
