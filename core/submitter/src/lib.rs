//! A reference [`Submitter`]. On-chain transaction construction and
//! submission are an external collaborator's job, not the core's; this
//! crate provides the reference/demo implementation the node binary and
//! integration tests wire in, not a production chain client.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use avs_interfaces::{NonSignerStakesAndSignature, Receipt, SubmitError, Submitter};
use avs_types::Task;
use sha3::{Digest, Keccak256};
use tracing::info;

/// Logs the confirmation it would have sent and fabricates a receipt keyed
/// off the task digest and aggregate signature, standing in for the real
/// transaction broadcast + inclusion wait.
#[derive(Default)]
pub struct LoggingSubmitter {
    next_block: AtomicU64,
}

impl LoggingSubmitter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Submitter for LoggingSubmitter {
    async fn submit_confirmation(
        &self,
        task: &Task,
        witness: NonSignerStakesAndSignature,
    ) -> Result<Receipt, SubmitError> {
        info!(
            index = task.index,
            digest = ?task.digest,
            non_signers = witness.non_signer_pubkeys.len(),
            "submitting aggregated confirmation"
        );

        let mut hasher = Keccak256::new();
        hasher.update(task.digest);
        hasher.update(task.index.to_be_bytes());
        let tx_hash: [u8; 32] = hasher.finalize().into();

        let block_number = self.next_block.fetch_add(1, Ordering::SeqCst);
        let mut block_hasher = Keccak256::new();
        block_hasher.update(block_number.to_be_bytes());
        let block_hash: [u8; 32] = block_hasher.finalize().into();

        Ok(Receipt {
            tx_hash,
            block_hash,
            block_number,
            tx_index: 0,
        })
    }
}
