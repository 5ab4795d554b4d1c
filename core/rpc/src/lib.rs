//! The three RPC bindings, all routing to the same
//! [`avs_handler::Handler`]. None of these owns chain-head discovery --
//! that lives behind [`LatestBlock`], supplied by whatever wires up the
//! binding. Determining the aggregator's own view of the latest block is
//! an external collaborator's job, not the core's.

mod grpc;
mod http;
mod jsonrpc;

pub use grpc::{AggregatorGrpcService, proto};
pub use http::legacy_http_router;
pub use jsonrpc::{AggregatorJsonRpcServer, AggregatorRpcImpl};

/// Supplies the reference block a `CreateTask` call should admit against.
/// A real deployment backs this with an `ethers` provider polling the
/// chain head; tests and the demo binary can use a fixed value.
pub trait LatestBlock: Send + Sync {
    fn latest_block(&self) -> u64;

    /// The block a new task should be admitted against: one behind the
    /// current head, since a task referencing the head itself could be
    /// reorged out from under it before any operator signs. Saturates at
    /// zero instead of underflowing on a fresh chain.
    fn reference_block(&self) -> u64 {
        self.latest_block().saturating_sub(1)
    }
}

pub struct FixedLatestBlock(pub u64);

impl LatestBlock for FixedLatestBlock {
    fn latest_block(&self) -> u64 {
        self.0
    }
}
