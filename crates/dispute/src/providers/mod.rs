//! JSON-RPC implementations of the collaborator traits, plus in-memory mocks.

mod rpc;
pub use self::rpc::JsonRpcClient;

mod l1;
pub use self::l1::L1Provider;

mod txmgr;
pub use self::txmgr::NodeTxManager;

mod rollup;
pub use self::rollup::RollupNodeProvider;

mod l2;
pub use self::l2::L2TraceProvider;

mod prover;
pub use self::prover::{ProveResponse, ZkEvmProverClient};

pub mod mocks;
