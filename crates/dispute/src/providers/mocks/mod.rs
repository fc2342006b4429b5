//! In-memory collaborators for exercising the roles without an L1, a rollup node or a prover.

mod chain;
pub use self::chain::{ChainSetup, SentTransaction, SimulatedChain, SimulatedTxManager, SIMULATED_GAS_ESTIMATE};

mod rollup;
pub use self::rollup::{MockL2, MockRollup};

mod prover;
pub use self::prover::MockProver;
