//! The balin validator binary.

use anyhow::{Context, Result};
use balin_dispute::{
    providers::{
        JsonRpcClient, L1Provider, L2TraceProvider, NodeTxManager, RollupNodeProvider, ZkEvmProverClient,
    },
    traits::{Collaborators, ProofFetcher},
    validator::Validator,
};
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod cli;
mod signal;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt().with_env_filter(cli.env_filter()).init();

    let config = cli.validator_config()?;
    info!(
        from = %cli.from,
        output_submitter = config.output_submitter_enabled,
        challenger = config.challenger_enabled,
        guardian = config.guardian_enabled,
        "starting balin validator"
    );

    let l1 = JsonRpcClient::try_new(&cli.l1_eth_rpc).context("invalid L1 RPC url")?;
    let prover = match &cli.prover_rpc {
        Some(url) => {
            let rpc = JsonRpcClient::try_new(url).context("invalid prover RPC url")?;
            Some(Arc::new(ZkEvmProverClient::new(rpc)) as Arc<dyn ProofFetcher>)
        }
        None => None,
    };
    let collaborators = Collaborators {
        chain: Arc::new(L1Provider::new(l1.clone(), config.contracts)),
        rollup: Arc::new(RollupNodeProvider::new(
            JsonRpcClient::try_new(&cli.rollup_rpc).context("invalid rollup RPC url")?,
        )),
        l2: Arc::new(L2TraceProvider::new(
            JsonRpcClient::try_new(&cli.l2_eth_rpc).context("invalid L2 RPC url")?,
        )),
        prover,
        txmgr: Arc::new(NodeTxManager::new(l1, cli.from)),
    };

    let cancel = CancellationToken::new();
    signal::cancel_on_signal(cancel.clone());

    let validator = match Validator::new(config, collaborators, &cancel).await {
        Ok(validator) => validator,
        Err(_) if cancel.is_cancelled() => {
            info!("shut down before the validator was created");
            return Ok(());
        }
        Err(err) => return Err(err.context("failed to create validator")),
    };
    if let Err(err) = validator.start().await {
        if cancel.is_cancelled() {
            info!("shut down before the roles started");
            return Ok(());
        }
        error!("failed to start validator: {err:?}");
        validator.stop().await;
        return Err(err);
    }

    cancel.cancelled().await;
    info!("shutting down");
    validator.stop().await;
    Ok(())
}
