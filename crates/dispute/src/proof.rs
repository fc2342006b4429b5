//! Assembly of the `proveFaultWithZkEvm` argument from the rollup node's output proofs and the prover's answer.

use crate::{
    bindings::{BlockHeaderRLP, OutputRootProof, PublicInput, PublicInputProof, ZkEvmProof},
    traits::ProofAndPair,
    DisputeError,
};
use alloy_primitives::{b256, Bytes, B256, B64, U256};
use anyhow::Result;
use balin_primitives::{NextBlockHeader, OutputResponse, OutputWithProofResponse};

/// `keccak256(rlp([]))`, the uncle hash of every post-merge block.
pub const EMPTY_UNCLE_HASH: B256 =
    b256!("1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347");

/// Number of pair elements the Colosseum expects. The remaining two are the public input hash, which the contract
/// recomputes itself.
pub const PAIR_LEN: usize = 4;

/// Builds the output root proof for `output`.
pub fn output_root_proof(output: &OutputResponse) -> OutputRootProof {
    OutputRootProof {
        version: output.version,
        stateRoot: output.state_root,
        messagePasserStorageRoot: output.withdrawal_storage_root,
        latestBlockhash: output.block_ref.hash,
        nextBlockHash: output.next_block_ref.hash,
    }
}

fn next_block(output: &OutputWithProofResponse) -> Result<&NextBlockHeader> {
    output
        .public_input_proof
        .next_block
        .as_ref()
        .ok_or_else(|| {
            DisputeError::Rpc(format!(
                "output at block {} carries no next block header",
                output.output.block_ref.number
            ))
            .into()
        })
}

/// Builds the public input of the transition out of `src`'s block.
pub fn public_input(src: &OutputWithProofResponse) -> Result<PublicInput> {
    let header = next_block(src)?;
    Ok(PublicInput {
        blockHash: src.output.next_block_ref.hash,
        parentHash: src.output.block_ref.hash,
        timestamp: header.timestamp.to::<u64>(),
        number: header.number.to::<u64>(),
        gasLimit: header.gas_limit.to::<u64>(),
        baseFee: header.base_fee.unwrap_or_default(),
        transactionsRoot: header.transactions_root,
        stateRoot: header.state_root,
        withdrawalsRoot: header.withdrawals_root.unwrap_or_default(),
        txHashes: src
            .public_input_proof
            .next_transactions
            .iter()
            .map(|tx| tx.hash)
            .collect(),
        blobGasUsed: header.blob_gas_used.map(|v| v.to::<u64>()).unwrap_or_default(),
        excessBlobGas: header.excess_blob_gas.map(|v| v.to::<u64>()).unwrap_or_default(),
        parentBeaconRoot: header.parent_beacon_root.unwrap_or_default(),
    })
}

/// RLP-encodes the header fields of `src`'s next block that are not part of the public input.
pub fn block_header_rlp(src: &OutputWithProofResponse) -> Result<BlockHeaderRLP> {
    let header = next_block(src)?;
    Ok(BlockHeaderRLP {
        uncleHash: alloy_rlp::encode(EMPTY_UNCLE_HASH).into(),
        coinbase: alloy_rlp::encode(header.miner).into(),
        receiptsRoot: alloy_rlp::encode(header.receipts_root).into(),
        logsBloom: alloy_rlp::encode(header.logs_bloom).into(),
        difficulty: alloy_rlp::encode(header.difficulty).into(),
        gasUsed: alloy_rlp::encode(header.gas_used.to::<u64>()).into(),
        extraData: alloy_rlp::encode(&header.extra_data).into(),
        mixHash: alloy_rlp::encode(header.mix_hash).into(),
        nonce: alloy_rlp::encode(B64::ZERO).into(),
    })
}

/// Builds the public input proof for the transition `src -> dst`, where `dst` is the output one block after `src`.
pub fn public_input_proof(
    src: &OutputWithProofResponse,
    dst: &OutputWithProofResponse,
) -> Result<PublicInputProof> {
    let expected = src.output.block_ref.number + 1;
    if dst.output.block_ref.number != expected {
        return Err(DisputeError::ProtocolInvariant(format!(
            "destination output is at block {}, expected {expected}",
            dst.output.block_ref.number
        ))
        .into());
    }

    let proof = &dst.public_input_proof;
    Ok(PublicInputProof {
        srcOutputRootProof: output_root_proof(&src.output),
        dstOutputRootProof: output_root_proof(&dst.output),
        publicInput: public_input(src)?,
        rlps: block_header_rlp(src)?,
        l2ToL1MessagePasserBalance: B256::from(proof.l2_to_l1_message_passer_balance),
        l2ToL1MessagePasserCodeHash: proof.l2_to_l1_message_passer_code_hash,
        merkleProof: proof.merkle_proof.iter().map(|b| b.to_vec()).collect(),
    })
}

/// Combines the public input proof with the prover's answer, keeping the first [PAIR_LEN] pair elements.
pub fn zk_evm_proof(public_input_proof: PublicInputProof, fetched: ProofAndPair) -> Result<ZkEvmProof> {
    let ProofAndPair { proof, mut pair } = fetched;
    if pair.len() < PAIR_LEN {
        return Err(DisputeError::Rpc(format!(
            "prover returned {} pair elements, expected at least {PAIR_LEN}",
            pair.len()
        ))
        .into());
    }
    pair.truncate(PAIR_LEN);
    Ok(ZkEvmProof {
        publicInputProof: public_input_proof,
        proof,
        pair,
    })
}

/// Splits prover output into field elements. Each 32-byte word is little-endian; a trailing partial word is
/// dropped.
pub fn decode_le_words(data: &Bytes) -> Vec<U256> {
    data.chunks_exact(32).map(U256::from_le_slice).collect()
}
