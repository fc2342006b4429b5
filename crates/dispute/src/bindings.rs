//! Contract bindings for the L1 contracts the validator reads from and transacts with.

use alloy_sol_types::sol;

sol! {
    struct CheckpointOutput {
        address submitter;
        bytes32 outputRoot;
        uint128 timestamp;
        uint128 l2BlockNumber;
    }

    struct Challenge {
        uint8 turn;
        uint64 timeoutAt;
        address asserter;
        address challenger;
        bytes32[] segments;
        uint256 segSize;
        uint256 segStart;
        bytes32 l1Head;
    }

    struct OutputRootProof {
        bytes32 version;
        bytes32 stateRoot;
        bytes32 messagePasserStorageRoot;
        bytes32 latestBlockhash;
        bytes32 nextBlockHash;
    }

    struct PublicInput {
        bytes32 blockHash;
        bytes32 parentHash;
        uint64 timestamp;
        uint64 number;
        uint64 gasLimit;
        uint256 baseFee;
        bytes32 transactionsRoot;
        bytes32 stateRoot;
        bytes32 withdrawalsRoot;
        bytes32[] txHashes;
        uint64 blobGasUsed;
        uint64 excessBlobGas;
        bytes32 parentBeaconRoot;
    }

    struct BlockHeaderRLP {
        bytes uncleHash;
        bytes coinbase;
        bytes receiptsRoot;
        bytes logsBloom;
        bytes difficulty;
        bytes gasUsed;
        bytes extraData;
        bytes mixHash;
        bytes nonce;
    }

    struct PublicInputProof {
        OutputRootProof srcOutputRootProof;
        OutputRootProof dstOutputRootProof;
        PublicInput publicInput;
        BlockHeaderRLP rlps;
        bytes32 l2ToL1MessagePasserBalance;
        bytes32 l2ToL1MessagePasserCodeHash;
        bytes[] merkleProof;
    }

    struct ZkEvmProof {
        PublicInputProof publicInputProof;
        uint256[] proof;
        uint256[] pair;
    }

    interface IL2OutputOracle {
        function SUBMISSION_INTERVAL() external view returns (uint256);
        function L2_BLOCK_TIME() external view returns (uint256);
        function FINALIZATION_PERIOD_SECONDS() external view returns (uint256);
        function nextOutputIndex() external view returns (uint256);
        function nextBlockNumber() external view returns (uint256);
        function latestBlockNumber() external view returns (uint256);
        function getL2Output(uint256 l2OutputIndex) external view returns (CheckpointOutput memory);
        function getL2OutputIndexAfter(uint256 l2BlockNumber) external view returns (uint256);
        function isFinalized(uint256 outputIndex) external view returns (bool);
        function submitL2Output(
            bytes32 outputRoot,
            uint256 l2BlockNumber,
            bytes32 l1BlockHash,
            uint256 l1BlockNumber
        ) external payable;

        event OutputSubmitted(
            bytes32 indexed outputRoot,
            uint256 indexed l2OutputIndex,
            uint256 indexed l2BlockNumber,
            uint256 l1Timestamp
        );
    }

    interface IColosseum {
        function CREATION_PERIOD_SECONDS() external view returns (uint256);
        function segmentsLengths(uint256 turnIndex) external view returns (uint256);
        function getChallenge(uint256 outputIndex, address challenger) external view returns (Challenge memory);
        function getStatus(uint256 outputIndex, address challenger) external view returns (uint8);
        function isInCreationPeriod(uint256 outputIndex) external view returns (bool);
        function createChallenge(
            uint256 outputIndex,
            bytes32 l1BlockHash,
            uint256 l1BlockNumber,
            bytes32[] calldata segments
        ) external;
        function bisect(
            uint256 outputIndex,
            address challenger,
            uint256 pos,
            bytes32[] calldata segments
        ) external;
        function proveFaultWithZkEvm(uint256 outputIndex, uint256 pos, ZkEvmProof calldata zkEvmProof) external;
        function challengerTimeout(uint256 outputIndex, address challenger) external;
        function cancelChallenge(uint256 outputIndex) external;

        event ChallengeCreated(
            uint256 indexed outputIndex,
            address indexed asserter,
            address indexed challenger,
            uint256 timestamp
        );
        event ReadyToProve(uint256 indexed outputIndex, address indexed challenger);
    }
}

sol! {
    interface IValidatorManager {
        function nextValidator() external view returns (address);
        function inJail(address validator) external view returns (bool);
        function getStatus(address validator) external view returns (uint8);
    }
}

sol! {
    interface IValidatorPool {
        function REQUIRED_BOND_AMOUNT() external view returns (uint256);
        function TERMINATE_OUTPUT_INDEX() external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function nextValidator() external view returns (address);
    }

    interface IAssetManager {
        function BOND_AMOUNT() external view returns (uint128);
        function totalValidatorKroNotBonded(address validator) external view returns (uint128);
    }

    interface ISecurityCouncil {
        function requestDeletion(uint256 outputIndex, bool force) external;
        function confirmTransaction(uint256 transactionId) external;
        function isConfirmed(uint256 transactionId) external view returns (bool);
        function transactions(uint256 transactionId)
            external
            view
            returns (address target, bool executed, uint256 value, bytes memory data);

        event ValidationRequested(uint256 indexed transactionId, bytes32 outputRoot, uint256 l2BlockNumber);
        event DeletionRequested(uint256 indexed transactionId, uint256 indexed outputIndex);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use alloy_primitives::{Address, B256, U256};
    use alloy_sol_types::{SolCall, SolEvent, SolInterface};

    #[test]
    fn create_challenge_calldata_decodes_back() {
        let call = IColosseum::createChallengeCall {
            outputIndex: U256::from(7),
            l1BlockHash: B256::repeat_byte(0xaa),
            l1BlockNumber: U256::from(120),
            segments: vec![B256::repeat_byte(1), B256::repeat_byte(2)],
        };
        let data = call.abi_encode();
        assert_eq!(&data[..4], IColosseum::createChallengeCall::SELECTOR.as_slice());

        match IColosseum::IColosseumCalls::abi_decode(&data, true).unwrap() {
            IColosseum::IColosseumCalls::createChallenge(decoded) => {
                assert_eq!(decoded.outputIndex, U256::from(7));
                assert_eq!(decoded.segments.len(), 2);
            }
            _ => panic!("decoded into the wrong call"),
        }
    }

    #[test]
    fn challenge_created_log_decodes_from_topics() {
        let asserter = Address::repeat_byte(0x01);
        let challenger = Address::repeat_byte(0x02);
        let topics = [
            IColosseum::ChallengeCreated::SIGNATURE_HASH,
            B256::from(U256::from(7)),
            asserter.into_word(),
            challenger.into_word(),
        ];
        let data = U256::from(1_000).to_be_bytes::<32>();

        let event =
            IColosseum::ChallengeCreated::decode_raw_log(topics.iter().copied(), &data, true)
                .unwrap();
        assert_eq!(event.outputIndex, U256::from(7));
        assert_eq!(event.asserter, asserter);
        assert_eq!(event.challenger, challenger);
        assert_eq!(event.timestamp, U256::from(1_000));
    }
}
