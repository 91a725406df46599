//! Solidity bindings for the multisig wallet contract.

use alloy_sol_types::sol;
use ethnum::U256;

sol! {
    interface IMultiSigWallet {
        function getTransactionHash(uint256 nonce, address to, uint256 value, bytes data)
            external
            view
            returns (bytes32);
        function recover(bytes32 hash, bytes signature) external pure returns (address);
        function isOwner(address account) external view returns (bool);
        function signaturesRequired() external view returns (uint256);
        function nonce() external view returns (uint256);
        function getUniversalProfile() external view returns (address);
        function executeTransaction(address to, uint256 value, bytes data, bytes[] signatures)
            external
            returns (bytes);

        function addSigner(address newSigner, uint256 newSignaturesRequired) external;
        function removeSigner(address oldSigner, uint256 newSignaturesRequired) external;
        function updateSignaturesRequired(uint256 newSignaturesRequired) external;
        function setData(bytes32 dataKey, bytes dataValue) external;
    }
}

/// Converts an integer to its ABI representation.
pub fn to_uint(value: U256) -> alloy_primitives::U256 {
    alloy_primitives::U256::from_be_bytes(value.to_be_bytes())
}

/// Converts an ABI integer back.
pub fn from_uint(value: alloy_primitives::U256) -> U256 {
    U256::from_be_bytes(value.to_be_bytes::<32>())
}
