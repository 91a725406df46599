//! An abstraction around the on-chain multisig wallet.
//!
//! Every security relevant decision (the canonical transaction hash, signer
//! recovery, ownership, the quorum threshold and the nonce) is delegated to
//! the wallet contract. This allows us to compose different operations
//! around the contract, such as logging every call, and to substitute the
//! chain entirely in tests.

pub mod contract;
pub mod log_recorder;
pub mod method;
pub mod remote;
#[cfg(test)]
pub mod testing;
pub mod types;

use crate::{
    serialization::Bytes,
    types::{Address, Digest, Signature},
};
use async_trait::async_trait;
use ethnum::U256;
use remote::RemoteError;
use thiserror::Error;

/// The payload a multisig proposal executes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Payload {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

/// A trait abstracting the wallet contract surface used by the relay.
#[async_trait]
pub trait Verifier {
    /// Computes the canonical hash owners sign for a transaction at the
    /// specified nonce.
    async fn transaction_hash(
        &self,
        wallet: Address,
        nonce: U256,
        payload: &Payload,
    ) -> Result<Digest, VerifierError>;

    /// Recovers the signer of a hash.
    async fn recover(
        &self,
        wallet: Address,
        hash: Digest,
        signature: &Signature,
    ) -> Result<Address, VerifierError>;

    /// Returns whether the account is currently an owner of the wallet.
    async fn is_owner(&self, wallet: Address, account: Address) -> Result<bool, VerifierError>;

    /// Returns the current quorum threshold.
    async fn signatures_required(&self, wallet: Address) -> Result<U256, VerifierError>;

    /// Returns the current wallet nonce.
    async fn nonce(&self, wallet: Address) -> Result<U256, VerifierError>;

    /// Returns the profile account holding the wallet's funds.
    async fn universal_profile(&self, wallet: Address) -> Result<Address, VerifierError>;

    /// Returns the native balance of an account.
    async fn balance(&self, account: Address) -> Result<U256, VerifierError>;

    /// Submits an execution with signatures and waits for it to be
    /// confirmed, returning the transaction hash.
    async fn execute_transaction(
        &self,
        wallet: Address,
        payload: &Payload,
        signatures: &[Signature],
    ) -> Result<Digest, VerifierError>;
}

/// A boxed verifier that is safe to send between threads.
pub type BoxVerifier = Box<dyn Verifier + Send + Sync + 'static>;

/// An error interacting with the wallet contract.
#[derive(Debug, Error)]
pub enum VerifierError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("invalid contract return data: {0}")]
    Abi(#[from] alloy_sol_types::Error),

    /// The contract rejected the call.
    #[error("call rejected: {0}")]
    Rejected(String),

    #[error("no executor account configured")]
    NoExecutor,

    #[error("transaction {0} reverted")]
    Reverted(Digest),

    #[error("transaction {0} was not confirmed in time")]
    Unconfirmed(Digest),
}

impl VerifierError {
    /// Returns `true` if the contract itself rejected the call, as opposed
    /// to the call never reaching it.
    ///
    /// Rejections are final for the given inputs while other errors may
    /// succeed on retry.
    pub fn is_rejection(&self) -> bool {
        match self {
            Self::Remote(RemoteError::Rpc(_)) | Self::Rejected(_) | Self::Abi(_) => true,
            Self::Remote(_) | Self::NoExecutor | Self::Reverted(_) | Self::Unconfirmed(_) => false,
        }
    }
}
