//! Wallet contract bindings over Ethereum JSON RPC.

use super::{
    method::eth,
    remote::Remote,
    types::{Block, CallRequest, TransactionRequest},
    Payload, Verifier, VerifierError,
};
use crate::{
    bindings::{from_uint, to_uint, IMultiSigWallet},
    serialization::{Bytes, Quantity},
    types::{Address, Digest, Signature},
};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use ethnum::U256;
use rocket::tokio::time;
use std::time::Duration;

/// How long to wait for an execution to be mined.
#[derive(Clone, Copy, Debug)]
pub struct Polling {
    pub interval: Duration,
    pub attempts: u32,
}

impl Default for Polling {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            attempts: 60,
        }
    }
}

/// A verifier backed by the deployed wallet contracts.
pub struct ContractVerifier {
    remote: Remote,
    executor: Option<Address>,
    polling: Polling,
}

impl ContractVerifier {
    /// Creates a new contract verifier. The `executor` account must be
    /// unlocked on the remote node for executions to be submitted.
    pub fn new(remote: Remote, executor: Option<Address>, polling: Polling) -> Self {
        Self {
            remote,
            executor,
            polling,
        }
    }

    async fn call<C>(&self, wallet: Address, call: C) -> Result<C::Return, VerifierError>
    where
        C: SolCall,
    {
        let request = CallRequest {
            to: wallet,
            data: Bytes(call.abi_encode()),
        };
        let result = self.remote.execute(eth::Call, (request, Block::Latest)).await?;
        Ok(C::abi_decode_returns(&result, true)?)
    }

    async fn wait_for_receipt(&self, transaction: Digest) -> Result<Digest, VerifierError> {
        for _ in 0..self.polling.attempts {
            if let Some(receipt) = self
                .remote
                .execute(eth::GetTransactionReceipt, (transaction,))
                .await?
            {
                if !receipt.succeeded() {
                    return Err(VerifierError::Reverted(transaction));
                }
                return Ok(receipt.transaction_hash);
            }
            time::sleep(self.polling.interval).await;
        }
        Err(VerifierError::Unconfirmed(transaction))
    }
}

#[async_trait]
impl Verifier for ContractVerifier {
    async fn transaction_hash(
        &self,
        wallet: Address,
        nonce: U256,
        payload: &Payload,
    ) -> Result<Digest, VerifierError> {
        let call = IMultiSigWallet::getTransactionHashCall {
            nonce: to_uint(nonce),
            to: payload.to,
            value: to_uint(payload.value),
            data: payload.data.0.clone().into(),
        };
        Ok(self.call(wallet, call).await?._0)
    }

    async fn recover(
        &self,
        wallet: Address,
        hash: Digest,
        signature: &Signature,
    ) -> Result<Address, VerifierError> {
        let call = IMultiSigWallet::recoverCall {
            hash,
            signature: signature.into(),
        };
        Ok(self.call(wallet, call).await?._0)
    }

    async fn is_owner(&self, wallet: Address, account: Address) -> Result<bool, VerifierError> {
        let call = IMultiSigWallet::isOwnerCall { account };
        Ok(self.call(wallet, call).await?._0)
    }

    async fn signatures_required(&self, wallet: Address) -> Result<U256, VerifierError> {
        let call = IMultiSigWallet::signaturesRequiredCall {};
        Ok(from_uint(self.call(wallet, call).await?._0))
    }

    async fn nonce(&self, wallet: Address) -> Result<U256, VerifierError> {
        let call = IMultiSigWallet::nonceCall {};
        Ok(from_uint(self.call(wallet, call).await?._0))
    }

    async fn universal_profile(&self, wallet: Address) -> Result<Address, VerifierError> {
        let call = IMultiSigWallet::getUniversalProfileCall {};
        Ok(self.call(wallet, call).await?._0)
    }

    async fn balance(&self, account: Address) -> Result<U256, VerifierError> {
        let balance = self
            .remote
            .execute(eth::GetBalance, (account, Block::Latest))
            .await?;
        Ok(balance.0)
    }

    async fn execute_transaction(
        &self,
        wallet: Address,
        payload: &Payload,
        signatures: &[Signature],
    ) -> Result<Digest, VerifierError> {
        let from = self.executor.ok_or(VerifierError::NoExecutor)?;
        let data = IMultiSigWallet::executeTransactionCall {
            to: payload.to,
            value: to_uint(payload.value),
            data: payload.data.0.clone().into(),
            signatures: signatures.iter().map(Into::into).collect(),
        }
        .abi_encode();

        let transaction = self
            .remote
            .execute(
                eth::SendTransaction,
                (TransactionRequest {
                    from,
                    to: wallet,
                    value: Quantity(U256::ZERO),
                    data: Bytes(data),
                },),
            )
            .await?;
        tracing::debug!(%transaction, "submitted wallet execution");

        self.wait_for_receipt(transaction).await
    }
}
