//! A verifier that just logs all contract interactions.

use super::{Payload, Verifier, VerifierError};
use crate::types::{Address, Digest, Signature};
use async_trait::async_trait;
use ethnum::U256;

/// Wrapping verifier that logs all contract interactions to the global
/// logger.
pub struct LogRecorder<V>(pub V);

#[async_trait]
impl<V> Verifier for LogRecorder<V>
where
    V: Verifier + Send + Sync,
{
    async fn transaction_hash(
        &self,
        wallet: Address,
        nonce: U256,
        payload: &Payload,
    ) -> Result<Digest, VerifierError> {
        let hash = self.0.transaction_hash(wallet, nonce, payload).await?;
        tracing::debug!(%wallet, %nonce, ?payload, %hash, "computed transaction hash");
        Ok(hash)
    }

    async fn recover(
        &self,
        wallet: Address,
        hash: Digest,
        signature: &Signature,
    ) -> Result<Address, VerifierError> {
        let result = self.0.recover(wallet, hash, signature).await;
        match &result {
            Ok(signer) => tracing::debug!(%wallet, %hash, %signature, %signer, "recovered signer"),
            Err(err) => tracing::debug!(%wallet, %hash, %signature, ?err, "signer recovery failed"),
        }
        result
    }

    async fn is_owner(&self, wallet: Address, account: Address) -> Result<bool, VerifierError> {
        let owner = self.0.is_owner(wallet, account).await?;
        tracing::debug!(%wallet, %account, owner, "checked ownership");
        Ok(owner)
    }

    async fn signatures_required(&self, wallet: Address) -> Result<U256, VerifierError> {
        let required = self.0.signatures_required(wallet).await?;
        tracing::debug!(%wallet, %required, "read signature threshold");
        Ok(required)
    }

    async fn nonce(&self, wallet: Address) -> Result<U256, VerifierError> {
        let nonce = self.0.nonce(wallet).await?;
        tracing::debug!(%wallet, %nonce, "read wallet nonce");
        Ok(nonce)
    }

    async fn universal_profile(&self, wallet: Address) -> Result<Address, VerifierError> {
        let profile = self.0.universal_profile(wallet).await?;
        tracing::debug!(%wallet, %profile, "read wallet profile");
        Ok(profile)
    }

    async fn balance(&self, account: Address) -> Result<U256, VerifierError> {
        let balance = self.0.balance(account).await?;
        tracing::debug!(%account, %balance, "read balance");
        Ok(balance)
    }

    async fn execute_transaction(
        &self,
        wallet: Address,
        payload: &Payload,
        signatures: &[Signature],
    ) -> Result<Digest, VerifierError> {
        let result = self.0.execute_transaction(wallet, payload, signatures).await;
        match &result {
            Ok(transaction) => tracing::info!(
                %wallet, ?payload, signatures = signatures.len(), %transaction,
                "executed wallet transaction"
            ),
            Err(err) => tracing::warn!(
                %wallet, ?payload, signatures = signatures.len(), ?err,
                "wallet execution failed"
            ),
        }
        result
    }
}
