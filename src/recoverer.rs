//! Signer recovery and ownership validation.
//!
//! Both checks are delegated to the wallet contract and are always read live:
//! owner sets change between signing and execution, so a signature only
//! counts if its signer is an owner *now*.

use crate::{
    types::{Address, Digest, Signature},
    verifier::{Verifier, VerifierError},
};

/// The outcome of validating one signature.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Validation {
    /// The recovered signer, `None` if the contract could not recover one.
    pub signer: Option<Address>,
    pub is_owner: bool,
}

/// Recovers the signer of a signature.
///
/// A signature the contract rejects (malformed, bad length) yields `None`
/// instead of an error so that one bad signature never aborts a batch. Errors
/// reaching the contract are still returned, since the answer is unknown.
pub async fn recover_signer<V>(
    verifier: &V,
    wallet: Address,
    hash: Digest,
    signature: &Signature,
) -> Result<Option<Address>, VerifierError>
where
    V: Verifier + ?Sized,
{
    match verifier.recover(wallet, hash, signature).await {
        Ok(signer) => Ok(Some(signer)),
        Err(err) if err.is_rejection() => {
            tracing::debug!(%wallet, %hash, %signature, ?err, "unrecoverable signature");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Recovers the signer of a signature and checks it against the current
/// owner set.
pub async fn validate<V>(
    verifier: &V,
    wallet: Address,
    hash: Digest,
    signature: &Signature,
) -> Result<Validation, VerifierError>
where
    V: Verifier + ?Sized,
{
    let signer = recover_signer(verifier, wallet, hash, signature).await?;
    let is_owner = match signer {
        Some(signer) => verifier.is_owner(wallet, signer).await?,
        None => false,
    };
    Ok(Validation { signer, is_owner })
}
