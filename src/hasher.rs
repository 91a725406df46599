//! Canonical transaction hashing.
//!
//! The wallet contract is the only source of truth for the hash algorithm.
//! Hashes are always computed against the live nonce: a hash computed for an
//! old nonce can never reach quorum.

use crate::{
    types::{Address, Digest},
    verifier::{Payload, Verifier, VerifierError},
};
use ethnum::U256;

/// A transaction hash together with the nonce it was computed for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Hashed {
    pub nonce: U256,
    pub hash: Digest,
}

/// Computes the hash owners must sign for the wallet's current nonce.
pub async fn hash_current<V>(
    verifier: &V,
    wallet: Address,
    payload: &Payload,
) -> Result<Hashed, VerifierError>
where
    V: Verifier + ?Sized,
{
    let nonce = verifier.nonce(wallet).await?;
    let hash = verifier.transaction_hash(wallet, nonce, payload).await?;
    Ok(Hashed { nonce, hash })
}
