//! Signature aggregation and quorum evaluation.
//!
//! Owners sign a proposal's canonical hash independently and in any order.
//! This module turns the accumulated raw signatures into the list the wallet
//! contract accepts: at most one signature per signer, ordered strictly
//! ascending by signer address. The contract recomputes this order on
//! execution and reverts on duplicate or unordered signers.
//!
//! Merging is commutative and idempotent: whatever order signatures arrive
//! in, and however many times an owner re-signs, the aggregate converges to
//! the latest signature of every signer.

use crate::{
    recoverer,
    types::{Address, Digest, Signature},
    verifier::{Verifier, VerifierError},
};
use ethnum::U256;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// A deduplicated, ordered signature list with its index-aligned signers.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Aggregate {
    pub signatures: Vec<Signature>,
    pub signers: Vec<Address>,
}

impl Aggregate {
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Iterates over `(signature, signer)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Signature, Address)> + '_ {
        self.signatures.iter().zip(self.signers.iter().copied())
    }
}

/// Quorum status of a signature set.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quorum {
    pub ready: bool,
    pub valid_count: usize,
}

/// Orders recovered `(signature, signer)` pairs as the contract expects.
///
/// Pairs are given in arrival order. When a signer appears more than once the
/// latest signature wins, which also collapses byte-identical duplicates.
/// Signatures that could not be recovered are paired with the zero address
/// and are kept: they never count toward quorum but remain in storage. Each
/// distinct unrecoverable signature is kept once, in arrival order.
pub fn order(pairs: impl IntoIterator<Item = (Signature, Address)>) -> Aggregate {
    let mut latest = HashMap::<Address, Signature>::new();
    let mut unrecovered = Vec::<Signature>::new();
    for (signature, signer) in pairs {
        if signer.is_zero() {
            if !unrecovered.contains(&signature) {
                unrecovered.push(signature);
            }
        } else {
            latest.insert(signer, signature);
        }
    }

    let mut recovered = latest.into_iter().collect::<Vec<_>>();
    recovered.sort_unstable_by_key(|(signer, _)| *signer);

    let (signers, signatures) = unrecovered
        .into_iter()
        .map(|signature| (Address::ZERO, signature))
        .chain(recovered)
        .unzip();
    Aggregate {
        signatures,
        signers,
    }
}

/// Recovers the signer of every signature and returns the deduplicated list
/// sorted by signer.
pub async fn sort_and_dedupe<V>(
    verifier: &V,
    wallet: Address,
    hash: Digest,
    signatures: Vec<Signature>,
) -> Result<Aggregate, VerifierError>
where
    V: Verifier + ?Sized,
{
    let mut pairs = Vec::with_capacity(signatures.len());
    for signature in signatures {
        let signer = recoverer::recover_signer(verifier, wallet, hash, &signature)
            .await?
            .unwrap_or(Address::ZERO);
        pairs.push((signature, signer));
    }
    Ok(order(pairs))
}

/// Merges a new signature from `signer` into an accumulated set.
///
/// Any earlier signature that recovers to the same signer is dropped first,
/// so an owner re-signing replaces their signature instead of adding one.
pub async fn merge<V>(
    verifier: &V,
    wallet: Address,
    hash: Digest,
    existing: Vec<Signature>,
    signature: Signature,
    signer: Address,
) -> Result<Vec<Signature>, VerifierError>
where
    V: Verifier + ?Sized,
{
    let mut merged = Vec::with_capacity(existing.len() + 1);
    for previous in existing {
        if previous == signature {
            continue;
        }
        let recovered = recoverer::recover_signer(verifier, wallet, hash, &previous).await?;
        if recovered != Some(signer) {
            merged.push(previous);
        }
    }
    merged.push(signature);
    Ok(merged)
}

/// Merges a new signature and produces the aggregate to store.
pub async fn add_signature<V>(
    verifier: &V,
    wallet: Address,
    hash: Digest,
    existing: Vec<Signature>,
    signature: Signature,
    signer: Address,
) -> Result<Aggregate, VerifierError>
where
    V: Verifier + ?Sized,
{
    let merged = merge(verifier, wallet, hash, existing, signature, signer).await?;
    sort_and_dedupe(verifier, wallet, hash, merged).await
}

/// A signature set checked against the wallet's current owners.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Evaluation {
    /// Every signature, deduplicated and ordered.
    pub aggregate: Aggregate,
    /// Whether each signer in `aggregate` is a current owner.
    pub owners: Vec<bool>,
}

impl Evaluation {
    /// The number of distinct current owners that signed.
    pub fn valid_count(&self) -> usize {
        self.owners.iter().filter(|owner| **owner).count()
    }

    pub fn quorum(&self, required: U256) -> Quorum {
        let valid_count = self.valid_count();
        Quorum {
            ready: valid_count > 0 && U256::from(valid_count as u64) >= required,
            valid_count,
        }
    }

    /// The signatures to submit for execution: current owners only, still
    /// ordered by signer.
    pub fn executable(&self) -> Aggregate {
        let (signatures, signers) = self
            .aggregate
            .iter()
            .zip(&self.owners)
            .filter(|(_, owner)| **owner)
            .map(|((signature, signer), _)| (signature.clone(), signer))
            .unzip();
        Aggregate {
            signatures,
            signers,
        }
    }
}

/// Recovers and ownership-checks every signature against the live owner set.
pub async fn evaluate<V>(
    verifier: &V,
    wallet: Address,
    hash: Digest,
    signatures: Vec<Signature>,
) -> Result<Evaluation, VerifierError>
where
    V: Verifier + ?Sized,
{
    let aggregate = sort_and_dedupe(verifier, wallet, hash, signatures).await?;
    let mut checked = HashSet::new();
    let mut owners = Vec::with_capacity(aggregate.len());
    for signer in &aggregate.signers {
        let owner =
            !signer.is_zero() && checked.insert(*signer) && verifier.is_owner(wallet, *signer).await?;
        owners.push(owner);
    }
    Ok(Evaluation { aggregate, owners })
}

/// Reports whether a signature set reaches the given threshold.
///
/// `required` must be the wallet's current threshold, not the value
/// snapshotted when the proposal was created. Nothing is cached: owner sets
/// change, so every call re-reads ownership.
pub async fn can_execute<V>(
    verifier: &V,
    wallet: Address,
    hash: Digest,
    signatures: Vec<Signature>,
    required: U256,
) -> Result<Quorum, VerifierError>
where
    V: Verifier + ?Sized,
{
    Ok(evaluate(verifier, wallet, hash, signatures)
        .await?
        .quorum(required))
}
