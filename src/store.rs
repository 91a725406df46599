//! Proposal storage.
//!
//! The store keeps two collections: wallet registrations, created the first
//! time a proposal for a wallet is written, and proposals keyed by wallet and
//! hash. It does not validate wallets; that is up to the caller.

use crate::{
    proposal::{self, Proposal, ProposalPatch},
    serialization::Decimal,
    types::{Address, Digest},
};
use chrono::{DateTime, Utc};
use ethnum::U256;
use rocket::tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use serde::Serialize;
use std::{
    collections::{HashMap, HashSet},
    fmt::{self, Display, Formatter},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use thiserror::Error;

/// The primary key of a proposal.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Key {
    pub wallet: Address,
    pub hash: Digest,
}

impl Key {
    pub fn new(wallet: Address, hash: Digest) -> Self {
        Self { wallet, hash }
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.wallet, self.hash)
    }
}

/// A registered wallet.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecord {
    pub address: Address,
    /// The highest nonce executed through the relay.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_nonce: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum StoreError {
    #[error("proposal {0} not found")]
    NotFound(Key),
    #[error("proposal {0} is already executed")]
    Executed(Key),
    #[error("{signatures} signatures but {signers} signers")]
    Misaligned { signatures: usize, signers: usize },
    #[error("signer {0} appears more than once")]
    DuplicateSigner(Address),
}

#[derive(Default)]
struct Inner {
    wallets: HashMap<Address, WalletRecord>,
    proposals: HashMap<Key, Proposal>,
}

/// In-memory proposal store.
#[derive(Default)]
pub struct Store {
    inner: Mutex<Inner>,
    locks: Mutex<HashMap<Key, Arc<AsyncMutex<()>>>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Merges a patch into the proposal with the patch's key, creating the
    /// proposal and its wallet registration if needed.
    ///
    /// Scalar fields are last writer wins. Signature lists are written as
    /// given, so callers merging signatures must hold the key's lock from
    /// [`Store::lock`] across their read, merge and write.
    pub fn upsert(&self, patch: ProposalPatch) -> Result<Proposal, StoreError> {
        let key = Key::new(patch.address, patch.hash);
        let now = Utc::now();
        let mut inner = self.inner();

        let mut proposal = match inner.proposals.get(&key) {
            Some(existing) if existing.is_executed => return Err(StoreError::Executed(key)),
            Some(existing) => existing.clone(),
            None => Proposal::empty(key.wallet, key.hash, now),
        };
        proposal.apply(patch, now);
        check_signers(&proposal)?;

        let wallet = inner
            .wallets
            .entry(key.wallet)
            .or_insert_with(|| WalletRecord {
                address: key.wallet,
                executed_nonce: None,
                created_at: now,
                updated_at: now,
            });
        if proposal.is_executed {
            raise(wallet, proposal.nonce, now);
        }

        inner.proposals.insert(key, proposal.clone());
        Ok(proposal)
    }

    pub fn get(&self, key: Key) -> Option<Proposal> {
        self.inner().proposals.get(&key).cloned()
    }

    /// Lists a wallet's proposals, latest first, optionally filtered by
    /// execution status.
    pub fn list_by_wallet(&self, wallet: Address, executed: Option<bool>) -> Vec<Proposal> {
        let mut proposals = self
            .inner()
            .proposals
            .values()
            .filter(|proposal| proposal.address == wallet)
            .filter(|proposal| executed.map_or(true, |executed| proposal.is_executed == executed))
            .cloned()
            .collect::<Vec<_>>();
        proposal::latest_first(&mut proposals);
        proposals
    }

    pub fn wallet(&self, address: Address) -> Option<WalletRecord> {
        self.inner().wallets.get(&address).cloned()
    }

    /// The highest nonce executed for a wallet through the relay.
    pub fn executed_nonce(&self, wallet: Address) -> Option<U256> {
        self.inner()
            .wallets
            .get(&wallet)
            .and_then(|record| record.executed_nonce)
            .map(U256::from)
    }

    /// Acquires the update lock for a key.
    ///
    /// Holding the guard serializes read-modify-write cycles on one proposal
    /// without blocking other keys.
    pub async fn lock(&self, key: Key) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(key).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Reads the current proposal, derives a patch from it, and writes the
    /// patch while holding the key's lock.
    pub async fn update<F>(&self, key: Key, f: F) -> Result<Proposal, StoreError>
    where
        F: FnOnce(Option<&Proposal>) -> ProposalPatch,
    {
        let _guard = self.lock(key).await;
        let current = self.get(key);
        let patch = f(current.as_ref());
        self.upsert(ProposalPatch {
            address: key.wallet,
            hash: key.hash,
            ..patch
        })
    }

    /// Marks a proposal as executed at `nonce` and raises the wallet's
    /// executed nonce.
    pub fn mark_executed(&self, key: Key, nonce: U256) -> Result<Proposal, StoreError> {
        if self.get(key).is_none() {
            return Err(StoreError::NotFound(key));
        }
        self.upsert(ProposalPatch {
            nonce: Some(nonce.into()),
            is_executed: Some(true),
            ..ProposalPatch::new(key.wallet, key.hash)
        })
    }

    /// Returns `true` if a proposal was superseded by an execution recorded in
    /// this store.
    pub fn is_stale(&self, proposal: &Proposal) -> bool {
        is_stale(proposal, self.executed_nonce(proposal.address))
    }
}

/// Returns `true` if a pending proposal's nonce is at or below the wallet's
/// executed nonce. Executed proposals are never stale.
pub fn is_stale(proposal: &Proposal, executed_nonce: Option<U256>) -> bool {
    !proposal.is_executed
        && executed_nonce.map_or(false, |executed| executed >= proposal.nonce)
}

fn raise(wallet: &mut WalletRecord, nonce: U256, now: DateTime<Utc>) {
    if wallet.executed_nonce.map_or(true, |current| current.0 < nonce) {
        wallet.executed_nonce = Some(nonce.into());
    }
    wallet.updated_at = now;
}

fn check_signers(proposal: &Proposal) -> Result<(), StoreError> {
    if proposal.signatures.len() != proposal.signers.len() {
        return Err(StoreError::Misaligned {
            signatures: proposal.signatures.len(),
            signers: proposal.signers.len(),
        });
    }
    let mut seen = HashSet::new();
    for signer in proposal.signers.iter().filter(|signer| !signer.is_zero()) {
        if !seen.insert(signer) {
            return Err(StoreError::DuplicateSigner(*signer));
        }
    }
    Ok(())
}
