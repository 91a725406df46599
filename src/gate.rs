//! Proposal lifecycle: proposing, signing, status and execution.
//!
//! A proposal is `Pending` until enough current owners signed it, then
//! `Ready`. Executing a ready proposal moves it through `Submitting` to
//! `Executed`. A failed submission leaves it pending so any owner can retry.
//! Proposals whose nonce was consumed by another execution are `Stale` and
//! are never submitted.

use crate::{
    aggregator::{self, Aggregate},
    calldata::Call,
    hasher,
    proposal::{DraftError, DraftProposal, Proposal, ProposalPatch},
    recoverer,
    serialization::decimal,
    store::{Key, Store, StoreError},
    types::{Address, Digest, Signature},
    verifier::{BoxVerifier, VerifierError},
};
use ethnum::U256;
use serde::Serialize;
use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
};
use thiserror::Error;

/// A draft hashed against the wallet's current nonce, ready to be signed.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prepared {
    #[serde(with = "decimal")]
    pub nonce: U256,
    pub hash: Digest,
    #[serde(with = "decimal")]
    pub required_approvals: U256,
    pub call: Call,
}

/// Live status of a proposal.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Status {
    #[serde(rename_all = "camelCase")]
    Pending {
        valid_count: usize,
        #[serde(with = "decimal")]
        required: U256,
    },
    #[serde(rename_all = "camelCase")]
    Ready {
        valid_count: usize,
        #[serde(with = "decimal")]
        required: U256,
    },
    Submitting,
    Executed,
    Stale,
}

/// The outcome of an execution request.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Execution {
    #[serde(rename_all = "camelCase")]
    Executed { transaction_hash: Digest },
    /// The proposal's nonce was already used, nothing was submitted.
    Stale,
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error("proposal not found")]
    NotFound,
    #[error("only owners can sign transactions")]
    NotOwner,
    #[error(transparent)]
    Draft(#[from] DraftError),
    #[error("proposal is already executed")]
    AlreadyExecuted,
    #[error("proposal is stale")]
    Stale,
    #[error("proposal is already being submitted")]
    Submitting,
    #[error("not enough signatures: {valid_count} of {required}")]
    NotReady { valid_count: usize, required: U256 },
    #[error("insufficient funds: balance {balance}, amount {amount}")]
    InsufficientFunds { balance: U256, amount: U256 },
    #[error("proposal hash {stored} does not match current hash {current}")]
    HashMismatch { stored: Digest, current: Digest },
    #[error("execution failed: {0}")]
    Submission(#[source] VerifierError),
    #[error(transparent)]
    Verifier(#[from] VerifierError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Coordinates proposals between the store and the wallet contract.
pub struct Gate {
    verifier: BoxVerifier,
    store: Arc<Store>,
    submitting: Mutex<HashSet<Key>>,
}

impl Gate {
    pub fn new(verifier: BoxVerifier, store: Arc<Store>) -> Self {
        Self {
            verifier,
            store,
            submitting: Default::default(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Validates a draft and computes the hash owners have to sign.
    pub async fn hash(&self, wallet: Address, draft: &DraftProposal) -> Result<Prepared, GateError> {
        let call = draft.validate()?;
        let hashed = hasher::hash_current(&*self.verifier, wallet, &draft.payload()).await?;
        let required_approvals = self.verifier.signatures_required(wallet).await?;
        Ok(Prepared {
            nonce: hashed.nonce,
            hash: hashed.hash,
            required_approvals,
            call,
        })
    }

    /// Creates a proposal carrying the proposer's signature.
    ///
    /// Proposing a draft that is already stored adds the signature to the
    /// existing proposal instead.
    pub async fn propose(
        &self,
        wallet: Address,
        draft: DraftProposal,
        signature: Signature,
    ) -> Result<Proposal, GateError> {
        let prepared = self.hash(wallet, &draft).await?;
        let key = Key::new(wallet, prepared.hash);
        let signer = self.owner(wallet, prepared.hash, &signature).await?;

        let _guard = self.store.lock(key).await;
        let existing = self.store.get(key);
        let aggregate = self.merge(key, existing.as_ref(), signature, signer).await?;

        let proposal = match existing {
            Some(_) => self.store.upsert(signatures_patch(key, aggregate))?,
            None => self.store.upsert(ProposalPatch {
                nonce: Some(prepared.nonce.into()),
                to: Some(draft.to),
                amount: Some(draft.amount.into()),
                title: Some(draft.title(&prepared.call)),
                description: Some(draft.description),
                data: Some(draft.data),
                required_approvals: Some(prepared.required_approvals.into()),
                is_executed: Some(false),
                ..signatures_patch(key, aggregate)
            })?,
        };
        tracing::info!(%key, %signer, nonce = %proposal.nonce, "proposed transaction");
        Ok(proposal)
    }

    /// Adds an owner's signature to a stored proposal.
    pub async fn sign(
        &self,
        wallet: Address,
        hash: Digest,
        signature: Signature,
    ) -> Result<Proposal, GateError> {
        let key = Key::new(wallet, hash);
        let proposal = self.pending(key)?;
        if self.is_stale(&proposal).await? {
            return Err(GateError::Stale);
        }
        let signer = self.owner(wallet, hash, &signature).await?;

        let _guard = self.store.lock(key).await;
        let current = self.pending(key)?;
        let aggregate = self.merge(key, Some(&current), signature, signer).await?;
        let proposal = self.store.upsert(signatures_patch(key, aggregate))?;

        tracing::info!(%key, %signer, signatures = proposal.signatures.len(), "signed transaction");
        Ok(proposal)
    }

    /// Evaluates a proposal against the live wallet state.
    pub async fn status(&self, wallet: Address, hash: Digest) -> Result<Status, GateError> {
        let key = Key::new(wallet, hash);
        let proposal = self.store.get(key).ok_or(GateError::NotFound)?;
        if proposal.is_executed {
            return Ok(Status::Executed);
        }
        if self.is_stale(&proposal).await? {
            return Ok(Status::Stale);
        }
        if self.is_submitting(key) {
            return Ok(Status::Submitting);
        }

        let required = self.verifier.signatures_required(wallet).await?;
        let quorum =
            aggregator::can_execute(&*self.verifier, wallet, hash, proposal.signatures, required)
                .await?;
        Ok(if quorum.ready {
            Status::Ready {
                valid_count: quorum.valid_count,
                required,
            }
        } else {
            Status::Pending {
                valid_count: quorum.valid_count,
                required,
            }
        })
    }

    /// Submits a ready proposal to the wallet contract.
    ///
    /// Quorum and funds are re-checked against the live wallet state first.
    /// Only one submission per proposal runs at a time.
    pub async fn execute(&self, wallet: Address, hash: Digest) -> Result<Execution, GateError> {
        let key = Key::new(wallet, hash);
        let proposal = self.pending(key)?;
        let _submitting = Submitting::claim(&self.submitting, key)?;

        if self.is_stale(&proposal).await? {
            tracing::info!(%key, nonce = %proposal.nonce, "skipping stale proposal");
            return Ok(Execution::Stale);
        }

        let payload = proposal.payload();
        let current = hasher::hash_current(&*self.verifier, wallet, &payload).await?;
        if current.hash != hash {
            return Err(GateError::HashMismatch {
                stored: hash,
                current: current.hash,
            });
        }

        let required = self.verifier.signatures_required(wallet).await?;
        let evaluation =
            aggregator::evaluate(&*self.verifier, wallet, hash, proposal.signatures).await?;
        let quorum = evaluation.quorum(required);
        if !quorum.ready {
            return Err(GateError::NotReady {
                valid_count: quorum.valid_count,
                required,
            });
        }

        let profile = self.verifier.universal_profile(wallet).await?;
        let balance = self.verifier.balance(profile).await?;
        if balance < payload.value {
            return Err(GateError::InsufficientFunds {
                balance,
                amount: payload.value,
            });
        }

        let signatures = evaluation.executable().signatures;
        let transaction_hash = self
            .verifier
            .execute_transaction(wallet, &payload, &signatures)
            .await
            .map_err(|err| {
                tracing::warn!(%key, ?err, "submission failed, proposal stays pending");
                GateError::Submission(err)
            })?;

        // Already confirmed on chain.
        if let Err(err) = self.store.mark_executed(key, proposal.nonce) {
            tracing::warn!(%key, %transaction_hash, %err, "failed to record execution");
        }
        tracing::info!(%key, %transaction_hash, "executed transaction");
        Ok(Execution::Executed { transaction_hash })
    }

    fn pending(&self, key: Key) -> Result<Proposal, GateError> {
        match self.store.get(key) {
            Some(proposal) if proposal.is_executed => Err(GateError::AlreadyExecuted),
            Some(proposal) => Ok(proposal),
            None => Err(GateError::NotFound),
        }
    }

    /// Recovers the signer and checks that it currently owns the wallet.
    async fn owner(
        &self,
        wallet: Address,
        hash: Digest,
        signature: &Signature,
    ) -> Result<Address, GateError> {
        let validation = recoverer::validate(&*self.verifier, wallet, hash, signature).await?;
        match validation.signer {
            Some(signer) if validation.is_owner => Ok(signer),
            signer => {
                tracing::debug!(%wallet, %hash, ?signer, "rejected signature from non-owner");
                Err(GateError::NotOwner)
            }
        }
    }

    async fn merge(
        &self,
        key: Key,
        existing: Option<&Proposal>,
        signature: Signature,
        signer: Address,
    ) -> Result<Aggregate, GateError> {
        let existing = existing
            .map(|proposal| proposal.signatures.clone())
            .unwrap_or_default();
        Ok(aggregator::add_signature(
            &*self.verifier,
            key.wallet,
            key.hash,
            existing,
            signature,
            signer,
        )
        .await?)
    }

    /// A proposal is stale once its nonce was executed through the relay, or
    /// once the wallet's on-chain nonce moved past it.
    async fn is_stale(&self, proposal: &Proposal) -> Result<bool, GateError> {
        if self.store.is_stale(proposal) {
            return Ok(true);
        }
        let nonce = self.verifier.nonce(proposal.address).await?;
        Ok(nonce > proposal.nonce)
    }

    fn is_submitting(&self, key: Key) -> bool {
        self.submitting
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&key)
    }
}

fn signatures_patch(key: Key, aggregate: Aggregate) -> ProposalPatch {
    ProposalPatch {
        signatures: Some(aggregate.signatures),
        signers: Some(aggregate.signers),
        ..ProposalPatch::new(key.wallet, key.hash)
    }
}

/// Marks a key as being submitted until dropped.
struct Submitting<'a> {
    keys: &'a Mutex<HashSet<Key>>,
    key: Key,
}

impl<'a> Submitting<'a> {
    fn claim(keys: &'a Mutex<HashSet<Key>>, key: Key) -> Result<Self, GateError> {
        if !keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key)
        {
            return Err(GateError::Submitting);
        }
        Ok(Self { keys, key })
    }
}

impl Drop for Submitting<'_> {
    fn drop(&mut self) {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}
