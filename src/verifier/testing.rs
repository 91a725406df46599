//! An in-memory wallet used in tests.
//!
//! A signature is `hash || signer || salt`: recovering it against the hash it
//! was made for yields the signer, recovering it against any other hash
//! yields an unrelated address (like ECDSA recovery would), and anything that
//! is not 65 bytes is rejected. Different salts model ECDSA's random `k`.

use super::{Payload, Verifier, VerifierError};
use crate::{
    bindings::{to_uint, IMultiSigWallet},
    types::{Address, Digest, Signature},
};
use alloy_primitives::keccak256;
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use rocket::tokio::task;
use ethnum::U256;
use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

/// Returns a test address whose last byte is `n`.
pub fn account(n: u8) -> Address {
    let mut address = [0; 20];
    address[19] = n;
    Address::new(address)
}

/// Signs a hash as `signer`.
pub fn sign(hash: Digest, signer: Address, salt: u8) -> Signature {
    let mut signature = hash.0.to_vec();
    signature.extend_from_slice(signer.as_slice());
    signature.extend([salt; 13]);
    Signature(signature)
}

/// A recorded wallet execution.
#[derive(Clone, Debug)]
pub struct Execution {
    pub nonce: U256,
    pub payload: Payload,
    pub signatures: Vec<Signature>,
}

#[derive(Default)]
struct State {
    nonce: U256,
    owners: HashSet<Address>,
    required: U256,
    profile: Address,
    balance: U256,
    executions: Vec<Execution>,
    fail_next: bool,
    after_execution: Option<Box<dyn FnOnce() + Send>>,
}

/// Cloneable handle to an in-memory wallet contract.
#[derive(Clone, Default)]
pub struct TestVerifier(Arc<Mutex<State>>);

impl TestVerifier {
    pub fn new(owners: &[Address], required: u64) -> Self {
        let verifier = Self::default();
        {
            let mut state = verifier.state();
            state.owners = owners.iter().copied().collect();
            state.required = U256::from(required);
            state.profile = account(0xfe);
            state.balance = U256::from(u64::MAX);
        }
        verifier
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.0.lock().unwrap()
    }

    pub fn add_owner(&self, owner: Address) {
        self.state().owners.insert(owner);
    }

    pub fn remove_owner(&self, owner: Address) {
        self.state().owners.remove(&owner);
    }

    pub fn set_required(&self, required: u64) {
        self.state().required = U256::from(required);
    }

    pub fn set_balance(&self, balance: U256) {
        self.state().balance = balance;
    }

    /// Advances the nonce as if a transaction was executed by someone else.
    pub fn bump_nonce(&self) {
        self.state().nonce += U256::ONE;
    }

    /// Makes the next execution fail as if the RPC node was unreachable.
    pub fn fail_next_execution(&self) {
        self.state().fail_next = true;
    }

    /// Runs `hook` once the next execution is confirmed.
    pub fn after_next_execution(&self, hook: impl FnOnce() + Send + 'static) {
        self.state().after_execution = Some(Box::new(hook));
    }

    pub fn executions(&self) -> Vec<Execution> {
        self.state().executions.clone()
    }

    fn hash(wallet: Address, nonce: U256, payload: &Payload) -> Digest {
        let call = IMultiSigWallet::getTransactionHashCall {
            nonce: to_uint(nonce),
            to: payload.to,
            value: to_uint(payload.value),
            data: payload.data.0.clone().into(),
        };
        let mut preimage = wallet.as_slice().to_vec();
        preimage.extend(call.abi_encode());
        keccak256(preimage)
    }

    fn recover_sync(hash: Digest, signature: &Signature) -> Result<Address, VerifierError> {
        let bytes = signature.as_bytes();
        if bytes.len() != 65 {
            return Err(VerifierError::Rejected("ECDSAInvalidSignatureLength".into()));
        }
        let mut address = [0; 20];
        if bytes[..32] == hash.0 {
            address.copy_from_slice(&bytes[32..52]);
        } else {
            let mut preimage = hash.0.to_vec();
            preimage.extend(bytes);
            address.copy_from_slice(&keccak256(&preimage)[12..]);
        }
        Ok(Address::new(address))
    }
}

#[async_trait]
impl Verifier for TestVerifier {
    async fn transaction_hash(
        &self,
        wallet: Address,
        nonce: U256,
        payload: &Payload,
    ) -> Result<Digest, VerifierError> {
        Ok(Self::hash(wallet, nonce, payload))
    }

    async fn recover(
        &self,
        _: Address,
        hash: Digest,
        signature: &Signature,
    ) -> Result<Address, VerifierError> {
        // Suspend like a remote call would, so concurrent callers interleave.
        task::yield_now().await;
        Self::recover_sync(hash, signature)
    }

    async fn is_owner(&self, _: Address, account: Address) -> Result<bool, VerifierError> {
        Ok(self.state().owners.contains(&account))
    }

    async fn signatures_required(&self, _: Address) -> Result<U256, VerifierError> {
        Ok(self.state().required)
    }

    async fn nonce(&self, _: Address) -> Result<U256, VerifierError> {
        Ok(self.state().nonce)
    }

    async fn universal_profile(&self, _: Address) -> Result<Address, VerifierError> {
        Ok(self.state().profile)
    }

    async fn balance(&self, account: Address) -> Result<U256, VerifierError> {
        let state = self.state();
        Ok(if account == state.profile {
            state.balance
        } else {
            U256::ZERO
        })
    }

    /// Mirrors the on-chain checks: signers strictly ascending, all
    /// current owners, and at least the threshold.
    async fn execute_transaction(
        &self,
        wallet: Address,
        payload: &Payload,
        signatures: &[Signature],
    ) -> Result<Digest, VerifierError> {
        let mut state = self.state();
        if state.fail_next {
            state.fail_next = false;
            return Err(VerifierError::Unconfirmed(Digest::default()));
        }

        let hash = Self::hash(wallet, state.nonce, payload);
        let mut previous = None;
        for signature in signatures {
            let signer = Self::recover_sync(hash, signature)?;
            if previous.map(|previous| signer <= previous).unwrap_or(false) {
                return Err(VerifierError::Rejected(
                    "MultiSig__DuplicateOrUnorderedSignatures".into(),
                ));
            }
            if !state.owners.contains(&signer) {
                return Err(VerifierError::Rejected("MultiSig__NotOwner".into()));
            }
            previous = Some(signer);
        }
        if U256::from(signatures.len() as u64) < state.required {
            return Err(VerifierError::Rejected(
                "MultiSig__InvalidSignaturesCount".into(),
            ));
        }
        if payload.value > state.balance {
            return Err(VerifierError::Rejected("MultiSig__TransferFailed".into()));
        }

        let execution = Execution {
            nonce: state.nonce,
            payload: payload.clone(),
            signatures: signatures.to_vec(),
        };
        state.balance -= payload.value;
        state.nonce += U256::ONE;
        state.executions.push(execution);
        let hook = state.after_execution.take();
        drop(state);
        if let Some(hook) = hook {
            hook();
        }

        Ok(keccak256(hash))
    }
}
