//! Proposal records as stored by the relay, and drafts of new proposals.

use crate::{
    calldata::Call,
    serialization::{decimal, Bytes, Decimal},
    types::{Address, Digest, Signature},
    verifier::Payload,
};
use chrono::{DateTime, Utc};
use ethnum::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A pending or executed multisig transaction.
///
/// Field names and encodings match what web clients post to the relay:
/// `address` is the wallet, `amount` the value, and every integer is a
/// decimal string.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub address: Address,
    pub hash: Digest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<Decimal>,
    #[serde(with = "decimal")]
    pub nonce: U256,
    pub to: Address,
    #[serde(with = "decimal")]
    pub amount: U256,
    pub data: Bytes,
    pub signatures: Vec<Signature>,
    pub signers: Vec<Address>,
    #[serde(with = "decimal")]
    pub required_approvals: U256,
    pub is_executed: bool,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Proposal {
    /// Creates an empty record for a key, to be filled by a patch.
    pub fn empty(address: Address, hash: Digest, now: DateTime<Utc>) -> Self {
        Self {
            address,
            hash,
            chain_id: None,
            nonce: U256::ZERO,
            to: Address::ZERO,
            amount: U256::ZERO,
            data: Bytes::default(),
            signatures: Vec::new(),
            signers: Vec::new(),
            required_approvals: U256::ZERO,
            is_executed: false,
            title: String::new(),
            description: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn payload(&self) -> Payload {
        Payload {
            to: self.to,
            value: self.amount,
            data: self.data.clone(),
        }
    }

    pub fn call(&self) -> Call {
        Call::decode(&self.data)
    }

    /// Applies a patch, field by field. Later writers win for scalars.
    pub fn apply(&mut self, patch: ProposalPatch, now: DateTime<Utc>) {
        macro_rules! set {
            ($($field:ident),*) => {$(
                if let Some(value) = patch.$field {
                    self.$field = value.into();
                }
            )*};
        }

        if patch.chain_id.is_some() {
            self.chain_id = patch.chain_id;
        }
        set!(
            nonce,
            to,
            amount,
            data,
            signatures,
            signers,
            required_approvals,
            is_executed,
            title,
            description
        );
        self.updated_at = now;
    }
}

/// A partial proposal update, keyed by `(address, hash)`.
///
/// Unknown fields (database ids, client side annotations) are ignored so
/// clients can post back a full record they previously fetched.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalPatch {
    pub address: Address,
    pub hash: Digest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signatures: Option<Vec<Signature>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signers: Option<Vec<Address>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_approvals: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_executed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ProposalPatch {
    pub fn new(address: Address, hash: Digest) -> Self {
        Self {
            address,
            hash,
            ..Default::default()
        }
    }
}

/// A transaction an owner is preparing to propose.
///
/// Drafts are explicit values owned by the caller (a browser session, a
/// CLI); nothing about them is kept in ambient state.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftProposal {
    pub to: Address,
    #[serde(default, with = "decimal")]
    pub amount: U256,
    #[serde(default)]
    pub data: Bytes,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Invalid draft input, detected before any network call.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum DraftError {
    #[error("invalid recipient address")]
    ZeroRecipient,
    #[error("amount must be greater than 0")]
    NonPositiveAmount,
    #[error("signatures required must be at least 1")]
    InvalidThreshold,
}

impl DraftProposal {
    /// Validates the draft and returns its decoded call.
    pub fn validate(&self) -> Result<Call, DraftError> {
        if self.to.is_zero() {
            return Err(DraftError::ZeroRecipient);
        }
        let call = Call::decode(&self.data);
        if call == Call::Transfer && self.amount == U256::ZERO {
            return Err(DraftError::NonPositiveAmount);
        }
        if call.signatures_required() == Some(U256::ZERO) {
            return Err(DraftError::InvalidThreshold);
        }
        Ok(call)
    }

    pub fn payload(&self) -> Payload {
        Payload {
            to: self.to,
            value: self.amount,
            data: self.data.clone(),
        }
    }

    /// The title to store, falling back to one derived from the call.
    pub fn title(&self, call: &Call) -> String {
        match self.title.trim() {
            "" => call.title().to_owned(),
            title => title.to_owned(),
        }
    }
}

/// Sorts proposals latest first.
pub fn latest_first(proposals: &mut [Proposal]) {
    proposals.sort_by(|a, b| {
        b.nonce
            .cmp(&a.nonce)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}
