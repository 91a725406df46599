//! A client for the relay's storage endpoints.
//!
//! Reads are cached per wallet. Callers decide when cached data is out of
//! date by calling [`RelayClient::invalidate`], which also notifies everyone
//! subscribed to that wallet so they can re-fetch.

use crate::{
    proposal::{Proposal, ProposalPatch},
    types::Address,
};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};
use thiserror::Error;

/// Called with the wallet whose cached proposals were invalidated.
pub type Callback = Arc<dyn Fn(Address) + Send + Sync>;

/// Identifies a subscription for [`RelayClient::unsubscribe`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SubscriptionId(u64);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to retrieve data: {0}")]
    Retrieve(#[source] reqwest::Error),
    #[error("failed to update data: {0}")]
    Update(#[source] reqwest::Error),
}

#[derive(Deserialize)]
struct Listing {
    transactions: Vec<Proposal>,
}

#[derive(Deserialize)]
struct Stored {
    data: Proposal,
}

pub struct RelayClient {
    http: reqwest::Client,
    url: Url,
    cache: Mutex<HashMap<Address, Vec<Proposal>>>,
    subscribers: Mutex<HashMap<SubscriptionId, (Address, Callback)>>,
    ids: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RelayClient {
    pub fn new(url: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
            cache: Default::default(),
            subscribers: Default::default(),
            ids: Default::default(),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.url.as_str().trim_end_matches('/'), path)
    }

    /// Fetches a wallet's proposals. A wallet the relay has never seen has
    /// no proposals.
    pub async fn fetch(&self, wallet: Address) -> Result<Vec<Proposal>, ClientError> {
        let response = self
            .http
            .get(self.endpoint(&wallet.to_string()))
            .send()
            .await
            .map_err(ClientError::Retrieve)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let listing = response
            .error_for_status()
            .map_err(ClientError::Retrieve)?
            .json::<Listing>()
            .await
            .map_err(ClientError::Retrieve)?;
        Ok(listing.transactions)
    }

    /// Returns cached proposals for a wallet, fetching them on a miss.
    pub async fn proposals(&self, wallet: Address) -> Result<Vec<Proposal>, ClientError> {
        if let Some(cached) = lock(&self.cache).get(&wallet) {
            return Ok(cached.clone());
        }
        let proposals = self.fetch(wallet).await?;
        self.fill(wallet, proposals.clone());
        Ok(proposals)
    }

    /// Cached proposals that are not executed yet.
    pub async fn pending(&self, wallet: Address) -> Result<Vec<Proposal>, ClientError> {
        Ok(self
            .proposals(wallet)
            .await?
            .into_iter()
            .filter(|proposal| !proposal.is_executed)
            .collect())
    }

    /// Cached executed proposals.
    pub async fn history(&self, wallet: Address) -> Result<Vec<Proposal>, ClientError> {
        Ok(self
            .proposals(wallet)
            .await?
            .into_iter()
            .filter(|proposal| proposal.is_executed)
            .collect())
    }

    /// Upserts a proposal and invalidates the wallet's cached proposals.
    pub async fn submit(&self, patch: &ProposalPatch) -> Result<Proposal, ClientError> {
        let stored = self
            .http
            .post(self.endpoint(""))
            .json(patch)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(ClientError::Update)?
            .json::<Stored>()
            .await
            .map_err(ClientError::Update)?;
        self.invalidate(patch.address);
        Ok(stored.data)
    }

    fn fill(&self, wallet: Address, proposals: Vec<Proposal>) {
        lock(&self.cache).insert(wallet, proposals);
    }

    /// Drops the cached proposals of a wallet and notifies its subscribers.
    pub fn invalidate(&self, wallet: Address) {
        lock(&self.cache).remove(&wallet);

        let callbacks = lock(&self.subscribers)
            .values()
            .filter(|(subscribed, _)| *subscribed == wallet)
            .map(|(_, callback)| callback.clone())
            .collect::<Vec<_>>();
        tracing::debug!(%wallet, subscribers = callbacks.len(), "invalidated proposals");
        for callback in callbacks {
            callback(wallet);
        }
    }

    pub fn subscribe(&self, wallet: Address, callback: Callback) -> SubscriptionId {
        let id = SubscriptionId(self.ids.fetch_add(1, Ordering::Relaxed));
        lock(&self.subscribers).insert(id, (wallet, callback));
        id
    }

    /// Removes a subscription, returning `false` if it did not exist.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        lock(&self.subscribers).remove(&id).is_some()
    }
}
