use anyhow::{Context as _, Result};
use multisig_relay::{
    relay::{self, Relay},
    serialization::Str,
    types::Address,
    verifier::{
        contract::{ContractVerifier, Polling},
        log_recorder::LogRecorder,
        remote::Remote,
        BoxVerifier,
    },
};
use reqwest::Url;
use rocket::{fairing::AdHoc, serde::Deserialize};
use std::{process, time::Duration};

#[derive(Debug, Deserialize)]
#[serde(crate = "rocket::serde")]
struct Config {
    /// The node hosting the wallet contracts. Without it only the storage
    /// endpoints are served.
    #[serde(default)]
    remote_node_url: Option<Str<Url>>,

    /// The unlocked node account that submits executions.
    #[serde(default)]
    executor: Option<Address>,

    #[serde(default = "default_receipt_poll_interval_ms")]
    receipt_poll_interval_ms: u64,

    #[serde(default = "default_receipt_poll_attempts")]
    receipt_poll_attempts: u32,
}

fn default_receipt_poll_interval_ms() -> u64 {
    1000
}

fn default_receipt_poll_attempts() -> u32 {
    60
}

#[rocket::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let result = relay::mount(rocket::build())
        .attach(AdHoc::config::<Config>())
        .attach(AdHoc::try_on_ignite("multisig-relay::Relay", |rocket| async {
            let relay = match rocket.state::<Config>() {
                Some(config) => init(config),
                None => return Err(rocket),
            };
            match relay {
                Ok(relay) => Ok(rocket.manage(relay)),
                Err(err) => {
                    tracing::error!(?err, "failed to initialize relay");
                    Err(rocket)
                }
            }
        }))
        .launch()
        .await;

    if let Err(err) = result {
        tracing::error!(%err, "relay stopped");
        process::exit(1);
    }
}

fn init(config: &Config) -> Result<Relay> {
    let verifier = match &config.remote_node_url {
        Some(url) => {
            let remote = Remote::new(url.0.clone()).context("invalid remote node URL")?;
            tracing::debug!(url = %remote.url(), "connected to remote node");

            let polling = Polling {
                interval: Duration::from_millis(config.receipt_poll_interval_ms),
                attempts: config.receipt_poll_attempts,
            };
            let verifier = ContractVerifier::new(remote, config.executor, polling);
            Some(Box::new(LogRecorder(verifier)) as BoxVerifier)
        }
        None => {
            tracing::warn!("no remote node configured, serving storage endpoints only");
            None
        }
    };
    Ok(Relay::new(verifier))
}
