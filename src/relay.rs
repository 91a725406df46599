//! The relay HTTP surface.
//!
//! `GET /<wallet>` and `POST /` are the storage endpoints web clients use
//! directly. The remaining routes run the proposal lifecycle through the
//! wallet contract and are only available when a verifier is configured.

use crate::{
    calldata::Call,
    gate::{Execution, Gate, GateError, Prepared, Status},
    proposal::{DraftProposal, Proposal, ProposalPatch},
    store::{Key, Store, StoreError},
    types::{Address, Digest, Param, Signature},
    verifier::BoxVerifier,
};
use rocket::{
    catch, catchers, get,
    http::Status as HttpStatus,
    post,
    request::Request,
    response::{self, Responder},
    routes,
    serde::json::{self, Json},
    Build, Rocket, State,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{fmt::Display, sync::Arc};

/// Shared relay state.
pub struct Relay {
    store: Arc<Store>,
    gate: Option<Gate>,
}

impl Relay {
    /// Creates a relay, with the lifecycle routes enabled if a verifier is
    /// given.
    pub fn new(verifier: Option<BoxVerifier>) -> Self {
        let store = Arc::new(Store::new());
        let gate = verifier.map(|verifier| Gate::new(verifier, store.clone()));
        Self { store, gate }
    }

    fn gate(&self) -> Result<&Gate, Failure> {
        self.gate
            .as_ref()
            .ok_or_else(|| Failure::new(HttpStatus::ServiceUnavailable, "VERIFIER_UNAVAILABLE"))
    }
}

/// Mounts the relay routes and catchers.
pub fn mount(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount(
            "/",
            routes![
                transactions,
                upsert,
                pending,
                history,
                prepare,
                propose,
                add_signature,
                status,
                execute,
            ],
        )
        .register("/", catchers![bad_request, not_found, unprocessable, internal])
}

/// Builds a relay server around the given state.
pub fn rocket(relay: Relay) -> Rocket<Build> {
    mount(rocket::build().manage(relay))
}

/// An error response in the `{status: "error", message}` envelope.
#[derive(Debug)]
pub struct Failure {
    status: HttpStatus,
    body: Value,
}

impl Failure {
    fn new(status: HttpStatus, message: &str) -> Self {
        Self {
            status,
            body: json!({ "status": "error", "message": message }),
        }
    }

    fn with_error(mut self, err: impl Display) -> Self {
        self.body["error"] = json!(err.to_string());
        self
    }
}

impl<'r> Responder<'r, 'static> for Failure {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        (self.status, Json(self.body)).respond_to(request)
    }
}

impl From<GateError> for Failure {
    fn from(err: GateError) -> Self {
        let (status, message) = match &err {
            GateError::NotFound => (HttpStatus::NotFound, "ITEM_NOT_FOUND"),
            GateError::NotOwner => (HttpStatus::Forbidden, "ONLY_OWNERS_CAN_SIGN"),
            GateError::Draft(_) => (HttpStatus::BadRequest, "INVALID_PROPOSAL"),
            GateError::AlreadyExecuted | GateError::Store(StoreError::Executed(_)) => {
                (HttpStatus::Conflict, "ALREADY_EXECUTED")
            }
            GateError::Stale => (HttpStatus::Conflict, "STALE_PROPOSAL"),
            GateError::Submitting => (HttpStatus::Conflict, "SUBMISSION_IN_PROGRESS"),
            GateError::NotReady { .. } => (HttpStatus::Conflict, "NOT_ENOUGH_SIGNATURES"),
            GateError::InsufficientFunds { .. } => (HttpStatus::Conflict, "INSUFFICIENT_FUNDS"),
            GateError::HashMismatch { .. } => (HttpStatus::Conflict, "HASH_MISMATCH"),
            GateError::Submission(_) => (HttpStatus::BadGateway, "EXECUTION_FAILED"),
            GateError::Verifier(_) => (HttpStatus::BadGateway, "VERIFIER_ERROR"),
            GateError::Store(_) => (HttpStatus::InternalServerError, "Failed to update data"),
        };
        if status.code >= 500 {
            tracing::warn!(?err, "request failed");
        }
        Failure::new(status, message).with_error(err)
    }
}

#[get("/<wallet>")]
fn transactions(wallet: Param<Address>, relay: &State<Relay>) -> Result<Json<Value>, Failure> {
    let Param(wallet) = wallet;
    let transactions = relay.store.list_by_wallet(wallet, None);
    if transactions.is_empty() {
        return Err(Failure::new(HttpStatus::NotFound, "ITEM_NOT_FOUND"));
    }
    Ok(Json(json!({
        "status": "success",
        "message": "Data retrieved successfully",
        "transactions": transactions,
    })))
}

#[post("/", data = "<patch>")]
async fn upsert(
    patch: Result<Json<ProposalPatch>, json::Error<'_>>,
    relay: &State<Relay>,
) -> Result<Json<Value>, Failure> {
    let patch = patch
        .map_err(|err| {
            tracing::debug!(%err, "invalid transaction body");
            Failure::new(HttpStatus::InternalServerError, "Failed to update data").with_error(err)
        })?
        .into_inner();

    let key = Key::new(patch.address, patch.hash);
    let proposal = relay
        .store
        .update(key, move |_| patch)
        .await
        .map_err(|err| {
            tracing::warn!(%key, %err, "failed to update transaction");
            Failure::new(HttpStatus::InternalServerError, "Failed to update data").with_error(err)
        })?;

    tracing::debug!(%key, "stored transaction");
    Ok(Json(json!({
        "message": "Transaction added successfully",
        "data": proposal,
    })))
}

fn listing(transactions: Vec<Proposal>) -> Json<Value> {
    Json(json!({ "status": "success", "transactions": transactions }))
}

#[get("/<wallet>/pending")]
fn pending(wallet: Param<Address>, relay: &State<Relay>) -> Json<Value> {
    listing(relay.store.list_by_wallet(wallet.0, Some(false)))
}

#[get("/<wallet>/history")]
fn history(wallet: Param<Address>, relay: &State<Relay>) -> Json<Value> {
    listing(relay.store.list_by_wallet(wallet.0, Some(true)))
}

#[post("/<wallet>/hash", data = "<draft>")]
async fn prepare(
    wallet: Param<Address>,
    draft: Json<DraftProposal>,
    relay: &State<Relay>,
) -> Result<Json<Prepared>, Failure> {
    let Param(wallet) = wallet;
    Ok(Json(relay.gate()?.hash(wallet, &draft).await?))
}

#[derive(Deserialize)]
struct ProposeRequest {
    #[serde(flatten)]
    draft: DraftProposal,
    signature: Signature,
}

#[post("/<wallet>/proposals", data = "<request>")]
async fn propose(
    wallet: Param<Address>,
    request: Json<ProposeRequest>,
    relay: &State<Relay>,
) -> Result<Json<Proposal>, Failure> {
    let Param(wallet) = wallet;
    let ProposeRequest { draft, signature } = request.into_inner();
    Ok(Json(relay.gate()?.propose(wallet, draft, signature).await?))
}

#[derive(Deserialize)]
struct SignRequest {
    signature: Signature,
}

#[post("/<wallet>/<hash>/signatures", data = "<request>")]
async fn add_signature(
    wallet: Param<Address>,
    hash: Param<Digest>,
    request: Json<SignRequest>,
    relay: &State<Relay>,
) -> Result<Json<Proposal>, Failure> {
    let (Param(wallet), Param(hash)) = (wallet, hash);
    let signature = request.into_inner().signature;
    Ok(Json(relay.gate()?.sign(wallet, hash, signature).await?))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    #[serde(flatten)]
    status: Status,
    function_name: &'static str,
    call: Call,
}

#[get("/<wallet>/<hash>/status")]
async fn status(
    wallet: Param<Address>,
    hash: Param<Digest>,
    relay: &State<Relay>,
) -> Result<Json<Report>, Failure> {
    let (Param(wallet), Param(hash)) = (wallet, hash);
    let status = relay.gate()?.status(wallet, hash).await?;
    let call = relay
        .store
        .get(Key::new(wallet, hash))
        .ok_or(GateError::NotFound)?
        .call();
    Ok(Json(Report {
        status,
        function_name: call.function_name(),
        call,
    }))
}

#[post("/<wallet>/<hash>/execute")]
async fn execute(
    wallet: Param<Address>,
    hash: Param<Digest>,
    relay: &State<Relay>,
) -> Result<Json<Execution>, Failure> {
    let (Param(wallet), Param(hash)) = (wallet, hash);
    Ok(Json(relay.gate()?.execute(wallet, hash).await?))
}

#[catch(400)]
fn bad_request() -> Failure {
    Failure::new(HttpStatus::BadRequest, "INVALID_REQUEST")
}

#[catch(404)]
fn not_found() -> Failure {
    Failure::new(HttpStatus::NotFound, "ITEM_NOT_FOUND")
}

#[catch(422)]
fn unprocessable() -> Failure {
    Failure::new(HttpStatus::UnprocessableEntity, "INVALID_REQUEST")
}

#[catch(500)]
fn internal(request: &Request) -> Failure {
    tracing::error!(uri = %request.uri(), "internal server error");
    Failure::new(HttpStatus::InternalServerError, "INTERNAL_ERROR")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::testing::{account, sign, TestVerifier};
    use rocket::local::asynchronous::{Client, LocalResponse};

    fn wallet() -> Address {
        account(0x42)
    }

    async fn client(verifier: Option<TestVerifier>) -> Client {
        let verifier = verifier.map(|verifier| Box::new(verifier) as BoxVerifier);
        Client::tracked(rocket(Relay::new(verifier))).await.unwrap()
    }

    async fn body(response: LocalResponse<'_>) -> Value {
        response.into_json::<Value>().await.unwrap()
    }

    #[rocket::async_test]
    async fn unknown_wallet_is_not_found() {
        let client = client(None).await;
        let response = client.get(format!("/{}", wallet())).dispatch().await;
        assert_eq!(response.status(), HttpStatus::NotFound);
        assert_eq!(
            body(response).await,
            json!({ "status": "error", "message": "ITEM_NOT_FOUND" }),
        );
    }

    #[rocket::async_test]
    async fn stores_and_retrieves_transactions() {
        let client = client(None).await;
        let hash = Digest::new([0x11; 32]);
        let response = client
            .post("/")
            .json(&json!({
                "address": wallet(),
                "hash": hash,
                "chainId": 4201,
                "nonce": "0",
                "to": Address::new([0xaa; 20]),
                "amount": "1000000000000000000",
                "data": "0x",
                "signatures": [],
                "signers": [],
                "requiredApprovals": "2",
                "isExecuted": false,
                "title": "Transfer Funds",
                "description": "",
            }))
            .dispatch()
            .await;
        assert_eq!(response.status(), HttpStatus::Ok);
        let stored = body(response).await;
        assert_eq!(stored["message"], json!("Transaction added successfully"));
        assert_eq!(stored["data"]["amount"], json!("1000000000000000000"));
        assert_eq!(stored["data"]["chainId"], json!("4201"));

        let response = client.get(format!("/{}", wallet())).dispatch().await;
        assert_eq!(response.status(), HttpStatus::Ok);
        let fetched = body(response).await;
        assert_eq!(fetched["status"], json!("success"));
        assert_eq!(fetched["transactions"].as_array().unwrap().len(), 1);
        assert_eq!(fetched["transactions"][0]["hash"], json!(hash));
        assert_eq!(fetched["transactions"][0]["requiredApprovals"], json!("2"));
    }

    #[rocket::async_test]
    async fn rejected_updates_answer_500() {
        let client = client(None).await;
        let response = client
            .post("/")
            .json(&json!({
                "address": wallet(),
                "hash": Digest::new([0x11; 32]),
                "signatures": ["0x01"],
                "signers": [],
            }))
            .dispatch()
            .await;
        assert_eq!(response.status(), HttpStatus::InternalServerError);
        let failure = body(response).await;
        assert_eq!(failure["status"], json!("error"));
        assert_eq!(failure["message"], json!("Failed to update data"));

        let response = client
            .post("/")
            .header(rocket::http::ContentType::JSON)
            .body("{")
            .dispatch()
            .await;
        assert_eq!(response.status(), HttpStatus::InternalServerError);
    }

    #[rocket::async_test]
    async fn lifecycle_without_verifier_is_unavailable() {
        let client = client(None).await;
        let response = client
            .post(format!("/{}/hash", wallet()))
            .json(&json!({ "to": Address::new([0xaa; 20]), "amount": "1" }))
            .dispatch()
            .await;
        assert_eq!(response.status(), HttpStatus::ServiceUnavailable);
        assert_eq!(body(response).await["message"], json!("VERIFIER_UNAVAILABLE"));
    }

    #[rocket::async_test]
    async fn full_lifecycle() {
        let verifier = TestVerifier::new(&[account(1), account(2), account(3)], 2);
        let client = client(Some(verifier.clone())).await;
        let draft = json!({ "to": Address::new([0xaa; 20]), "amount": "1000" });

        let response = client
            .post(format!("/{}/hash", wallet()))
            .json(&draft)
            .dispatch()
            .await;
        assert_eq!(response.status(), HttpStatus::Ok);
        let prepared = body(response).await;
        assert_eq!(prepared["nonce"], json!("0"));
        assert_eq!(prepared["requiredApprovals"], json!("2"));
        assert_eq!(prepared["call"], json!({ "kind": "transfer" }));
        let hash = serde_json::from_value::<Digest>(prepared["hash"].clone()).unwrap();

        let mut request = draft.clone();
        request["signature"] = json!(sign(hash, account(1), 0));
        let response = client
            .post(format!("/{}/proposals", wallet()))
            .json(&request)
            .dispatch()
            .await;
        assert_eq!(response.status(), HttpStatus::Ok);
        assert_eq!(body(response).await["title"], json!("Transfer Funds"));

        let signatures = format!("/{}/{}/signatures", wallet(), hash);
        let response = client
            .post(signatures.as_str())
            .json(&json!({ "signature": sign(hash, account(9), 0) }))
            .dispatch()
            .await;
        assert_eq!(response.status(), HttpStatus::Forbidden);
        assert_eq!(body(response).await["message"], json!("ONLY_OWNERS_CAN_SIGN"));

        let response = client
            .post(signatures.as_str())
            .json(&json!({ "signature": sign(hash, account(2), 0) }))
            .dispatch()
            .await;
        assert_eq!(response.status(), HttpStatus::Ok);
        assert_eq!(
            body(response).await["signers"],
            json!([account(1), account(2)]),
        );

        let response = client
            .get(format!("/{}/{}/status", wallet(), hash))
            .dispatch()
            .await;
        assert_eq!(
            body(response).await,
            json!({
                "status": "ready",
                "validCount": 2,
                "required": "2",
                "functionName": "transferFunds",
                "call": { "kind": "transfer" },
            }),
        );

        let response = client
            .post(format!("/{}/{}/execute", wallet(), hash))
            .dispatch()
            .await;
        assert_eq!(response.status(), HttpStatus::Ok);
        assert_eq!(body(response).await["status"], json!("executed"));
        assert_eq!(verifier.executions().len(), 1);

        let response = client
            .post(format!("/{}/{}/execute", wallet(), hash))
            .dispatch()
            .await;
        assert_eq!(response.status(), HttpStatus::Conflict);

        let pending = body(client.get(format!("/{}/pending", wallet())).dispatch().await).await;
        assert_eq!(pending["transactions"], json!([]));
        let history = body(client.get(format!("/{}/history", wallet())).dispatch().await).await;
        assert_eq!(history["transactions"][0]["isExecuted"], json!(true));
    }

    #[rocket::async_test]
    async fn under_quorum_execution_conflicts() {
        let verifier = TestVerifier::new(&[account(1), account(2)], 2);
        let client = client(Some(verifier.clone())).await;
        let draft = json!({ "to": Address::new([0xaa; 20]), "amount": "1" });

        let prepared = body(
            client
                .post(format!("/{}/hash", wallet()))
                .json(&draft)
                .dispatch()
                .await,
        )
        .await;
        let hash = serde_json::from_value::<Digest>(prepared["hash"].clone()).unwrap();

        let mut request = draft;
        request["signature"] = json!(sign(hash, account(1), 0));
        client
            .post(format!("/{}/proposals", wallet()))
            .json(&request)
            .dispatch()
            .await;

        let response = client
            .post(format!("/{}/{}/execute", wallet(), hash))
            .dispatch()
            .await;
        assert_eq!(response.status(), HttpStatus::Conflict);
        assert_eq!(body(response).await["message"], json!("NOT_ENOUGH_SIGNATURES"));
        assert!(verifier.executions().is_empty());
    }

    #[rocket::async_test]
    async fn invalid_draft_is_a_bad_request() {
        let client = client(Some(TestVerifier::new(&[account(1)], 1))).await;
        let response = client
            .post(format!("/{}/hash", wallet()))
            .json(&json!({ "to": Address::ZERO, "amount": "1" }))
            .dispatch()
            .await;
        assert_eq!(response.status(), HttpStatus::BadRequest);
        assert_eq!(body(response).await["message"], json!("INVALID_PROPOSAL"));
    }

    #[rocket::async_test]
    async fn unknown_routes_use_the_error_envelope() {
        let client = client(None).await;
        let response = client.get("/not/a/route/at/all").dispatch().await;
        assert_eq!(response.status(), HttpStatus::NotFound);
        assert_eq!(body(response).await["status"], json!("error"));
    }
}
