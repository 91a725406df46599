//! Module for JSON RPC types and a minimal HTTP client.

use reqwest::Url;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value};
use std::borrow::Cow;

/// JSON RPC client.
pub struct Client {
    inner: reqwest::Client,
    url: Url,
}

impl Client {
    /// Creates a new client for the given URL.
    pub fn new(url: Url) -> Result<Self, InvalidScheme> {
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(InvalidScheme(other.to_owned())),
        }

        Ok(Self {
            inner: reqwest::Client::new(),
            url,
        })
    }

    /// Returns the URL of the remote JSON RPC server.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Executes a JSON RPC request.
    pub async fn execute(&self, request: Request) -> Result<Response, ClientError> {
        let response = self
            .inner
            .post(self.url.clone())
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Invalid URL scheme for a JSON RPC endpoint.
#[derive(Debug, thiserror::Error)]
#[error("invalid scheme {0}")]
pub struct InvalidScheme(pub String);

/// JSON RPC client error.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// An error occured while performing an HTTP request.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// An error occured serializing or deserializing JSON RPC data.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// JSON RPC version.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub enum JsonRpc {
    #[serde(rename = "2.0")]
    V2,
}

/// JSON RPC message identifier.
///
/// From the specification:
/// > An identifier established by the Client that MUST contain a String,
/// > Number, or NULL value if included. If it is not included it is assumed to
/// > be a notification. The value SHOULD normally not be Null and Numbers
/// > SHOULD NOT contain fractional parts
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Id {
    String(String),
    Number(Number),
    Null,
}

/// JSON RPC params. Ethereum methods always use positional parameters.
pub type Params = Vec<Value>;

/// JSON RPC request.
#[derive(Debug, Deserialize, Serialize)]
pub struct Request {
    pub jsonrpc: JsonRpc,
    pub method: String,
    pub params: Params,
    pub id: Id,
}

/// JSON RPC response.
#[derive(Debug)]
pub struct Response {
    pub jsonrpc: JsonRpc,
    pub result: Result<Value, Error>,
    pub id: Id,
}

/// Helper type for generating serialization implemtation for `Response`.
#[derive(Deserialize, Serialize)]
struct Res<'a> {
    jsonrpc: JsonRpc,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<Cow<'a, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<Cow<'a, Error>>,
    id: Cow<'a, Id>,
}

impl Serialize for Response {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let (result, error) = match &self.result {
            Ok(result) => (Some(Cow::Borrowed(result)), None),
            Err(error) => (None, Some(Cow::Borrowed(error))),
        };
        let res = Res {
            jsonrpc: self.jsonrpc,
            result,
            error,
            id: Cow::Borrowed(&self.id),
        };
        res.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Response {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let res = Res::deserialize(deserializer)?;
        let result = match (res.result, res.error) {
            (Some(result), None) => Ok(result.into_owned()),
            (None, Some(error)) => Err(error.into_owned()),
            (Some(_), Some(_)) => return Err(de::Error::custom("both result and error specified")),
            // A `null` result deserializes as `None`, which is a valid
            // response for methods like `eth_getTransactionReceipt`.
            (None, None) => Ok(Value::Null),
        };
        Ok(Response {
            jsonrpc: res.jsonrpc,
            result,
            id: res.id.into_owned(),
        })
    }
}

/// JSON RPC error.
#[derive(Clone, Debug, Deserialize, Serialize, thiserror::Error)]
#[error("{message} ({code})")]
pub struct Error {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}
