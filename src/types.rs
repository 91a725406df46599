//! Ethereum primitive types shared by the relay, the verifier and the
//! signature aggregation code.
//!
//! Addresses order as unsigned big-endian integers, which for a fixed-width
//! byte array is exactly byte-wise lexicographic order. The wallet contract
//! checks signers in this order.

pub use alloy_primitives::{Address, B256 as Digest};
use rocket::request::FromParam;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{
    fmt::{self, Debug, Display, Formatter},
    str::FromStr,
};

/// A hex-encoded primitive taken from a request path.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Param<T>(pub T);

impl<'a, T> FromParam<'a> for Param<T>
where
    T: FromStr,
    T::Err: Debug,
{
    type Error = T::Err;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        param.parse().map(Param)
    }
}

/// Raw signature bytes, as produced by a signer over a `Digest`.
///
/// The relay never interprets signatures itself, recovery is always done by
/// the verifier.
#[derive(Clone, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Signature(pub Vec<u8>);

impl Signature {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Signature {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&Signature> for alloy_primitives::Bytes {
    fn from(signature: &Signature) -> Self {
        signature.0.clone().into()
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

impl Debug for Signature {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Signature({self})")
    }
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        alloy_primitives::Bytes::deserialize(deserializer).map(|bytes| Self(bytes.to_vec()))
    }
}
