//! Module containing serialization helpers.

use ethnum::U256;
use serde::{
    de::{self, Deserializer},
    ser::Serializer,
    Deserialize, Serialize,
};
use std::{
    borrow::Cow,
    fmt::{self, Debug, Display, Formatter},
    ops::Deref,
    str::FromStr,
};

/// Dynamic byte array serialized as a `0x`-prefixed hex string.
///
/// Used for calldata; an empty array serializes as `"0x"`.
#[derive(Clone, Default, Eq, Hash, PartialEq)]
pub struct Bytes(pub Vec<u8>);

impl Deref for Bytes {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Debug for Bytes {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

impl Serialize for Bytes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(&self.0)))
    }
}

impl<'de> Deserialize<'de> for Bytes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Cow::<str>::deserialize(deserializer)?;
        // The web client historically posted missing calldata as an empty
        // string, treat it the same as `0x`.
        if s.is_empty() {
            return Ok(Self::default());
        }
        let s = s
            .strip_prefix("0x")
            .ok_or_else(|| de::Error::custom("bytes missing '0x' prefix"))?;
        hex::decode(s).map(Self).map_err(de::Error::custom)
    }
}

/// An Ethereum JSON RPC quantity: a `0x`-prefixed hex integer without
/// leading zeros.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Quantity(pub U256);

impl Serialize for Quantity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{:x}", self.0))
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Cow::<str>::deserialize(deserializer)?;
        let s = s
            .strip_prefix("0x")
            .ok_or_else(|| de::Error::custom("quantity missing '0x' prefix"))?;
        U256::from_str_radix(s, 16)
            .map(Quantity)
            .map_err(de::Error::custom)
    }
}

/// An unsigned integer serialized as a decimal string.
///
/// The relay stores every `bigint` field this way so that JavaScript
/// clients do not lose precision. Plain JSON numbers are accepted on input.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Decimal(pub U256);

impl Serialize for Decimal {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(u64),
            String(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(Self(U256::from(value))),
            Repr::String(value) => {
                let (s, radix) = match value.strip_prefix("0x") {
                    Some(s) => (s, 16),
                    None => (&*value, 10),
                };
                U256::from_str_radix(s, radix)
                    .map(Self)
                    .map_err(de::Error::custom)
            }
        }
    }
}

impl From<U256> for Decimal {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl From<Decimal> for U256 {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

/// `U256` serialization as a decimal string, see `Decimal`.
pub mod decimal {
    use super::Decimal;
    use ethnum::U256;
    use serde::{Deserialize as _, Deserializer, Serialize as _, Serializer};

    pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        Decimal(*value).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
    where
        D: Deserializer<'de>,
    {
        Decimal::deserialize(deserializer).map(|decimal| decimal.0)
    }
}

/// A wrapper that (de)serializes any `FromStr + Display` type as a string.
///
/// Used for configuration values such as URLs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Str<T>(pub T);

impl<T> Deref for Str<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> Serialize for Str<T>
where
    T: Display,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&self.0)
    }
}

impl<'de, T> Deserialize<'de> for Str<T>
where
    T: FromStr,
    T::Err: Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Cow::<str>::deserialize(deserializer)?;
        s.parse().map(Str).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bytes() {
        assert_eq!(serde_json::to_value(Bytes::default()).unwrap(), json!("0x"));
        assert_eq!(
            serde_json::from_value::<Bytes>(json!("0x0a0b")).unwrap(),
            Bytes(vec![10, 11]),
        );
        assert_eq!(
            serde_json::from_value::<Bytes>(json!("")).unwrap(),
            Bytes::default(),
        );
        assert!(serde_json::from_value::<Bytes>(json!("0a0b")).is_err());
    }

    #[test]
    fn quantity() {
        assert_eq!(
            serde_json::to_value(Quantity(U256::new(0x2a))).unwrap(),
            json!("0x2a"),
        );
        assert_eq!(serde_json::to_value(Quantity(U256::ZERO)).unwrap(), json!("0x0"));
        assert_eq!(
            serde_json::from_value::<Quantity>(json!("0xde0b6b3a7640000")).unwrap(),
            Quantity(U256::new(1_000_000_000_000_000_000)),
        );
    }

    #[test]
    fn decimal() {
        let big = U256::from_str_radix("123456789012345678901234567890", 10).unwrap();
        assert_eq!(
            serde_json::to_value(Decimal(big)).unwrap(),
            json!("123456789012345678901234567890"),
        );
        assert_eq!(
            serde_json::from_value::<Decimal>(json!("1000")).unwrap(),
            Decimal(U256::new(1000)),
        );
        assert_eq!(
            serde_json::from_value::<Decimal>(json!(7)).unwrap(),
            Decimal(U256::new(7)),
        );
        assert!(serde_json::from_value::<Decimal>(json!("-1")).is_err());
    }
}
