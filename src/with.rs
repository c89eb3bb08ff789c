//! [`serde_with`] helpers.

use std::fmt::Display;
use std::str::FromStr;

use serde::de::{Deserializer, Error as DeError};
use serde::{Deserialize, Serializer};
use serde_with::de::DeserializeAs;
use serde_with::SerializeAs;

/// Separator between the parts of a [`CompositeKey`].
pub const SEPARATOR: char = '#';

/// (De)serializes a pair `(a, b)` as the string `"{a}#{b}"`.
///
/// Deserialization splits at the *first* `#`, so `b` may itself contain `#`.
pub struct CompositeKey;

impl<A, B> SerializeAs<(A, B)> for CompositeKey
where
    A: Display,
    B: Display,
{
    fn serialize_as<S>(source: &(A, B), serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&format_args!("{}{}{}", source.0, SEPARATOR, source.1))
    }
}

impl<'de, A, B> DeserializeAs<'de, (A, B)> for CompositeKey
where
    A: FromStr,
    A::Err: Display,
    B: FromStr,
    B::Err: Display,
{
    fn deserialize_as<D>(deserializer: D) -> Result<(A, B), D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let (a, b) = s.split_once(SEPARATOR).ok_or_else(|| {
            DeError::custom(format!("key `{}` has no `{}` separator", s, SEPARATOR))
        })?;
        let a = a
            .parse()
            .map_err(|e| DeError::custom(format!("bad key prefix in `{}`: {}", s, e)))?;
        let b = b
            .parse()
            .map_err(|e| DeError::custom(format!("bad key suffix in `{}`: {}", s, e)))?;
        Ok((a, b))
    }
}
