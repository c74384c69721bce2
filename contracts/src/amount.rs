//! Decimal-string encoding for `u128` amounts.
//!
//! Event payloads are internally tagged, and serde buffers those through a
//! representation with no 128-bit integers. Amounts in events travel as
//! strings instead (`"1000000"`), which JavaScript clients also prefer.

use serde::{de, Deserialize, Deserializer, Serializer};

pub fn serialize<S: Serializer>(amount: &u128, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(amount)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(de::Error::custom)
}
