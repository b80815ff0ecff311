//! Serde helpers: amounts travel as decimal strings so no consumer has to
//! handle integers wider than 64 bits.

use num_bigint::{BigInt, BigUint};
use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_str_radix(10))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
    let s = String::deserialize(deserializer)?;
    s.parse::<BigUint>().map_err(serde::de::Error::custom)
}

/// Same encoding for signed values (differences, intermediate sums).
pub mod signed {
    use super::*;

    pub fn serialize<S: Serializer>(value: &BigInt, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_str_radix(10))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigInt, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<BigInt>().map_err(serde::de::Error::custom)
    }
}
