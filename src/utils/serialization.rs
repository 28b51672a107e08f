// src/utils/serialization.rs
//! Serialization utilities for proof transport.
//!
//! Provides:
//! - Sparse numeric-keyed objects (`{"0": 12, "1": 250, ...}`), the shape a
//!   JavaScript `Uint8Array` takes after a JSON round trip
//! - A serde adapter for proof bytes that writes base64 and reads base64,
//!   a plain byte array, or the sparse object

use crate::error::InputValidationError;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serializer};
use serde_json::{Map, Value};

/// Encodes bytes as a sparse object keyed by stringified indices.
pub fn bytes_to_sparse(bytes: &[u8]) -> Map<String, Value> {
    bytes
        .iter()
        .enumerate()
        .map(|(i, b)| (i.to_string(), Value::from(*b)))
        .collect()
}

/// Reconstructs bytes from a sparse numeric-keyed object.
///
/// Keys are sorted numerically and must cover `0..n` without gaps; every
/// value must be an integer in `0..=255`. Anything else is rejected instead
/// of being truncated.
pub fn sparse_to_bytes(object: &Map<String, Value>) -> Result<Vec<u8>, InputValidationError> {
    let malformed = |reason: String| InputValidationError::MalformedProofEncoding(reason);

    let mut entries = Vec::with_capacity(object.len());
    for (key, value) in object {
        let numeric = !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit());
        if !numeric || (key.len() > 1 && key.starts_with('0')) {
            return Err(malformed(format!("key `{}` is not an array index", key)));
        }
        let index: usize = key
            .parse()
            .map_err(|_| malformed(format!("key `{}` is out of range", key)))?;
        let byte = value
            .as_u64()
            .filter(|b| *b <= u8::MAX as u64)
            .ok_or_else(|| {
                malformed(format!("value at index {} is not a byte: {}", index, value))
            })?;
        entries.push((index, byte as u8));
    }

    entries.sort_unstable_by_key(|(index, _)| *index);
    for (expected, (index, _)) in entries.iter().enumerate() {
        if *index != expected {
            return Err(malformed(format!(
                "indices are not contiguous: expected {}, found {}",
                expected, index
            )));
        }
    }

    Ok(entries.into_iter().map(|(_, byte)| byte).collect())
}

/// Accepted transport shapes for a byte sequence.
#[derive(Deserialize)]
#[serde(untagged)]
enum ByteTransport {
    Base64(String),
    Array(Vec<u8>),
    Sparse(Map<String, Value>),
}

/// Serde adapter: `#[serde(with = "crate::utils::serialization::proof_bytes")]`.
pub mod proof_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match ByteTransport::deserialize(deserializer)? {
            ByteTransport::Base64(s) => {
                base64::decode(&s)
                    .map_err(|e| de::Error::custom(format!("Base64 decoding failed: {}", e)))
            }
            ByteTransport::Array(bytes) => Ok(bytes),
            ByteTransport::Sparse(object) => sparse_to_bytes(&object).map_err(de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use serde_json::json;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Envelope {
        #[serde(with = "proof_bytes")]
        proof: Vec<u8>,
    }

    #[test]
    fn sparse_round_trip_is_lossless() {
        let bytes: Vec<u8> = (0..=255u8).chain([0, 0, 7]).collect();
        let sparse = bytes_to_sparse(&bytes);
        assert_eq!(sparse_to_bytes(&sparse).unwrap(), bytes);
    }

    #[test]
    fn sparse_keys_are_sorted_numerically() {
        // lexicographic order would put "10" before "2"
        let mut object = Map::new();
        for i in (0..12u8).rev() {
            object.insert(i.to_string(), json!(i * 2));
        }
        let bytes = sparse_to_bytes(&object).unwrap();
        assert_eq!(bytes, (0..12u8).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[test]
    fn gaps_and_bad_values_are_rejected() {
        let gap = json!({"0": 1, "2": 3});
        let out_of_range = json!({"0": 256});
        let negative = json!({"0": -1});
        let not_index = json!({"0": 1, "x": 2});
        let padded_key = json!({"00": 1});
        let string_value = json!({"0": "1"});

        for bad in [gap, out_of_range, negative, not_index, padded_key, string_value] {
            let object = bad.as_object().unwrap();
            let err = sparse_to_bytes(object).unwrap_err();
            assert!(matches!(err, InputValidationError::MalformedProofEncoding(_)));
        }
    }

    #[test]
    fn proof_bytes_accepts_every_transport() {
        let expected = Envelope { proof: vec![1, 2, 250] };

        let b64 = json!({"proof": base64::encode([1u8, 2, 250])});
        let from_b64: Envelope = serde_json::from_value(b64).unwrap();
        let from_array: Envelope = serde_json::from_value(json!({"proof": [1, 2, 250]})).unwrap();
        let sparse = json!({"proof": {"1": 2, "0": 1, "2": 250}});
        let from_sparse: Envelope = serde_json::from_value(sparse).unwrap();

        assert_eq!(from_b64, expected);
        assert_eq!(from_array, expected);
        assert_eq!(from_sparse, expected);

        let written = serde_json::to_value(&expected).unwrap();
        assert_eq!(written["proof"], json!("AQL6"));
    }

    #[test]
    fn proof_bytes_rejects_gapped_sparse_object() {
        let gapped = json!({"proof": {"0": 1, "5": 2}});
        let result: Result<Envelope, _> = serde_json::from_value(gapped);
        assert!(result.is_err());
    }
}
