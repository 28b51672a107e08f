// src/models/field.rs
//! BN254 scalar-field elements in their wire form.
//!
//! Every hash, coordinate and signature component travels as a canonical
//! decimal string: ASCII digits only, no sign, no leading zeros, strictly
//! below the field modulus. Parsing accepts exactly that form so that
//! `parse(to_string(x)) == x` and `to_string(parse(s)) == s`.

use crate::error::InputValidationError;
use ark_bn254::Fr as Bn254Fr;
use ark_ff::PrimeField;
use num_bigint::BigUint;
use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

static MODULUS: Lazy<BigUint> = Lazy::new(|| Bn254Fr::MODULUS.into());

/// An element of the BN254 scalar field (the BabyJubJub base field).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FieldElement(pub Bn254Fr);

impl FieldElement {
    pub fn zero() -> Self {
        FieldElement(Bn254Fr::from(0u64))
    }

    pub fn inner(&self) -> Bn254Fr {
        self.0
    }

    /// Canonical decimal representation used in wire JSON.
    pub fn to_canonical_string(&self) -> String {
        BigUint::from(self.0.into_bigint()).to_string()
    }

    /// Strict inverse of [`to_canonical_string`](Self::to_canonical_string).
    pub fn parse_canonical(s: &str) -> Result<Self, InputValidationError> {
        let malformed = || InputValidationError::MalformedFieldElement(s.to_string());

        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        if s.len() > 1 && s.starts_with('0') {
            return Err(malformed());
        }
        let value = BigUint::from_str(s).map_err(|_| malformed())?;
        if value >= *MODULUS {
            return Err(malformed());
        }
        Ok(FieldElement(Bn254Fr::from(value)))
    }

    /// Parses a prover public input: `0x`-prefixed hex (as Noir emits) or canonical decimal.
    pub fn parse_public_input(s: &str) -> Result<Self, InputValidationError> {
        let Some(digits) = s.strip_prefix("0x") else {
            return Self::parse_canonical(s);
        };
        let malformed = || InputValidationError::MalformedFieldElement(s.to_string());

        if digits.is_empty() || digits.len() > 64 {
            return Err(malformed());
        }
        let value = BigUint::parse_bytes(digits.as_bytes(), 16).ok_or_else(malformed)?;
        if value >= *MODULUS {
            return Err(malformed());
        }
        Ok(FieldElement(Bn254Fr::from(value)))
    }
}

impl From<Bn254Fr> for FieldElement {
    fn from(value: Bn254Fr) -> Self {
        FieldElement(value)
    }
}

impl From<u64> for FieldElement {
    fn from(value: u64) -> Self {
        FieldElement(Bn254Fr::from(value))
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical_string())
    }
}

impl FromStr for FieldElement {
    type Err = InputValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_canonical(s)
    }
}

impl Serialize for FieldElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_canonical_string())
    }
}

impl<'de> Deserialize<'de> for FieldElement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        FieldElement::parse_canonical(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_string_round_trips() {
        let fe = FieldElement::from(1_000_000u64);
        let s = fe.to_canonical_string();
        assert_eq!(s, "1000000");
        assert_eq!(FieldElement::parse_canonical(&s).unwrap(), fe);

        assert_eq!(FieldElement::zero().to_canonical_string(), "0");
        assert_eq!(FieldElement::parse_canonical("0").unwrap(), FieldElement::zero());
    }

    #[test]
    fn largest_element_round_trips() {
        let max = MODULUS.clone() - 1u32;
        let s = max.to_string();
        let fe = FieldElement::parse_canonical(&s).unwrap();
        assert_eq!(fe.to_canonical_string(), s);
    }

    #[test]
    fn rejects_non_canonical_forms() {
        for bad in ["", "+1", "-1", "007", "1_000", "0x10", " 1", "12a"] {
            assert!(
                FieldElement::parse_canonical(bad).is_err(),
                "`{}` should be rejected",
                bad
            );
        }
        assert!(FieldElement::parse_canonical(&MODULUS.to_string()).is_err());
    }

    #[test]
    fn public_inputs_accept_prover_hex() {
        let hex = format!("0x{:064x}", 42u64);
        assert_eq!(FieldElement::parse_public_input(&hex).unwrap(), FieldElement::from(42u64));
        assert_eq!(FieldElement::parse_public_input("42").unwrap(), FieldElement::from(42u64));

        let modulus_hex = format!("0x{}", MODULUS.to_str_radix(16));
        for bad in ["0x", "0xzz", "042", modulus_hex.as_str()] {
            assert!(FieldElement::parse_public_input(bad).is_err(), "`{}` should be rejected", bad);
        }
    }

    #[test]
    fn serde_uses_decimal_strings() {
        let fe = FieldElement::from(42u64);
        let json = serde_json::to_string(&fe).unwrap();
        assert_eq!(json, "\"42\"");
        let back: FieldElement = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fe);
        assert!(serde_json::from_str::<FieldElement>("42").is_err());
    }
}
