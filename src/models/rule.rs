// src/models/rule.rs
//! Holder-chosen disclosure rules.

use crate::error::InputValidationError;
use crate::utils::crypto::canonical_u64;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upper bound on rules per proof request (circuit capacity, not a security bound).
pub const MAX_RULES: usize = 10;

/// Comparison operator. The set is closed: each code is fixed by the circuit.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub enum Operator {
    Eq,
    Gt,
    Lt,
}

impl Operator {
    /// Operation code for an unused (padding) circuit slot.
    pub const UNUSED_CODE: u64 = 0;

    /// Operation code expected by the circuit.
    pub fn code(self) -> u64 {
        match self {
            Operator::Eq => 1,
            Operator::Gt => 2,
            Operator::Lt => 3,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Gt => ">",
            Operator::Lt => "<",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Operator {
    type Err = InputValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "=" => Ok(Operator::Eq),
            ">" => Ok(Operator::Gt),
            "<" => Ok(Operator::Lt),
            other => Err(InputValidationError::UnknownOperator(other.to_string())),
        }
    }
}

impl TryFrom<String> for Operator {
    type Error = InputValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.symbol().to_string()
    }
}

/// `{key, operator, value}` predicate over one committed attribute.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub key: String,
    #[serde(alias = "operation")]
    pub operator: Operator,
    pub value: String,
}

impl Rule {
    pub fn new(key: &str, operator: &str, value: &str) -> Result<Self, InputValidationError> {
        Ok(Rule {
            key: key.to_string(),
            operator: operator.parse()?,
            value: value.to_string(),
        })
    }

    /// Checks the predicate against a cleartext value.
    ///
    /// `=` compares strings byte-for-byte; `>` and `<` need canonical
    /// unsigned integers on both sides.
    pub fn holds_for(&self, cleartext: &str) -> Result<bool, InputValidationError> {
        match self.operator {
            Operator::Eq => Ok(cleartext == self.value),
            Operator::Gt | Operator::Lt => {
                let actual = self.numeric(cleartext)?;
                let bound = self.numeric(&self.value)?;
                Ok(if self.operator == Operator::Gt { actual > bound } else { actual < bound })
            }
        }
    }

    fn numeric(&self, value: &str) -> Result<u64, InputValidationError> {
        canonical_u64(value).ok_or_else(|| InputValidationError::NonNumericComparison {
            field: self.key.clone(),
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_codes_are_pinned() {
        assert_eq!(Operator::UNUSED_CODE, 0);
        assert_eq!(Operator::Eq.code(), 1);
        assert_eq!(Operator::Gt.code(), 2);
        assert_eq!(Operator::Lt.code(), 3);
    }

    #[test]
    fn unknown_operator_fails_construction() {
        for bad in ["!=", ">=", "", "eq"] {
            assert_eq!(
                Rule::new("offer", bad, "1").unwrap_err(),
                InputValidationError::UnknownOperator(bad.to_string())
            );
        }
    }

    #[test]
    fn deserializes_operator_and_legacy_operation_field() {
        let rule: Rule =
            serde_json::from_str(r#"{"key":"offer","operator":">","value":"500"}"#).unwrap();
        assert_eq!(rule.operator, Operator::Gt);

        let rule: Rule =
            serde_json::from_str(r#"{"key":"offer","operation":"<","value":"500"}"#).unwrap();
        assert_eq!(rule.operator, Operator::Lt);

        let unknown = r#"{"key":"offer","operator":"~","value":"1"}"#;
        assert!(serde_json::from_str::<Rule>(unknown).is_err());
    }

    #[test]
    fn evaluates_predicates() {
        assert!(Rule::new("firstname", "=", "John").unwrap().holds_for("John").unwrap());
        assert!(!Rule::new("firstname", "=", "John").unwrap().holds_for("john").unwrap());
        assert!(Rule::new("offer", ">", "500000").unwrap().holds_for("1000000").unwrap());
        assert!(!Rule::new("offer", "<", "500000").unwrap().holds_for("1000000").unwrap());

        let err = Rule::new("birthdate", ">", "1990").unwrap().holds_for("1990-01-01").unwrap_err();
        assert_eq!(err.field(), Some("birthdate"));
    }
}
