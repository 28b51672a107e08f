// src/models/circuit.rs
//! Circuit-facing data: witness inputs, witnesses and proofs.

use crate::models::field::FieldElement;
use crate::utils::serialization::proof_bytes;
use serde::{Deserialize, Serialize};

/// Names of the array inputs, in the order the circuit declares them.
pub const ARRAY_INPUTS: [&str; 8] = [
    "values",
    "keys",
    "hashes",
    "compared_values",
    "operations",
    "signature_R8x",
    "signature_R8y",
    "signature_S",
];

/// Names of the scalar inputs.
pub const SCALAR_INPUTS: [&str; 2] = ["signer_x", "signer_y"];

/// Parallel arrays handed to the circuit, one entry per rule.
///
/// Built fresh for every proof request and never persisted.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CircuitInputs {
    pub values: Vec<FieldElement>,
    pub keys: Vec<FieldElement>,
    pub hashes: Vec<FieldElement>,
    pub compared_values: Vec<FieldElement>,
    pub operations: Vec<FieldElement>,
    #[serde(rename = "signature_R8x")]
    pub signature_r8x: Vec<FieldElement>,
    #[serde(rename = "signature_R8y")]
    pub signature_r8y: Vec<FieldElement>,
    #[serde(rename = "signature_S")]
    pub signature_s: Vec<FieldElement>,
    pub signer_x: FieldElement,
    pub signer_y: FieldElement,
}

impl CircuitInputs {
    /// Number of populated rule slots.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Array inputs paired with their circuit names, in [`ARRAY_INPUTS`] order.
    pub fn arrays(&self) -> [(&'static str, &[FieldElement]); 8] {
        [
            (ARRAY_INPUTS[0], &self.values),
            (ARRAY_INPUTS[1], &self.keys),
            (ARRAY_INPUTS[2], &self.hashes),
            (ARRAY_INPUTS[3], &self.compared_values),
            (ARRAY_INPUTS[4], &self.operations),
            (ARRAY_INPUTS[5], &self.signature_r8x),
            (ARRAY_INPUTS[6], &self.signature_r8y),
            (ARRAY_INPUTS[7], &self.signature_s),
        ]
    }

    pub fn scalars(&self) -> [(&'static str, FieldElement); 2] {
        [(SCALAR_INPUTS[0], self.signer_x), (SCALAR_INPUTS[1], self.signer_y)]
    }
}

/// Solved witness returned by the execution backend.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Witness(#[serde(with = "proof_bytes")] pub Vec<u8>);

/// Proof produced by the external prover.
///
/// `proof` is written as base64 and read from base64, a byte array or a
/// sparse numeric-keyed object.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalProof {
    #[serde(with = "proof_bytes")]
    pub proof: Vec<u8>,
    #[serde(default)]
    pub public_inputs: Vec<String>,
}

/// Options forwarded to the prover and verifier.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofOptions {
    pub keccak: bool,
}

impl Default for ProofOptions {
    fn default() -> Self {
        ProofOptions { keccak: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn inputs_serialize_with_circuit_names() {
        let inputs = CircuitInputs {
            operations: vec![FieldElement::from(1u64)],
            signature_r8x: vec![FieldElement::from(5u64)],
            signer_x: FieldElement::from(9u64),
            ..Default::default()
        };
        let json = serde_json::to_value(&inputs).unwrap();
        assert_eq!(json["operations"], json!(["1"]));
        assert_eq!(json["signature_R8x"], json!(["5"]));
        assert_eq!(json["signer_x"], json!("9"));
        assert_eq!(inputs.len(), 1);

        let names: Vec<&str> = inputs.arrays().iter().map(|(name, _)| *name).collect();
        assert_eq!(names, ARRAY_INPUTS.to_vec());
    }

    #[test]
    fn proof_accepts_sparse_transport() {
        let proof: ExternalProof = serde_json::from_value(json!({
            "proof": {"0": 9, "1": 8},
            "publicInputs": ["0x01"]
        }))
        .unwrap();
        assert_eq!(proof.proof, vec![9, 8]);
        assert_eq!(proof.public_inputs, vec!["0x01".to_string()]);
    }
}
