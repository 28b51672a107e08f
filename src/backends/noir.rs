// src/backends/noir.rs
//! HTTP client for a Noir execution and proving sidecar.
//!
//! | Method | Body | Answer |
//! |--------|------|--------|
//! | `execute` | `{bytecode, abi, inputs}` | `{witness}` (base64) |
//! | `generateProof` | `{bytecode, witness, options}` | `{proof, publicInputs}` |
//! | `verifyProof` | `{bytecode, proof: {proof, publicInputs}, options}` | `{valid}` |

use crate::backends::http_client::JsonServiceClient;
use crate::backends::ProverBackend;
use crate::error::Result;
use crate::models::circuit::{ExternalProof, ProofOptions, Witness};
use crate::zkp::proof_generation::{CircuitAbi, CircuitArtifact};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Serialize)]
struct ExecuteRequest<'a> {
    bytecode: &'a str,
    abi: &'a CircuitAbi,
    inputs: &'a Map<String, Value>,
}

#[derive(Deserialize)]
struct ExecuteResponse {
    witness: Witness,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProveRequest<'a> {
    bytecode: &'a str,
    witness: &'a Witness,
    options: ProofOptions,
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    bytecode: &'a str,
    proof: &'a ExternalProof,
    options: ProofOptions,
}

#[derive(Deserialize)]
struct VerifyResponse {
    valid: bool,
}

#[derive(Debug, Clone)]
pub struct HttpProverBackend {
    client: JsonServiceClient,
}

impl HttpProverBackend {
    pub fn new(client: JsonServiceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProverBackend for HttpProverBackend {
    async fn execute(
        &self,
        artifact: &CircuitArtifact,
        inputs: &Map<String, Value>,
    ) -> Result<Witness> {
        let response: ExecuteResponse = self
            .client
            .call(
                "execute",
                &ExecuteRequest {
                    bytecode: &artifact.bytecode,
                    abi: &artifact.abi,
                    inputs,
                },
            )
            .await?;
        Ok(response.witness)
    }

    async fn generate_proof(
        &self,
        artifact: &CircuitArtifact,
        witness: &Witness,
        options: ProofOptions,
    ) -> Result<ExternalProof> {
        self.client
            .call(
                "generateProof",
                &ProveRequest {
                    bytecode: &artifact.bytecode,
                    witness,
                    options,
                },
            )
            .await
    }

    async fn verify_proof(
        &self,
        artifact: &CircuitArtifact,
        proof: &ExternalProof,
        options: ProofOptions,
    ) -> Result<bool> {
        let response: VerifyResponse = self
            .client
            .call(
                "verifyProof",
                &VerifyRequest {
                    bytecode: &artifact.bytecode,
                    proof,
                    options,
                },
            )
            .await?;
        Ok(response.valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn requests_carry_base64_bytes_and_keccak_flag() {
        let witness = Witness(vec![1, 2, 250]);
        let body = serde_json::to_value(ProveRequest {
            bytecode: "H4sI",
            witness: &witness,
            options: ProofOptions::default(),
        })
        .unwrap();
        let expected = json!({"bytecode": "H4sI", "witness": "AQL6", "options": {"keccak": true}});
        assert_eq!(body, expected);

        let proof = ExternalProof { proof: vec![1, 2, 250], public_inputs: vec!["0x01".into()] };
        let body = serde_json::to_value(VerifyRequest {
            bytecode: "H4sI",
            proof: &proof,
            options: ProofOptions::default(),
        })
        .unwrap();
        assert_eq!(body["proof"], json!({"proof": "AQL6", "publicInputs": ["0x01"]}));
    }

    #[test]
    fn witness_answers_decode_from_any_byte_transport() {
        let from_b64: ExecuteResponse = serde_json::from_value(json!({"witness": "AQL6"})).unwrap();
        let sparse = json!({"witness": {"0": 1, "1": 2, "2": 250}});
        let from_sparse: ExecuteResponse = serde_json::from_value(sparse).unwrap();
        assert_eq!(from_b64.witness, from_sparse.witness);
    }
}
