// src/zkp/proof_verification.rs
//! # Proof Verification
//!
//! Verifies proofs produced by [`ProofDriver::generate`] against the same
//! compiled circuit. Proofs arrive from loosely-typed transports, so the
//! decoder accepts three shapes for the proof bytes:
//! - base64 string
//! - JSON byte array
//! - sparse object keyed by stringified indices (`{"0": 12, "1": 250}`)
//!
//! Sparse objects are rebuilt by sorting keys numerically; gaps, stray keys
//! and out-of-range bytes fail with `MalformedProofEncoding`.
//!
//! The `signer_x`/`signer_y` public inputs must equal the driver's pinned
//! issuer key; otherwise the proof is invalid and the backend is not called.

use crate::error::{ExternalServiceError, InputValidationError, Result};
use crate::models::circuit::ExternalProof;
use crate::models::field::FieldElement;
use crate::zkp::proof_generation::ProofDriver;
use log::{info, warn};
use serde_json::Value;

/// Decodes a proof envelope `{proof, publicInputs}` or a bare proof-bytes value.
pub fn decode_proof(value: &Value) -> std::result::Result<ExternalProof, InputValidationError> {
    let envelope = match value {
        Value::Object(object) if object.contains_key("proof") => value.clone(),
        _ => serde_json::json!({ "proof": value }),
    };
    serde_json::from_value(envelope)
        .map_err(|e| InputValidationError::MalformedProofEncoding(e.to_string()))
}

impl ProofDriver {
    /// Verifies `proof` with the circuit's keccak public-input scheme.
    ///
    /// # Returns
    /// - `Ok(true)` if the backend accepts the proof
    /// - `Ok(false)` if it rejects it or the proof was made for another signer
    ///
    /// # Errors
    /// - `MalformedProofEncoding` for empty proofs or missing signer public inputs
    /// - `ProofVerificationFailed` when the backend fails or times out
    pub async fn verify(&self, proof: &ExternalProof) -> Result<bool> {
        if proof.proof.is_empty() {
            return Err(InputValidationError::MalformedProofEncoding("empty proof".into()).into());
        }

        let (x_at, y_at) = self.layout.signer_offsets;
        let signer_x = public_input(proof, x_at)?;
        let signer_y = public_input(proof, y_at)?;
        if signer_x != self.issuer.signer_x || signer_y != self.issuer.signer_y {
            warn!(
                "Proof carries signer ({}, {}), not the trusted issuer key",
                signer_x, signer_y
            );
            return Ok(false);
        }

        let valid = self
            .bounded(
                "verification",
                self.backend.verify_proof(&self.artifact, proof, self.options),
                verification_failed,
            )
            .await?;

        if valid {
            info!("Proof verified ({} bytes)", proof.proof.len());
        } else {
            warn!("Proof rejected by verifier");
        }
        Ok(valid)
    }

    /// Decodes a loosely-typed proof value, then verifies it.
    pub async fn verify_value(&self, value: &Value) -> Result<bool> {
        let proof = decode_proof(value)?;
        self.verify(&proof).await
    }
}

fn public_input(
    proof: &ExternalProof,
    index: usize,
) -> std::result::Result<FieldElement, InputValidationError> {
    let raw = proof.public_inputs.get(index).ok_or_else(|| {
        InputValidationError::MalformedProofEncoding(format!(
            "{} public inputs, signer expected at {}",
            proof.public_inputs.len(),
            index
        ))
    })?;
    FieldElement::parse_public_input(raw)
        .map_err(|e| InputValidationError::MalformedProofEncoding(e.to_string()))
}

fn verification_failed(reason: String) -> ExternalServiceError {
    ExternalServiceError::ProofVerificationFailed(reason)
}
