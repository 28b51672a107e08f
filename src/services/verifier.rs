// src/services/verifier.rs
//! Verification service for issued credentials and access proofs.
//!
//! Two independent checks are offered:
//! - the credential envelope: local commitment and delegation checks, the JWT
//!   through the DID/VC agent, then the JWT's signed claims against the local
//!   delegation and commitments
//! - a zero-knowledge access proof, through the [`ProofDriver`]

use crate::backends::{CredentialAgent, CredentialVerification};
use crate::error::{
    ArtifactError, CryptoOperationError, ExternalServiceError, InputValidationError, Result,
};
use crate::models::credential::{Commitment, DelegationBinding, IssuedCredential};
use crate::services::credential_issuer::lookup_nested;
use crate::wallet::key_management::EddsaSigner;
use crate::zkp::proof_generation::{ProofDriver, CIRCUIT_LAYOUT};
use crate::zkp::witness_builder::{verify_delegation, verify_field};
use log::{info, warn};
use serde_json::Value;
use std::sync::Arc;

/// Credential and proof verifier.
///
/// The Verifier provides:
/// - Thread-safe access to the agent via `Arc`
/// - Async verification operations
#[derive(Clone)]
pub struct Verifier {
    /// DID/VC agent checking JWT envelopes
    agent: Arc<dyn CredentialAgent>,
    /// Proof driver for the access circuit, when an artifact is loaded
    driver: Option<ProofDriver>,
}

impl Verifier {
    pub fn new(agent: Arc<dyn CredentialAgent>) -> Self {
        Self { agent, driver: None }
    }

    pub fn with_proof_driver(mut self, driver: ProofDriver) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Verifies an access proof given in any accepted transport shape.
    ///
    /// # Returns
    /// - `Ok(true)` if the proof is valid for the trusted issuer
    /// - `Ok(false)` if the verifier rejects it
    /// - `Err` for malformed encodings or verifier failures
    pub async fn verify_proof(&self, proof: &Value) -> Result<bool> {
        let driver = self.driver.as_ref().ok_or(ArtifactError::Layout {
            layout: CIRCUIT_LAYOUT,
            reason: "no circuit artifact loaded".into(),
        })?;
        driver.verify_value(proof).await
    }

    /// Verifies a held credential.
    ///
    /// # Process Flow
    /// 1. Checks the delegation signature
    /// 2. Checks every commitment (against its cleartext when still present)
    /// 3. Asks the agent to verify the JWT envelope
    /// 4. Requires the JWT's `circuitInputs` to carry the same delegation and
    ///    commitments as the held credential
    ///
    /// # Errors
    /// - `DelegationMismatch` when the JWT was issued for another delegation
    /// - `CommitmentMismatch` when a held commitment is absent from the JWT or differs
    /// - `Decode` when the agent verifies the JWT but returns no claims
    pub async fn verify_credential(
        &self,
        credential: &IssuedCredential,
    ) -> Result<CredentialVerification> {
        verify_bindings(credential)?;

        let jwt = credential
            .jwt
            .as_deref()
            .ok_or_else(|| InputValidationError::MissingRequiredField("jwt".into()))?;
        let verification = self.agent.verify_credential(jwt).await?;
        if !verification.verified {
            warn!(
                "Credential {} rejected by agent: {}",
                credential.id,
                verification.error.as_deref().unwrap_or("no reason given")
            );
            return Ok(verification);
        }

        let claims = verification.credential.as_ref().ok_or(ExternalServiceError::Decode {
            service: "agent",
            reason: "verified credential carries no claims".into(),
        })?;
        match_envelope(credential, claims)?;
        info!("Credential {} verified", credential.id);
        Ok(verification)
    }
}

/// Checks the delegation and every field commitment of a credential.
///
/// Fields whose cleartext was discarded are checked for the issuer
/// signature only.
pub fn verify_bindings(
    credential: &IssuedCredential,
) -> std::result::Result<(), CryptoOperationError> {
    let delegation = &credential.delegation;
    verify_delegation(delegation)?;

    let key = delegation.public_key();
    for field in &credential.credential_subject.fields {
        match field.value.as_deref() {
            Some(cleartext) => verify_field(field, cleartext, delegation)?,
            None => {
                let commitment = &field.commitment;
                if !EddsaSigner::verify(&commitment.hash, &commitment.signature, &key) {
                    return Err(CryptoOperationError::SignatureMismatch(field.path.clone()));
                }
            }
        }
    }
    Ok(())
}

/// Requires the JWT-signed `circuitInputs` to match the held credential.
///
/// Every held field must appear in the signed commitments with the same hash
/// and signature; the signed delegation must equal the held one.
pub fn match_envelope(
    credential: &IssuedCredential,
    claims: &Value,
) -> std::result::Result<(), CryptoOperationError> {
    let did = &credential.delegation.did;
    let delegation_mismatch = || {
        warn!("Credential {} is not the one its JWT was issued for", credential.id);
        CryptoOperationError::DelegationMismatch(did.clone())
    };

    let circuit = claims.get("circuitInputs").ok_or_else(delegation_mismatch)?;
    let signed: DelegationBinding = circuit
        .get("delegation")
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
        .ok_or_else(delegation_mismatch)?;
    if signed != credential.delegation {
        return Err(delegation_mismatch());
    }
    let issuer = claims.get("issuer").and_then(|issuer| match issuer {
        Value::String(id) => Some(id.as_str()),
        other => other.get("id").and_then(Value::as_str),
    });
    if issuer != Some(did.as_str()) {
        return Err(delegation_mismatch());
    }

    let commitments = circuit.get("credentialSubject").ok_or_else(delegation_mismatch)?;
    for field in &credential.credential_subject.fields {
        let signed: Option<Commitment> = lookup_nested(commitments, &field.path)
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok());
        if signed != Some(field.commitment) {
            warn!("Field {} differs from the JWT commitment", field.path);
            return Err(CryptoOperationError::CommitmentMismatch(field.path.clone()));
        }
    }
    Ok(())
}
