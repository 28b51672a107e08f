// src/backends/mod.rs
//! External collaborators this crate calls into.
//!
//! Each collaborator is a trait so the issuance, intake and proving flows can
//! run against the HTTP clients in this module or against in-process fakes.

pub mod agent;
pub mod blueprint;
pub mod http_client;
pub mod noir;

use crate::error::Result;
use crate::models::circuit::{ExternalProof, ProofOptions, Witness};
use crate::zkp::proof_generation::CircuitArtifact;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Public outputs of a zk-email proof, as exposed by the blueprint.
///
/// Each entry is a list because a blueprint may match a pattern several times;
/// only the first match is used.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailPublicData {
    #[serde(default)]
    pub subject: Vec<String>,
    #[serde(default)]
    pub email_sender: Vec<String>,
    #[serde(default)]
    pub sender_domain: Vec<String>,
    /// Send time carried by the proof, when the blueprint extracts one.
    #[serde(default)]
    pub timestamp: Vec<String>,
}

impl EmailPublicData {
    pub fn first_subject(&self) -> &str {
        first(&self.subject)
    }

    pub fn first_sender(&self) -> &str {
        first(&self.email_sender)
    }

    pub fn first_domain(&self) -> &str {
        first(&self.sender_domain)
    }

    pub fn first_timestamp(&self) -> Option<&str> {
        self.timestamp.first().map(|s| s.trim()).filter(|s| !s.is_empty())
    }
}

fn first(values: &[String]) -> &str {
    values.first().map(|s| s.trim()).unwrap_or("")
}

/// zk-email circuit blueprint verifier.
#[async_trait]
pub trait BlueprintVerifier: Send + Sync {
    /// Checks an email proof against the configured blueprint.
    async fn verify_proof(&self, proof: &Value) -> Result<bool>;

    /// Reads the public outputs of a proof (`props.publicData`).
    fn public_data(&self, proof: &Value) -> EmailPublicData {
        proof
            .pointer("/props/publicData")
            .cloned()
            .and_then(|data| serde_json::from_value(data).ok())
            .unwrap_or_default()
    }
}

/// Outcome of an envelope check by the DID/VC agent.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CredentialVerification {
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Credential payload carried by the verified JWT
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<Value>,
}

/// DID/VC agent that owns the issuer DID and signs JWT envelopes.
#[async_trait]
pub trait CredentialAgent: Send + Sync {
    /// Returns the DID stored under `alias`, creating it when absent.
    async fn get_or_create_did(&self, alias: &str) -> Result<String>;

    /// Issues a JWT credential for `credential`, returning the JWT.
    async fn create_verifiable_credential(&self, credential: Value) -> Result<String>;

    /// Checks a JWT credential envelope, returning the signed payload when it verifies.
    async fn verify_credential(&self, jwt: &str) -> Result<CredentialVerification>;
}

/// Circuit execution and proving backend.
#[async_trait]
pub trait ProverBackend: Send + Sync {
    /// Solves the circuit for `inputs`, returning the witness.
    async fn execute(
        &self,
        artifact: &CircuitArtifact,
        inputs: &Map<String, Value>,
    ) -> Result<Witness>;

    async fn generate_proof(
        &self,
        artifact: &CircuitArtifact,
        witness: &Witness,
        options: ProofOptions,
    ) -> Result<ExternalProof>;

    async fn verify_proof(
        &self,
        artifact: &CircuitArtifact,
        proof: &ExternalProof,
        options: ProofOptions,
    ) -> Result<bool>;
}
