// src/backends/blueprint.rs
//! HTTP client for the zk-email blueprint verifier.

use crate::backends::http_client::JsonServiceClient;
use crate::backends::BlueprintVerifier;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize)]
struct VerifyRequest<'a> {
    blueprint: &'a str,
    proof: &'a Value,
}

#[derive(Deserialize)]
struct VerifyResponse {
    valid: bool,
}

/// Verifies email proofs against one named blueprint (`owner/name@version`).
#[derive(Debug, Clone)]
pub struct HttpBlueprintVerifier {
    client: JsonServiceClient,
    blueprint: String,
}

impl HttpBlueprintVerifier {
    pub fn new(client: JsonServiceClient, blueprint: &str) -> Self {
        Self {
            client,
            blueprint: blueprint.to_string(),
        }
    }

    pub fn blueprint(&self) -> &str {
        &self.blueprint
    }
}

#[async_trait]
impl BlueprintVerifier for HttpBlueprintVerifier {
    async fn verify_proof(&self, proof: &Value) -> Result<bool> {
        let response: VerifyResponse = self
            .client
            .call(
                "verifyProof",
                &VerifyRequest {
                    blueprint: &self.blueprint,
                    proof,
                },
            )
            .await?;
        Ok(response.valid)
    }
}
