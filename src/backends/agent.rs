// src/backends/agent.rs
//! HTTP client for a Veramo-style DID/VC agent.
//!
//! The agent exposes its plugin methods as `POST /agent/<method>`:
//! `didManagerGetByAlias`, `didManagerCreate`, `createVerifiableCredential`
//! and `verifyCredential`.

use crate::backends::http_client::JsonServiceClient;
use crate::backends::{CredentialAgent, CredentialVerification};
use crate::error::{Error, ExternalServiceError, Result};
use async_trait::async_trait;
use log::{info, warn};
use serde::Deserialize;
use serde_json::{json, Value};

const SERVICE: &str = "agent";

#[derive(Deserialize)]
struct Identifier {
    did: String,
}

#[derive(Deserialize)]
struct JwtProof {
    jwt: String,
}

#[derive(Deserialize)]
struct SignedCredential {
    proof: JwtProof,
}

#[derive(Debug, Clone)]
pub struct HttpCredentialAgent {
    client: JsonServiceClient,
}

impl HttpCredentialAgent {
    /// `client` must point at the agent root (`.../agent`).
    pub fn new(client: JsonServiceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CredentialAgent for HttpCredentialAgent {
    async fn get_or_create_did(&self, alias: &str) -> Result<String> {
        match self
            .client
            .call::<_, Identifier>("didManagerGetByAlias", &json!({ "alias": alias }))
            .await
        {
            Ok(identifier) => Ok(identifier.did),
            // the agent answers a missing alias with an error status
            Err(Error::ExternalService(ExternalServiceError::Status { status, .. })) => {
                warn!("No identifier under alias `{}` (status {}), creating one", alias, status);
                let identifier: Identifier = self
                    .client
                    .call(
                        "didManagerCreate",
                        &json!({
                            "alias": alias,
                            "provider": "did:key",
                            "kms": "local",
                            "options": { "keyType": "Secp256r1" }
                        }),
                    )
                    .await?;
                info!("Created issuer identifier {}", identifier.did);
                Ok(identifier.did)
            }
            Err(e) => Err(e),
        }
    }

    async fn create_verifiable_credential(&self, credential: Value) -> Result<String> {
        let signed: SignedCredential = self
            .client
            .call(
                "createVerifiableCredential",
                &json!({ "credential": credential, "proofFormat": "jwt" }),
            )
            .await?;
        if signed.proof.jwt.is_empty() {
            return Err(ExternalServiceError::Decode {
                service: SERVICE,
                reason: "credential proof carries no jwt".into(),
            }
            .into());
        }
        Ok(signed.proof.jwt)
    }

    async fn verify_credential(&self, jwt: &str) -> Result<CredentialVerification> {
        let response: Value = self
            .client
            .call("verifyCredential", &json!({ "credential": jwt, "proofFormat": "jwt" }))
            .await?;
        Ok(parse_verification(response))
    }
}

/// Normalizes the agent's answer; `error` may be a string or an object with a `message`.
///
/// The signed payload is read from `verifiableCredential`, or from the raw
/// JWT claims under `payload.vc`.
fn parse_verification(response: Value) -> CredentialVerification {
    let verified = response.get("verified").and_then(Value::as_bool).unwrap_or(false);
    let error = match response.get("error") {
        Some(Value::String(message)) => Some(message.clone()),
        Some(Value::Object(object)) => object
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(Value::Object(object.clone()).to_string())),
        _ => None,
    };
    let credential = response
        .get("verifiableCredential")
        .or_else(|| response.pointer("/payload/vc"))
        .filter(|vc| vc.is_object())
        .cloned();
    CredentialVerification {
        verified,
        error,
        credential,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_answers_are_normalized() {
        let ok = parse_verification(json!({"verified": true}));
        let expected = CredentialVerification {
            verified: true,
            error: None,
            credential: None,
        };
        assert_eq!(ok, expected);

        let failed = parse_verification(json!({
            "verified": false,
            "error": {"message": "invalid_signature"}
        }));
        assert!(!failed.verified);
        assert_eq!(failed.error.as_deref(), Some("invalid_signature"));

        let plain = parse_verification(json!({"verified": false, "error": "expired"}));
        assert_eq!(plain.error.as_deref(), Some("expired"));

        // anything without a boolean `verified` is treated as unverified
        assert!(!parse_verification(json!({})).verified);
    }

    #[test]
    fn verified_payload_is_kept() {
        let normalized = parse_verification(json!({
            "verified": true,
            "verifiableCredential": {"issuer": {"id": "did:key:z1"}, "circuitInputs": {}}
        }));
        let vc = normalized.credential.unwrap();
        assert_eq!(vc["issuer"]["id"], "did:key:z1");

        let raw = parse_verification(json!({
            "verified": true,
            "payload": {"iss": "did:key:z2", "vc": {"circuitInputs": {"delegation": {}}}}
        }));
        assert!(raw.credential.unwrap()["circuitInputs"]["delegation"].is_object());
    }

    #[tokio::test]
    async fn verification_posts_the_jwt() {
        let _m = mockito::mock("POST", "/agent-verify/verifyCredential")
            .match_body(mockito::Matcher::PartialJson(json!({
                "credential": "eyJ.a.b",
                "proofFormat": "jwt"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"verified": true, "verifiableCredential": {"id": "urn:uuid:1"}}"#)
            .create();

        let verification = agent("agent-verify").verify_credential("eyJ.a.b").await.unwrap();
        assert!(verification.verified);
        assert_eq!(verification.credential.unwrap()["id"], "urn:uuid:1");
    }

    fn agent(prefix: &str) -> HttpCredentialAgent {
        let base = format!("{}/{}", mockito::server_url(), prefix);
        HttpCredentialAgent::new(JsonServiceClient::new(SERVICE, &base, None).unwrap())
    }

    #[tokio::test]
    async fn missing_alias_creates_a_did_key() {
        let lookup = mockito::mock("POST", "/agent-create/didManagerGetByAlias")
            .with_status(500)
            .with_body(r#"{"error": "Identifier not found"}"#)
            .create();
        let create = mockito::mock("POST", "/agent-create/didManagerCreate")
            .match_body(mockito::Matcher::PartialJson(json!({
                "alias": "issuer",
                "provider": "did:key",
                "options": {"keyType": "Secp256r1"}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"did": "did:key:zDnaeNew", "keys": []}"#)
            .create();

        let did = agent("agent-create").get_or_create_did("issuer").await.unwrap();
        assert_eq!(did, "did:key:zDnaeNew");
        lookup.assert();
        create.assert();
    }

    #[tokio::test]
    async fn existing_alias_is_reused() {
        let _lookup = mockito::mock("POST", "/agent-reuse/didManagerGetByAlias")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"did": "did:key:zDnaeOld"}"#)
            .create();
        let create = mockito::mock("POST", "/agent-reuse/didManagerCreate").expect(0).create();

        let did = agent("agent-reuse").get_or_create_did("default").await.unwrap();
        assert_eq!(did, "did:key:zDnaeOld");
        create.assert();
    }

    #[tokio::test]
    async fn issued_jwt_is_taken_from_the_proof() {
        let _m = mockito::mock("POST", "/agent-issue/createVerifiableCredential")
            .match_body(mockito::Matcher::PartialJson(json!({"proofFormat": "jwt"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"proof": {"type": "JwtProof2020", "jwt": "eyJ.a.b"}}"#)
            .create();

        let jwt = agent("agent-issue")
            .create_verifiable_credential(json!({"type": ["VerifiableCredential", "ZKAccess"]}))
            .await
            .unwrap();
        assert_eq!(jwt, "eyJ.a.b");
    }
}
