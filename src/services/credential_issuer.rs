// src/services/credential_issuer.rs
//! Credential Issuer Service
//!
//! Binds verified attribute values to signed Poseidon commitments and asks
//! the DID/VC agent to wrap the result in a JWT credential.
//!
//! Binding is pure computation: hash every schema field under its full path,
//! sign each hash with the issuer's BabyJubJub key, and sign the hash of the
//! signer's public-key hex once as the delegation. The agent only sees the
//! finished subject.

use crate::backends::CredentialAgent;
use crate::error::{InputValidationError, Result};
use crate::models::attribute::{scalar_text, CandidateSubject, FieldGroup, Schema};
use crate::models::credential::{
    BoundField, Commitment, CredentialSubject, DelegationBinding, IssuedCredential,
};
use crate::utils::crypto::{hash_attribute, hash_string};
use crate::utils::parallel::map_ordered;
use crate::wallet::key_management::EddsaSigner;
use log::{debug, info};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

/// Credential types set on every issued envelope.
pub const CREDENTIAL_TYPES: [&str; 2] = ["VerifiableCredential", "ZKAccess"];

/// Output of [`FieldBinder::bind`]: committed subject plus delegation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundCredential {
    pub subject: CredentialSubject,
    pub delegation: DelegationBinding,
}

impl BoundCredential {
    /// Wraps the binding in a credential with a fresh id and the current time.
    pub fn into_credential(self, jwt: Option<String>) -> IssuedCredential {
        IssuedCredential {
            id: format!("urn:uuid:{}", Uuid::new_v4()),
            issuer: self.delegation.did.clone(),
            issuance_date: chrono::Utc::now().to_rfc3339(),
            types: CREDENTIAL_TYPES.iter().map(|t| t.to_string()).collect(),
            credential_subject: self.subject,
            delegation: self.delegation,
            jwt,
        }
    }
}

/// Converts verified attribute groups into signed commitments.
#[derive(Debug, Clone)]
pub struct FieldBinder {
    /// Issuer DID the delegation is made for
    did: String,
}

impl FieldBinder {
    pub fn new(did: impl Into<String>) -> Self {
        Self { did: did.into() }
    }

    /// Commits and signs every schema field of every group.
    ///
    /// # Arguments
    /// * `groups` - Schema-tagged value maps, in commitment order
    /// * `private_key_hex` - Issuer BabyJubJub key, used for this call only
    ///
    /// # Errors
    /// - `MissingRequiredField` (with the full path) before any hashing
    /// - `InvalidKeyFormat` if the key does not parse
    pub fn bind(&self, groups: &[FieldGroup], private_key_hex: &str) -> Result<BoundCredential> {
        let mut entries: Vec<(String, String)> = Vec::new();
        for group in groups {
            for key in group.schema.keys {
                let path = group.path(key);
                let value = group
                    .values
                    .get(*key)
                    .ok_or_else(|| InputValidationError::MissingRequiredField(path.clone()))?;
                entries.push((path, value.clone()));
            }
            let extras = group.values.keys().filter(|k| !group.schema.keys.contains(&k.as_str()));
            for extra in extras {
                debug!("Ignoring field `{}` outside schema {}", group.path(extra), group.schema.id);
            }
        }

        let signer = EddsaSigner::from_hex(private_key_hex)?;
        let public_key = signer.public_key();

        let fields = map_ordered(&entries, |(path, value)| {
            let hash = hash_attribute(path, value);
            BoundField {
                path: path.clone(),
                value: Some(value.clone()),
                commitment: Commitment {
                    hash,
                    signature: signer.sign(&hash),
                },
            }
        });
        for field in &fields {
            debug!("Committed field {}", field.path);
        }

        let delegation = DelegationBinding {
            did: self.did.clone(),
            signer_x: public_key.signer_x,
            signer_y: public_key.signer_y,
            signature: signer.sign(&hash_string(&signer.public_key_hex()?)),
        };

        info!("Bound {} fields for {}", fields.len(), self.did);
        Ok(BoundCredential {
            subject: CredentialSubject {
                id: format!("urn:uuid:{}", Uuid::new_v4()),
                fields,
            },
            delegation,
        })
    }
}

/// Builds a field group from a raw JSON object checked against `schema`.
///
/// Strings are taken verbatim; numbers and booleans are stringified once
/// here and never again. `null` counts as absent.
pub fn group_from_json(schema: Schema, object: &Map<String, Value>) -> Result<FieldGroup> {
    let mut values = BTreeMap::new();
    for (key, value) in object {
        if let Some(text) = scalar_text(key, value)? {
            values.insert(key.clone(), text);
        }
    }
    Ok(FieldGroup::root(schema, values))
}

/// Splits `offerAc[0].offer` into `(Some(("offerAc", "0")), "offer")`.
fn split_path(path: &str) -> (Option<(&str, &str)>, &str) {
    if let Some((head, key)) = path.split_once("].") {
        if let Some((collection, index)) = head.split_once('[') {
            return (Some((collection, index)), key);
        }
    }
    (None, path)
}

/// Reads a value written by [`insert_nested`]; `None` when any level is absent.
pub(crate) fn lookup_nested<'a>(source: &'a Value, path: &str) -> Option<&'a Value> {
    match split_path(path) {
        (Some((collection, index)), key) => source.get(collection)?.get(index)?.get(key),
        (None, key) => source.get(key),
    }
}

fn insert_nested(target: &mut Map<String, Value>, path: &str, value: Value) {
    match split_path(path) {
        (Some((collection, index)), key) => {
            let records = target
                .entry(collection.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(records) = records {
                let record = records
                    .entry(index.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(record) = record {
                    record.insert(key.to_string(), value);
                }
            }
        }
        (None, key) => {
            target.insert(key.to_string(), value);
        }
    }
}

/// Credential payload handed to the agent: cleartext subject plus circuit inputs.
///
/// Id, issuer and issuance date are taken from `credential` so the signed
/// envelope and the held credential agree.
pub fn credential_payload(credential: &IssuedCredential) -> Value {
    let subject = &credential.credential_subject;
    let mut cleartext = Map::new();
    cleartext.insert("id".into(), Value::String(subject.id.clone()));
    let mut commitments = Map::new();
    for field in &subject.fields {
        let value = field.value.clone().map(Value::String).unwrap_or(Value::Null);
        insert_nested(&mut cleartext, &field.path, value);
        insert_nested(&mut commitments, &field.path, json!(field.commitment));
    }

    json!({
        "id": credential.id,
        "type": credential.types,
        "issuer": { "id": credential.issuer },
        "issuanceDate": credential.issuance_date,
        "credentialSubject": cleartext,
        "circuitInputs": {
            "delegation": credential.delegation,
            "credentialSubject": commitments,
        },
    })
}

/// Issues committed credentials through the DID/VC agent.
#[derive(Clone)]
pub struct CredentialIssuer {
    agent: Arc<dyn CredentialAgent>,
    /// Alias of the issuer identifier in the agent
    alias: String,
}

impl CredentialIssuer {
    pub fn new(agent: Arc<dyn CredentialAgent>, alias: &str) -> Self {
        Self {
            agent,
            alias: alias.to_string(),
        }
    }

    /// Binds a merged subject and emits it as a JWT credential.
    ///
    /// # Process Flow
    /// 1. Parses the issuer key; a bad key never reaches the agent
    /// 2. Resolves (or creates) the issuer DID in the agent
    /// 3. Binds the fields on a blocking thread
    /// 4. Asks the agent to sign the envelope
    pub async fn bind_and_emit(
        &self,
        candidate: &CandidateSubject,
        private_key_hex: &str,
    ) -> Result<IssuedCredential> {
        EddsaSigner::from_hex(private_key_hex)?;
        let did = self.agent.get_or_create_did(&self.alias).await?;
        let groups = candidate.field_groups();
        let key = private_key_hex.to_string();
        let binder = FieldBinder::new(did);

        let bound = task::spawn_blocking(move || binder.bind(&groups, &key)).await??;

        let mut credential = bound.into_credential(None);
        let jwt = self
            .agent
            .create_verifiable_credential(credential_payload(&credential))
            .await?;
        credential.jwt = Some(jwt);
        info!("Issued credential {} by {}", credential.id, credential.issuer);
        Ok(credential)
    }
}
