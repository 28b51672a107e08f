// src/models/credential.rs
//! Committed credential data model.
//!
//! An issued credential carries, for every attribute, its cleartext value next
//! to a Poseidon commitment and the issuer's EdDSA signature over that
//! commitment. A single [`DelegationBinding`] ties the signing key to the
//! issuer DID.

use crate::models::attribute::Attribute;
use crate::models::field::FieldElement;
use serde::{Deserialize, Serialize};

/// EdDSA signature over a field element.
///
/// `S` is a BabyJubJub scalar; it always fits in the base field so it travels
/// in the same decimal form as the curve coordinates.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct EddsaSignature {
    #[serde(rename = "R8x")]
    pub r8x: FieldElement,
    #[serde(rename = "R8y")]
    pub r8y: FieldElement,
    #[serde(rename = "S")]
    pub s: FieldElement,
}

/// BabyJubJub public key of the issuer's field-signing key.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey {
    pub signer_x: FieldElement,
    pub signer_y: FieldElement,
}

/// Commitment to one attribute: `{hash, signature}`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Commitment {
    pub hash: FieldElement,
    pub signature: EddsaSignature,
}

/// Proof that the issuer DID authorized the field-signing key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DelegationBinding {
    pub did: String,
    pub signer_x: FieldElement,
    pub signer_y: FieldElement,
    pub signature: EddsaSignature,
}

impl DelegationBinding {
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            signer_x: self.signer_x,
            signer_y: self.signer_y,
        }
    }
}

/// One committed attribute inside a credential subject.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BoundField {
    /// Full path, e.g. `firstname` or `offerAc[0].offer`; also the hashed key.
    pub path: String,
    /// Cleartext; `None` once the holder has discarded it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub commitment: Commitment,
}

impl BoundField {
    pub fn attribute(&self) -> Option<Attribute> {
        self.value.as_ref().map(|value| Attribute {
            key: self.path.clone(),
            value: value.clone(),
        })
    }
}

/// Ordered mapping from attribute path to `{cleartext, commitment}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CredentialSubject {
    /// `urn:uuid:<v4>`
    pub id: String,
    pub fields: Vec<BoundField>,
}

impl CredentialSubject {
    /// Resolves a dotted/indexed path; a leading `credentialSubject.` is ignored.
    pub fn resolve(&self, path: &str) -> Option<&BoundField> {
        let path = normalize_path(path);
        self.fields.iter().find(|f| f.path == path)
    }

    /// Every provable path, in commitment order.
    pub fn paths(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.path.as_str()).collect()
    }

    /// Drops the cleartext of one field, keeping its commitment and signature.
    ///
    /// Returns `false` when the path does not resolve.
    pub fn discard_cleartext(&mut self, path: &str) -> bool {
        let path = normalize_path(path);
        match self.fields.iter_mut().find(|f| f.path == path) {
            Some(field) => {
                field.value = None;
                true
            }
            None => false,
        }
    }
}

fn normalize_path(path: &str) -> &str {
    let path = path.trim();
    path.strip_prefix("credentialSubject.").unwrap_or(path)
}

/// A credential as held by the user after issuance.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCredential {
    pub id: String,
    pub issuer: String,
    pub issuance_date: String,
    #[serde(rename = "type")]
    pub types: Vec<String>,
    pub credential_subject: CredentialSubject,
    pub delegation: DelegationBinding,
    /// JWT envelope signed by the DID agent; absent for offline bindings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(path: &str, value: &str) -> BoundField {
        let zero = FieldElement::zero();
        BoundField {
            path: path.into(),
            value: Some(value.into()),
            commitment: Commitment {
                hash: zero,
                signature: EddsaSignature { r8x: zero, r8y: zero, s: zero },
            },
        }
    }

    fn subject() -> CredentialSubject {
        CredentialSubject {
            id: "urn:uuid:test".into(),
            fields: vec![field("firstname", "John"), field("offerAc[0].offer", "1000000")],
        }
    }

    #[test]
    fn resolves_plain_indexed_and_prefixed_paths() {
        let subject = subject();
        assert_eq!(subject.resolve("firstname").unwrap().value.as_deref(), Some("John"));
        assert_eq!(subject.resolve("offerAc[0].offer").unwrap().value.as_deref(), Some("1000000"));
        assert!(subject.resolve("credentialSubject.firstname").is_some());
        assert!(subject.resolve("offerAc[1].offer").is_none());
        assert_eq!(subject.paths(), vec!["firstname", "offerAc[0].offer"]);
    }

    #[test]
    fn discarding_cleartext_keeps_commitment() {
        let mut subject = subject();
        let before = subject.resolve("firstname").unwrap().commitment;
        assert!(subject.discard_cleartext("firstname"));
        let after = subject.resolve("firstname").unwrap();
        assert_eq!(after.value, None);
        assert_eq!(after.commitment, before);
        assert!(after.attribute().is_none());
        assert!(!subject.discard_cleartext("lastname"));
    }

    #[test]
    fn signature_components_use_circuit_names() {
        let json = serde_json::to_value(field("firstname", "John").commitment).unwrap();
        assert!(json["signature"]["R8x"].is_string());
        assert!(json["signature"]["R8y"].is_string());
        assert!(json["signature"]["S"].is_string());
    }
}
