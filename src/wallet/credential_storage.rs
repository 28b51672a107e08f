// src/wallet/credential_storage.rs
//! Credential storage for the holder wallet.
//!
//! Provides an in-memory store of issued credentials keyed by credential id.
//! The holder may discard cleartext values after issuance; commitments and
//! signatures are always retained so the field stays provable.

use crate::models::credential::IssuedCredential;
use std::collections::HashMap;

/// In-memory storage for issued credentials.
///
/// This storage provides:
/// - O(1) average case lookups by credential id
/// - Cleartext pruning that never touches commitments
///
/// # Note
/// Not synchronized; wrap in a `Mutex` when shared between tasks.
#[derive(Debug, Default)]
pub struct CredentialStorage {
    /// Internal hashmap storing credentials by their ID
    credentials: HashMap<String, IssuedCredential>,
}

impl CredentialStorage {
    /// Creates a new empty CredentialStorage instance.
    pub fn new() -> Self {
        CredentialStorage {
            credentials: HashMap::new(),
        }
    }

    /// Stores a credential under its own id, returning that id.
    ///
    /// # Behavior
    /// - Overwrites an existing credential with the same id
    /// - Does not validate the credential; proving does that
    pub fn store_credential(&mut self, credential: IssuedCredential) -> String {
        let id = credential.id.clone();
        self.credentials.insert(id.clone(), credential);
        id
    }

    /// Retrieves a credential by its ID.
    pub fn get_credential(&self, id: &str) -> Option<&IssuedCredential> {
        self.credentials.get(id)
    }

    /// Returns the number of stored credentials.
    pub fn count_credentials(&self) -> usize {
        self.credentials.len()
    }

    /// Checks if a credential with the specified ID exists in storage.
    pub fn contains_credential(&self, id: &str) -> bool {
        self.credentials.contains_key(id)
    }

    /// Removes a credential from storage by its ID.
    ///
    /// # Returns
    /// `true` if the credential was present and removed.
    ///
    /// # Security Note
    /// Does not perform cryptographic shredding of memory.
    pub fn remove_credential(&mut self, id: &str) -> bool {
        self.credentials.remove(id).is_some()
    }

    /// Drops the cleartext of one field in one credential.
    ///
    /// # Arguments
    /// * `id` - Credential identifier
    /// * `path` - Field path, e.g. `offerAc[0].company`
    ///
    /// # Returns
    /// `true` if both the credential and the field exist.
    pub fn discard_cleartext(&mut self, id: &str, path: &str) -> bool {
        self.credentials
            .get_mut(id)
            .map(|credential| credential.credential_subject.discard_cleartext(path))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::credential::{
        BoundField, Commitment, CredentialSubject, DelegationBinding, EddsaSignature,
    };
    use crate::models::field::FieldElement;

    fn create_test_credential(id: &str) -> IssuedCredential {
        let zero = FieldElement::zero();
        let signature = EddsaSignature { r8x: zero, r8y: zero, s: zero };
        IssuedCredential {
            id: id.to_string(),
            issuer: "did:key:issuer".into(),
            issuance_date: "2026-01-01T00:00:00Z".into(),
            types: vec!["VerifiableCredential".into(), "ZKAccess".into()],
            credential_subject: CredentialSubject {
                id: "urn:uuid:holder".into(),
                fields: vec![BoundField {
                    path: "offerAc[0].company".into(),
                    value: Some("Acme".into()),
                    commitment: Commitment { hash: zero, signature },
                }],
            },
            delegation: DelegationBinding {
                did: "did:key:issuer".into(),
                signer_x: zero,
                signer_y: zero,
                signature,
            },
            jwt: None,
        }
    }

    #[test]
    fn test_contains_credential() {
        let mut storage = CredentialStorage::new();
        let credential_id = "urn:uuid:offer-credential";

        assert!(!storage.contains_credential(credential_id));

        let stored = storage.store_credential(create_test_credential(credential_id));
        assert_eq!(stored, credential_id);
        assert!(storage.contains_credential(credential_id));
    }

    #[test]
    fn test_remove_credential() {
        let mut storage = CredentialStorage::new();
        let credential_id = "temporary-access-pass";

        storage.store_credential(create_test_credential(credential_id));

        assert!(storage.remove_credential(credential_id));
        assert!(!storage.contains_credential(credential_id));
        assert_eq!(storage.count_credentials(), 0);
        assert!(!storage.remove_credential("non-existent-id"));
        assert!(storage.get_credential(credential_id).is_none());
    }

    #[test]
    fn test_count_after_operations() {
        let mut storage = CredentialStorage::new();

        storage.store_credential(create_test_credential("id1"));
        storage.store_credential(create_test_credential("id2"));
        assert_eq!(storage.count_credentials(), 2);

        storage.remove_credential("id1");
        assert_eq!(storage.count_credentials(), 1);

        // same id overwrites
        storage.store_credential(create_test_credential("id2"));
        assert_eq!(storage.count_credentials(), 1);
    }

    #[test]
    fn test_discard_cleartext_keeps_commitment() {
        let mut storage = CredentialStorage::new();
        storage.store_credential(create_test_credential("id1"));

        assert!(storage.discard_cleartext("id1", "credentialSubject.offerAc[0].company"));
        let field = storage
            .get_credential("id1")
            .and_then(|c| c.credential_subject.resolve("offerAc[0].company"))
            .unwrap();
        assert_eq!(field.value, None);
        assert_eq!(field.commitment.hash, FieldElement::zero());

        assert!(!storage.discard_cleartext("id1", "offerAc[0].offer"));
        assert!(!storage.discard_cleartext("missing", "offerAc[0].company"));
    }
}
