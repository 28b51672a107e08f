// src/wallet/zkp_generation.rs
//! Access-proof generation for held credentials.
//!
//! The holder picks a stored credential and a rule set; the wallet resolves
//! the rules against the credential, builds the circuit inputs and drives
//! the external prover. Nothing leaves the wallet except the proof.

use crate::error::{InputValidationError, Result};
use crate::models::circuit::ExternalProof;
use crate::models::rule::Rule;
use crate::wallet::credential_storage::CredentialStorage;
use crate::zkp::proof_generation::ProofDriver;
use crate::zkp::witness_builder::build_inputs;
use log::info;

/// Holder-side wallet: credential store plus proof driver.
pub struct HolderWallet {
    pub storage: CredentialStorage,
    driver: ProofDriver,
}

impl HolderWallet {
    pub fn new(storage: CredentialStorage, driver: ProofDriver) -> Self {
        Self { storage, driver }
    }

    /// Generates a zero-knowledge proof that a stored credential satisfies `rules`.
    ///
    /// # Arguments
    /// * `credential_id` - Id of a credential in the wallet
    /// * `rules` - One to ten predicates over the credential's fields
    ///
    /// # Returns
    /// The proof as returned by the prover
    ///
    /// # Errors
    /// - `UnknownField("credential")` if no credential has that id
    /// - Rule and binding errors from the witness builder, including
    ///   `DelegationMismatch` for credentials not signed by the driver's issuer
    /// - `ProofGenerationFailed` from the driver
    pub async fn build_and_prove(
        &self,
        credential_id: &str,
        rules: &[Rule],
    ) -> Result<ExternalProof> {
        let credential = self.storage.get_credential(credential_id).ok_or_else(|| {
            InputValidationError::UnknownField(format!("credential {}", credential_id))
        })?;

        let inputs = build_inputs(
            &credential.credential_subject,
            &credential.delegation,
            rules,
            self.driver.issuer(),
        )?;
        let proof = self.driver.generate(&inputs).await?;
        info!("Proved {} rules over credential {}", rules.len(), credential_id);
        Ok(proof)
    }
}
