// src/zkp/witness_builder.rs
//! Rule engine: turns holder rules into circuit input arrays.
//!
//! For rule `i` the builder fills slot `i` of every array:
//!
//! | Array | Content |
//! |-------|---------|
//! | `values` | encoded cleartext of the resolved field |
//! | `keys` | encoded field path |
//! | `hashes` | issuer commitment `Poseidon(keys[i], values[i])` |
//! | `compared_values` | encoded rule operand |
//! | `operations` | operator code (`=` 1, `>` 2, `<` 3) |
//! | `signature_*` | issuer signature over `hashes[i]` |
//!
//! `signer_x`/`signer_y` carry the delegated issuer key, which must be the
//! trusted issuer key the caller pins. The circuit checks each signature over
//! the hash, so a holder cannot substitute a value the issuer never signed.

use crate::error::{CryptoOperationError, InputValidationError, Result};
use crate::models::circuit::CircuitInputs;
use crate::models::credential::{BoundField, CredentialSubject, DelegationBinding, PublicKey};
use crate::models::field::FieldElement;
use crate::models::rule::{Rule, MAX_RULES};
use crate::utils::crypto::{encode_attribute, hash_attribute, hash_string};
use crate::utils::parallel::map_ordered;
use crate::wallet::key_management::{public_key_hex, EddsaSigner};
use log::{debug, info, warn};

/// A rule resolved against the credential, with its cleartext.
struct ResolvedRule<'a> {
    rule: &'a Rule,
    field: &'a BoundField,
    cleartext: &'a str,
}

/// Resolves each rule and evaluates it on the cleartext. No cryptography.
fn resolve<'a>(
    subject: &'a CredentialSubject,
    rules: &'a [Rule],
) -> std::result::Result<Vec<ResolvedRule<'a>>, InputValidationError> {
    if rules.is_empty() {
        return Err(InputValidationError::EmptyRuleSet);
    }
    if rules.len() > MAX_RULES {
        return Err(InputValidationError::TooManyRules {
            count: rules.len(),
            max: MAX_RULES,
        });
    }

    rules
        .iter()
        .map(|rule| {
            let field = subject
                .resolve(&rule.key)
                .ok_or_else(|| InputValidationError::UnknownField(rule.key.clone()))?;
            let cleartext = field
                .value
                .as_deref()
                .ok_or_else(|| InputValidationError::MissingValue(field.path.clone()))?;
            if !rule.holds_for(cleartext)? {
                return Err(InputValidationError::PredicateUnsatisfied(field.path.clone()));
            }
            Ok(ResolvedRule { rule, field, cleartext })
        })
        .collect()
}

/// Checks the delegation signature over the signer's public-key hex.
pub fn verify_delegation(
    delegation: &DelegationBinding,
) -> std::result::Result<(), CryptoOperationError> {
    let key = delegation.public_key();
    let message = hash_string(&public_key_hex(&key)?);
    if EddsaSigner::verify(&message, &delegation.signature, &key) {
        Ok(())
    } else {
        Err(CryptoOperationError::DelegationMismatch(delegation.did.clone()))
    }
}

/// Checks one field's commitment against its cleartext and the issuer signature.
pub fn verify_field(
    field: &BoundField,
    cleartext: &str,
    delegation: &DelegationBinding,
) -> std::result::Result<(), CryptoOperationError> {
    if hash_attribute(&field.path, cleartext) != field.commitment.hash {
        return Err(CryptoOperationError::CommitmentMismatch(field.path.clone()));
    }
    let commitment = &field.commitment;
    if !EddsaSigner::verify(&commitment.hash, &commitment.signature, &delegation.public_key()) {
        return Err(CryptoOperationError::SignatureMismatch(field.path.clone()));
    }
    Ok(())
}

/// Builds circuit inputs for up to [`MAX_RULES`] rules.
///
/// # Errors
/// Input errors (`EmptyRuleSet`, `TooManyRules`, `UnknownField`,
/// `MissingValue`, `NonNumericComparison`, `PredicateUnsatisfied`) come first;
/// then `DelegationMismatch` (also when the delegated key is not `issuer`),
/// `CommitmentMismatch` or `SignatureMismatch`.
pub fn build_inputs(
    subject: &CredentialSubject,
    delegation: &DelegationBinding,
    rules: &[Rule],
    issuer: &PublicKey,
) -> Result<CircuitInputs> {
    let resolved = resolve(subject, rules)?;

    if delegation.public_key() != *issuer {
        warn!("Delegation for {} names a key other than the trusted issuer", delegation.did);
        return Err(CryptoOperationError::DelegationMismatch(delegation.did.clone()).into());
    }
    verify_delegation(delegation)?;
    let checks = map_ordered(&resolved, |r| verify_field(r.field, r.cleartext, delegation));
    for check in checks {
        check?;
    }

    let mut inputs = CircuitInputs {
        signer_x: delegation.signer_x,
        signer_y: delegation.signer_y,
        ..Default::default()
    };
    for r in &resolved {
        debug!("Rule `{}` on {}", r.rule.operator, r.field.path);
        let signature = r.field.commitment.signature;
        inputs.values.push(encode_attribute(r.cleartext));
        inputs.keys.push(encode_attribute(&r.field.path));
        inputs.hashes.push(r.field.commitment.hash);
        inputs.compared_values.push(encode_attribute(&r.rule.value));
        inputs.operations.push(FieldElement::from(r.rule.operator.code()));
        inputs.signature_r8x.push(signature.r8x);
        inputs.signature_r8y.push(signature.r8y);
        inputs.signature_s.push(signature.s);
    }

    info!("Built circuit inputs for {} rules", inputs.len());
    Ok(inputs)
}
