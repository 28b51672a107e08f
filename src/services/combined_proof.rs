// src/services/combined_proof.rs
//! Combined proof intake.
//!
//! Cross-validates a batch of zk-email offer proofs and a passport disclosure
//! and merges them into one [`CandidateSubject`] ready for binding.
//!
//! ```text
//! Pending ─► EmailVerified ─► DomainChecked ─► Merged
//!    │             │
//!    └─────────────┴──────────► Rejected
//! ```
//!
//! A fraudulent proof is a [`ValidationOutcome::Rejected`] value, never an
//! `Err`; `Err` is reserved for an unavailable verifier.

use crate::backends::{BlueprintVerifier, EmailPublicData};
use crate::error::{Error, Result};
use crate::models::attribute::{
    CandidateSubject, EmploymentOfferSubject, IdentitySubject, OfferRecord, SubjectVariant,
};
use crate::services::subject_parser::parse_subject;
use futures::future::try_join_all;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Intake states.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationState {
    Pending,
    EmailVerified,
    DomainChecked,
    Merged,
    Rejected,
}

/// Why a batch was rejected.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    InvalidEmailProof,
    InvalidDomain,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::InvalidEmailProof => f.write_str("Invalid zkEmail proof"),
            RejectionReason::InvalidDomain => {
                f.write_str("Sender domain does not match organization")
            }
        }
    }
}

/// Terminal result of [`CombinedProofValidator::validate`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Merged(CandidateSubject),
    Rejected { reason: RejectionReason, detail: String },
}

impl ValidationOutcome {
    pub fn state(&self) -> ValidationState {
        match self {
            ValidationOutcome::Merged(_) => ValidationState::Merged,
            ValidationOutcome::Rejected { .. } => ValidationState::Rejected,
        }
    }

    fn rejected(reason: RejectionReason, detail: String) -> Self {
        warn!("Intake rejected: {} ({})", reason, detail);
        ValidationOutcome::Rejected { reason, detail }
    }
}

/// Proofs submitted for one issuance.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CombinedProofRequest {
    pub zk_email_proofs: Vec<Value>,
    /// Disclosed passport fields; read with [`IdentitySubject::from_disclosure`]
    pub zk_passport_proof: Map<String, Value>,
    /// Overrides the configured recipient for every offer record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_recipient: Option<String>,
}

/// Intake policy, taken from the `validation` settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationPolicy {
    pub require_domain_match: bool,
    pub email_recipient: String,
}

pub struct CombinedProofValidator {
    verifier: Arc<dyn BlueprintVerifier>,
    policy: ValidationPolicy,
}

/// Early exit from the concurrent verification stage.
enum Halt {
    Invalid(usize),
    Failed(Error),
}

impl CombinedProofValidator {
    pub fn new(verifier: Arc<dyn BlueprintVerifier>, policy: ValidationPolicy) -> Self {
        Self { verifier, policy }
    }

    /// Runs the intake state machine over one request.
    ///
    /// # Returns
    /// - `Ok(Merged)` with identity fields first, then offers in proof order
    /// - `Ok(Rejected)` on the first invalid proof or a domain mismatch
    /// - `Err(InputValidation)` when the passport disclosure lacks a field,
    ///   before any proof is verified
    /// - `Err` when the blueprint verifier cannot be reached
    pub async fn validate(&self, request: &CombinedProofRequest) -> Result<ValidationOutcome> {
        let identity = IdentitySubject::from_disclosure(&request.zk_passport_proof)?;
        let mut state = ValidationState::Pending;
        debug!("Intake {:?}: {} email proofs", state, request.zk_email_proofs.len());

        // every proof is checked concurrently; the first failure drops the rest
        let checks = request
            .zk_email_proofs
            .iter()
            .enumerate()
            .map(|(index, proof)| async move {
                match self.verifier.verify_proof(proof).await {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(Halt::Invalid(index)),
                    Err(e) => Err(Halt::Failed(e)),
                }
            });
        match try_join_all(checks).await {
            Ok(_) => {}
            Err(Halt::Invalid(index)) => {
                return Ok(ValidationOutcome::rejected(
                    RejectionReason::InvalidEmailProof,
                    format!("email proof #{} failed blueprint verification", index),
                ))
            }
            Err(Halt::Failed(e)) => return Err(e),
        }
        state = transition(state, ValidationState::EmailVerified);

        let captured_at = chrono::Utc::now().timestamp().to_string();
        let recipient = request
            .email_recipient
            .clone()
            .unwrap_or_else(|| self.policy.email_recipient.clone());

        let mut offers = Vec::with_capacity(request.zk_email_proofs.len());
        for (index, proof) in request.zk_email_proofs.iter().enumerate() {
            let data = self.verifier.public_data(proof);
            let parsed = parse_subject(data.first_subject());

            if self.policy.require_domain_match {
                if let Err(detail) = check_domain(&data, parsed.organization_claim()) {
                    return Ok(ValidationOutcome::rejected(
                        RejectionReason::InvalidDomain,
                        format!("email proof #{}: {}", index, detail),
                    ));
                }
            }

            offers.push(OfferRecord {
                index,
                email_sender: data.first_sender().to_string(),
                offer: parsed.offer().to_string(),
                currency: parsed.currency().to_string(),
                company: parsed.company().to_string(),
                email_recipient: recipient.clone(),
                email_timestamp: data
                    .first_timestamp()
                    .map(str::to_string)
                    .unwrap_or_else(|| captured_at.clone()),
            });
        }
        if !self.policy.require_domain_match {
            debug!("Domain check disabled");
        }
        state = transition(state, ValidationState::DomainChecked);

        let candidate = CandidateSubject {
            variants: vec![
                SubjectVariant::Identity(identity),
                SubjectVariant::EmploymentOffer(EmploymentOfferSubject { offers }),
            ],
        };
        transition(state, ValidationState::Merged);
        Ok(ValidationOutcome::Merged(candidate))
    }
}

fn transition(from: ValidationState, to: ValidationState) -> ValidationState {
    info!("Intake {:?} -> {:?}", from, to);
    to
}

fn normalize(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).flat_map(char::to_lowercase).collect()
}

/// Resolves the sender domain from `sender_domain`, or from the part of
/// `email_sender` after `@`. When both exist they must agree.
pub fn sender_domain(data: &EmailPublicData) -> std::result::Result<String, String> {
    let declared = normalize(data.first_domain());
    let derived = data
        .first_sender()
        .rsplit_once('@')
        .map(|(_, domain)| normalize(domain.trim_end_matches('>')))
        .unwrap_or_default();

    match (declared.is_empty(), derived.is_empty()) {
        (true, true) => Err("proof discloses no sender domain".into()),
        (false, true) => Ok(declared),
        (true, false) => Ok(derived),
        (false, false) if declared == derived => Ok(declared),
        (false, false) => Err(format!(
            "sender `{}` does not belong to domain `{}`",
            derived, declared
        )),
    }
}

/// Whether `claim` names `domain`: equal, or equal to its leftmost label.
pub fn domain_matches(domain: &str, claim: &str) -> bool {
    let domain = normalize(domain);
    let claim = normalize(claim);
    if domain.is_empty() || claim.is_empty() {
        return false;
    }
    claim == domain || domain.split('.').next() == Some(claim.as_str())
}

fn check_domain(data: &EmailPublicData, claim: &str) -> std::result::Result<(), String> {
    let domain = sender_domain(data)?;
    if domain_matches(&domain, claim) {
        Ok(())
    } else if claim.is_empty() {
        Err(format!("no organization claimed for domain `{}`", domain))
    } else {
        Err(format!("domain `{}` does not match organization `{}`", domain, claim))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExternalServiceError, InputValidationError};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reads validity from the proof itself: `{"valid": bool, "hang": bool, "down": bool}`.
    #[derive(Default)]
    struct ScriptedVerifier {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BlueprintVerifier for ScriptedVerifier {
        async fn verify_proof(&self, proof: &Value) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if proof["hang"] == json!(true) {
                futures::future::pending::<()>().await;
            }
            if proof["down"] == json!(true) {
                return Err(ExternalServiceError::Status {
                    service: "blueprint",
                    status: 503,
                    body: "unavailable".into(),
                }
                .into());
            }
            Ok(proof["valid"] == json!(true))
        }
    }

    fn email(valid: bool, subject: &str, sender: &str) -> Value {
        json!({
            "valid": valid,
            "props": {"publicData": {"subject": [subject], "email_sender": [sender]}}
        })
    }

    fn passport() -> Map<String, Value> {
        let disclosed = json!({
            "firstname": "John",
            "lastname": "Doe",
            "birthdate": "19900101",
            "nationality": "ARG",
            "documentType": "passport",
            "documentNumber": "AA123456"
        });
        disclosed.as_object().unwrap().clone()
    }

    fn request(proofs: Vec<Value>) -> CombinedProofRequest {
        CombinedProofRequest {
            zk_email_proofs: proofs,
            zk_passport_proof: passport(),
            email_recipient: None,
        }
    }

    fn validator(require_domain_match: bool) -> CombinedProofValidator {
        CombinedProofValidator::new(
            Arc::new(ScriptedVerifier::default()),
            ValidationPolicy {
                require_domain_match,
                email_recipient: "holder@example.com".into(),
            },
        )
    }

    #[tokio::test]
    async fn valid_batch_merges_identity_and_offers() {
        let outcome = validator(false)
            .validate(&request(vec![
                email(true, "offer=1000000; currency=USD; company=Acme", "hr@acme.com"),
                email(true, ". offer=2000; currency=EUR; company=Globex", "jobs@globex.io"),
            ]))
            .await
            .unwrap();

        let ValidationOutcome::Merged(candidate) = outcome else {
            panic!("expected merge");
        };
        let SubjectVariant::EmploymentOffer(offers) = &candidate.variants[1] else {
            panic!("expected offers");
        };
        assert_eq!(offers.offers.len(), 2);
        assert_eq!(offers.offers[0].offer, "1000000");
        assert_eq!(offers.offers[1].index, 1);
        assert_eq!(offers.offers[1].company, "Globex");
        assert_eq!(offers.offers[1].email_sender, "jobs@globex.io");
        assert_eq!(offers.offers[0].email_recipient, "holder@example.com");
        assert!(offers.offers[0].email_timestamp.parse::<i64>().unwrap() > 1_600_000_000);
        let identity = IdentitySubject::from_disclosure(&passport()).unwrap();
        assert_eq!(candidate.variants[0], SubjectVariant::Identity(identity));
    }

    #[tokio::test]
    async fn numeric_passport_fields_are_stringified() {
        let mut req = request(vec![email(true, "offer=1", "a@acme.com")]);
        req.zk_passport_proof.insert("birthdate".into(), json!(19900101));

        let ValidationOutcome::Merged(candidate) = validator(false).validate(&req).await.unwrap()
        else {
            panic!("expected merge");
        };
        let SubjectVariant::Identity(identity) = &candidate.variants[0] else {
            panic!("expected identity");
        };
        assert_eq!(identity.birthdate, "19900101");
    }

    #[tokio::test]
    async fn incomplete_passport_fails_before_any_verification() {
        let verifier = Arc::new(ScriptedVerifier::default());
        let validator = CombinedProofValidator::new(verifier.clone(), ValidationPolicy::default());
        let mut req = request(vec![email(true, "offer=1", "a@acme.com")]);
        req.zk_passport_proof.remove("documentType");

        let err = validator.validate(&req).await.unwrap_err();
        assert!(matches!(
            err,
            Error::InputValidation(InputValidationError::MissingRequiredField(field))
                if field == "documentType"
        ));
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn request_reads_loose_passport_json() {
        let req: CombinedProofRequest = serde_json::from_value(json!({
            "zkEmailProofs": [],
            "zkPassportProof": {"firstname": "John", "birthdate": 19900101}
        }))
        .unwrap();
        assert_eq!(req.zk_passport_proof["birthdate"], json!(19900101));
    }

    #[tokio::test]
    async fn second_of_three_invalid_rejects_whole_batch() {
        let outcome = validator(false)
            .validate(&request(vec![
                email(true, "offer=1", "a@acme.com"),
                email(false, "offer=2", "b@acme.com"),
                email(true, "offer=3", "c@acme.com"),
            ]))
            .await
            .unwrap();
        assert_eq!(outcome.state(), ValidationState::Rejected);
        assert!(matches!(
            outcome,
            ValidationOutcome::Rejected { reason: RejectionReason::InvalidEmailProof, .. }
        ));
    }

    #[tokio::test]
    async fn rejection_does_not_wait_for_pending_checks() {
        let mut stalled = email(true, "offer=3", "c@acme.com");
        stalled["hang"] = json!(true);
        let outcome = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            validator(false)
                .validate(&request(vec![stalled, email(false, "offer=2", "b@acme.com")])),
        )
        .await
        .expect("fail-fast must not wait for the stalled proof")
        .unwrap();
        assert_eq!(outcome.state(), ValidationState::Rejected);
    }

    #[tokio::test]
    async fn unavailable_verifier_is_an_error_not_a_rejection() {
        let mut down = email(true, "offer=1", "a@acme.com");
        down["down"] = json!(true);
        let err = validator(false).validate(&request(vec![down])).await.unwrap_err();
        assert!(matches!(
            err,
            Error::ExternalService(ExternalServiceError::Status { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn proof_timestamp_wins_over_capture_time() {
        let proof = json!({
            "valid": true,
            "props": {"publicData": {
                "subject": ["offer=1"],
                "email_sender": ["a@acme.com"],
                "timestamp": ["1700000000"]
            }}
        });
        let mut req = request(vec![proof]);
        req.email_recipient = Some("other@example.com".into());
        let outcome = validator(false).validate(&req).await.unwrap();
        let ValidationOutcome::Merged(candidate) = outcome else {
            panic!("expected merge");
        };
        let SubjectVariant::EmploymentOffer(offers) = &candidate.variants[1] else {
            panic!("expected offers");
        };
        assert_eq!(offers.offers[0].email_timestamp, "1700000000");
        assert_eq!(offers.offers[0].email_recipient, "other@example.com");
    }

    #[tokio::test]
    async fn domain_mismatch_is_rejected_when_required() {
        let req = request(vec![email(true, "offer=1; company=Globex", "hr@acme.com")]);

        let outcome = validator(true).validate(&req).await.unwrap();
        assert!(matches!(
            outcome,
            ValidationOutcome::Rejected { reason: RejectionReason::InvalidDomain, .. }
        ));

        // same batch passes when the check is off
        let outcome = validator(false).validate(&req).await.unwrap();
        assert_eq!(outcome.state(), ValidationState::Merged);
    }

    #[tokio::test]
    async fn organization_claim_matches_leftmost_label() {
        let req = request(vec![email(true, ". organization=ACME; role=eng", "User@Acme.com")]);
        let outcome = validator(true).validate(&req).await.unwrap();
        assert_eq!(outcome.state(), ValidationState::Merged);
    }

    #[test]
    fn sender_domain_resolution() {
        let both = EmailPublicData {
            email_sender: vec!["hr@acme.com".into()],
            sender_domain: vec!["ACME.com".into()],
            ..Default::default()
        };
        assert_eq!(sender_domain(&both).unwrap(), "acme.com");

        let disagree = EmailPublicData {
            email_sender: vec!["hr@evil.com".into()],
            sender_domain: vec!["acme.com".into()],
            ..Default::default()
        };
        assert!(sender_domain(&disagree).is_err());
        assert!(sender_domain(&EmailPublicData::default()).is_err());
    }

    #[test]
    fn domain_matching_rules() {
        assert!(domain_matches("acme.com", "acme.com"));
        assert!(domain_matches("acme.com", " Acme "));
        assert!(!domain_matches("acme.com", "globex"));
        assert!(!domain_matches("mail.acme.com", "acme"));
        assert!(!domain_matches("acme.com", ""));
    }
}
