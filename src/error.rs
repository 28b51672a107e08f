// src/error.rs
//! Error taxonomy for credential binding, proof intake and proving.
//!
//! Errors are grouped by who has to act on them:
//! - [`InputValidationError`]: the caller sent something malformed; no cryptographic work was done
//! - [`CryptoOperationError`]: a key, signature or commitment did not check out
//! - [`ExternalServiceError`]: a trust-boundary service (blueprint verifier, agent, prover) failed
//! - [`ArtifactError`]: the compiled circuit does not match the input layout this crate builds
//!
//! Fraudulent proofs during intake are *not* errors; see
//! [`ValidationOutcome`](crate::services::combined_proof::ValidationOutcome).

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error returned by every public operation.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    InputValidation(#[from] InputValidationError),

    #[error(transparent)]
    Crypto(#[from] CryptoOperationError),

    #[error(transparent)]
    ExternalService(#[from] ExternalServiceError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),
}

/// Rejected before any hashing, signing or proving takes place.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputValidationError {
    #[error("missing required field `{0}`")]
    MissingRequiredField(String),

    #[error("unknown field `{0}`")]
    UnknownField(String),

    #[error("field `{0}` must be a string, number or boolean")]
    NonScalarValue(String),

    #[error("field `{0}` has no cleartext value to prove against")]
    MissingValue(String),

    #[error("too many rules: {count} (at most {max} per proof)")]
    TooManyRules { count: usize, max: usize },

    #[error("a proof request needs at least one rule")]
    EmptyRuleSet,

    #[error("unsupported operator `{0}`")]
    UnknownOperator(String),

    #[error("field `{field}` cannot be compared numerically: `{value}` is not an unsigned integer")]
    NonNumericComparison { field: String, value: String },

    #[error("rule on `{0}` is not satisfied by the credential")]
    PredicateUnsatisfied(String),

    #[error("malformed field element `{0}`")]
    MalformedFieldElement(String),

    #[error("malformed proof encoding: {0}")]
    MalformedProofEncoding(String),

    #[error("circuit input `{name}` has {actual} entries, circuit accepts at most {capacity}")]
    InputShape { name: String, actual: usize, capacity: usize },
}

impl InputValidationError {
    /// The offending field or path, when the error is about one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingRequiredField(f)
            | Self::UnknownField(f)
            | Self::NonScalarValue(f)
            | Self::MissingValue(f)
            | Self::PredicateUnsatisfied(f) => Some(f),
            Self::NonNumericComparison { field, .. } => Some(field),
            Self::InputShape { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Key, signature or commitment failures. Never swallowed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoOperationError {
    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("signature over `{0}` does not verify under the issuer key")]
    SignatureMismatch(String),

    #[error("commitment for `{0}` does not match its cleartext value")]
    CommitmentMismatch(String),

    #[error("delegation signature for `{0}` does not verify")]
    DelegationMismatch(String),

    #[error("point ({x}, {y}) is not a valid BabyJubJub subgroup point")]
    InvalidPoint { x: String, y: String },

    #[error("signer ({x}, {y}) is not the trusted issuer key")]
    UntrustedSigner { x: String, y: String },
}

/// Failures of the services this crate calls into.
#[derive(Debug, Error)]
pub enum ExternalServiceError {
    #[error("{service} unreachable: {source}")]
    Unreachable {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} answered {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} returned an undecodable response: {reason}")]
    Decode { service: &'static str, reason: String },

    #[error("proof generation failed: {0}")]
    ProofGenerationFailed(String),

    #[error("proof verification failed: {0}")]
    ProofVerificationFailed(String),

    #[error("mail spool `{path}` unavailable: {source}")]
    Spool {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// The compiled circuit artifact cannot be used.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("cannot read circuit artifact `{path}`: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse circuit artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("circuit artifact does not match layout {layout}: {reason}")]
    Layout { layout: &'static str, reason: String },
}
