// src/zkp/proof_generation.rs
//! Proof generation against the compiled access circuit.
//!
//! The circuit is an external artifact (Noir ACIR JSON). Its ABI pins the
//! names, order and capacity of every input; [`CircuitArtifact::layout`]
//! checks it against the layout this crate builds before any proving happens.
//!
//! ## Flow
//! 1. Pad the builder's N-entry arrays to the circuit capacity with `"0"`
//! 2. Execute the circuit on the prover backend to obtain a witness
//! 3. Prove the witness with keccak public-input hashing
//!
//! `signer_x` and `signer_y` are public inputs. The driver is pinned to one
//! trusted issuer key: it refuses to prove for any other signer and reports
//! proofs carrying another signer as invalid.
//!
//! Each backend call is bounded by a timeout. Nothing is retried.

use crate::backends::ProverBackend;
use crate::error::{
    ArtifactError, CryptoOperationError, ExternalServiceError, InputValidationError, Result,
};
use crate::models::circuit::{
    CircuitInputs, ExternalProof, ProofOptions, ARRAY_INPUTS, SCALAR_INPUTS,
};
use crate::models::credential::PublicKey;
use crate::models::field::FieldElement;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Identifier of the input layout built by the witness builder.
pub const CIRCUIT_LAYOUT: &str = "zkaccess-circuit/v1";

/// Compiled circuit as emitted by the Noir toolchain.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CircuitArtifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noir_version: Option<String>,
    pub abi: CircuitAbi,
    /// Base64 gzip-compressed ACIR; passed through to the backend untouched.
    pub bytecode: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CircuitAbi {
    pub parameters: Vec<AbiParameter>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AbiParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: AbiType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
}

/// Subset of Noir ABI types relevant to the access circuit.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AbiType {
    Field,
    Integer {
        sign: String,
        width: u32,
    },
    Boolean,
    Array {
        length: usize,
        #[serde(rename = "type")]
        element: Box<AbiType>,
    },
    #[serde(other)]
    Unsupported,
}

impl AbiType {
    fn is_numeric(&self) -> bool {
        matches!(self, AbiType::Field | AbiType::Integer { .. })
    }

    /// Number of field elements the type occupies once flattened.
    fn flattened_len(&self) -> usize {
        match self {
            AbiType::Array { length, element } => length * element.flattened_len(),
            _ => 1,
        }
    }
}

impl AbiParameter {
    fn is_public(&self) -> bool {
        self.visibility.as_deref() == Some("public")
    }
}

/// Input capacity and public-input positions derived from a validated artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitLayout {
    /// Length shared by every array input; the maximum number of rules.
    pub capacity: usize,
    /// Indices of `signer_x` and `signer_y` in the flattened public inputs.
    pub signer_offsets: (usize, usize),
}

impl CircuitArtifact {
    /// Reads and parses an artifact file.
    pub fn load(path: impl AsRef<Path>) -> std::result::Result<Self, ArtifactError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ArtifactError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn parameter(&self, name: &str) -> Option<&AbiParameter> {
        self.abi.parameters.iter().find(|p| p.name == name)
    }

    /// Index of a public parameter in the flattened public inputs.
    fn public_offset(&self, name: &str) -> Option<usize> {
        let mut offset = 0;
        for parameter in self.abi.parameters.iter().filter(|p| p.is_public()) {
            if parameter.name == name {
                return Some(offset);
            }
            offset += parameter.ty.flattened_len();
        }
        None
    }

    /// Checks the ABI declares exactly the inputs of [`CIRCUIT_LAYOUT`].
    ///
    /// Arrays must share one non-zero length of numeric elements; `signer_x`
    /// and `signer_y` must be public numeric scalars.
    pub fn layout(&self) -> std::result::Result<CircuitLayout, ArtifactError> {
        let mismatch = |reason: String| ArtifactError::Layout {
            layout: CIRCUIT_LAYOUT,
            reason,
        };

        let expected = ARRAY_INPUTS.len() + SCALAR_INPUTS.len();
        if self.abi.parameters.len() != expected {
            let names: Vec<&str> = self.abi.parameters.iter().map(|p| p.name.as_str()).collect();
            return Err(mismatch(format!(
                "expected {} inputs, artifact declares {}: {:?}",
                expected,
                names.len(),
                names
            )));
        }

        let mut capacity = None;
        for name in ARRAY_INPUTS {
            let parameter = self
                .parameter(name)
                .ok_or_else(|| mismatch(format!("missing input `{}`", name)))?;
            match &parameter.ty {
                AbiType::Array { length, element } if element.is_numeric() && *length > 0 => {
                    match capacity {
                        None => capacity = Some(*length),
                        Some(c) if c == *length => {}
                        Some(c) => {
                            return Err(mismatch(format!(
                                "input `{}` has length {}, other arrays have {}",
                                name, length, c
                            )))
                        }
                    }
                }
                other => {
                    return Err(mismatch(format!(
                        "input `{}` is not a numeric array: {:?}",
                        name, other
                    )))
                }
            }
        }

        for name in SCALAR_INPUTS {
            let parameter = self
                .parameter(name)
                .ok_or_else(|| mismatch(format!("missing input `{}`", name)))?;
            if !parameter.ty.is_numeric() {
                return Err(mismatch(format!(
                    "input `{}` is not a field: {:?}",
                    name, parameter.ty
                )));
            }
        }

        let capacity = capacity.ok_or_else(|| mismatch("no array inputs".into()))?;
        let offset = |name: &str| {
            self.public_offset(name)
                .ok_or_else(|| mismatch(format!("input `{}` is not public", name)))
        };
        Ok(CircuitLayout {
            capacity,
            signer_offsets: (offset(SCALAR_INPUTS[0])?, offset(SCALAR_INPUTS[1])?),
        })
    }
}

/// Builds the named input map, padding every array to `capacity` with `"0"`.
///
/// # Errors
/// `InputShape` when an array is longer than the circuit accepts or the
/// arrays disagree on their length.
pub fn padded_inputs(
    inputs: &CircuitInputs,
    capacity: usize,
) -> std::result::Result<Map<String, Value>, InputValidationError> {
    let n = inputs.len();
    let mut map = Map::new();

    for (name, values) in inputs.arrays() {
        if values.len() != n || values.len() > capacity {
            return Err(InputValidationError::InputShape {
                name: name.to_string(),
                actual: values.len(),
                capacity: if values.len() > capacity { capacity } else { n },
            });
        }
        let padded: Vec<Value> = values
            .iter()
            .map(FieldElement::to_canonical_string)
            .chain(std::iter::repeat_with(|| "0".to_string()).take(capacity - n))
            .map(Value::String)
            .collect();
        map.insert(name.to_string(), Value::Array(padded));
    }

    for (name, value) in inputs.scalars() {
        map.insert(name.to_string(), Value::String(value.to_canonical_string()));
    }
    Ok(map)
}

/// Drives the external prover and verifier for one compiled circuit.
#[derive(Clone)]
pub struct ProofDriver {
    pub(crate) backend: Arc<dyn ProverBackend>,
    pub(crate) artifact: Arc<CircuitArtifact>,
    pub(crate) layout: CircuitLayout,
    pub(crate) options: ProofOptions,
    pub(crate) timeout: Duration,
    pub(crate) issuer: PublicKey,
}

impl ProofDriver {
    /// Creates a driver after validating the artifact layout.
    ///
    /// # Arguments
    /// * `backend` - Execution and proving backend
    /// * `artifact` - Compiled circuit, read once
    /// * `options` - Forwarded to the prover and verifier (`keccak`)
    /// * `timeout` - Bound on each backend call
    /// * `issuer` - The only signer key proofs may be generated or accepted for
    pub fn new(
        backend: Arc<dyn ProverBackend>,
        artifact: CircuitArtifact,
        options: ProofOptions,
        timeout: Duration,
        issuer: PublicKey,
    ) -> Result<Self> {
        let layout = artifact.layout()?;
        Ok(Self {
            backend,
            artifact: Arc::new(artifact),
            layout,
            options,
            timeout,
            issuer,
        })
    }

    pub fn capacity(&self) -> usize {
        self.layout.capacity
    }

    /// The pinned issuer key.
    pub fn issuer(&self) -> &PublicKey {
        &self.issuer
    }

    /// Executes the circuit on `inputs` and proves the resulting witness.
    ///
    /// # Errors
    /// - `UntrustedSigner` when the inputs carry a signer other than the pinned issuer
    /// - `InputShape` when `inputs` does not fit the circuit
    /// - `ProofGenerationFailed` for any execution or proving failure, timeouts included
    pub async fn generate(&self, inputs: &CircuitInputs) -> Result<ExternalProof> {
        if inputs.signer_x != self.issuer.signer_x || inputs.signer_y != self.issuer.signer_y {
            return Err(CryptoOperationError::UntrustedSigner {
                x: inputs.signer_x.to_string(),
                y: inputs.signer_y.to_string(),
            }
            .into());
        }
        let map = padded_inputs(inputs, self.layout.capacity)?;
        debug!(
            "Executing circuit with {} of {} rule slots",
            inputs.len(),
            self.layout.capacity
        );

        let witness = self
            .bounded("execution", self.backend.execute(&self.artifact, &map), generation_failed)
            .await?;
        let proof = self
            .bounded(
                "proving",
                self.backend.generate_proof(&self.artifact, &witness, self.options),
                generation_failed,
            )
            .await?;

        if proof.proof.is_empty() {
            let reason = "prover returned an empty proof".to_string();
            return Err(ExternalServiceError::ProofGenerationFailed(reason).into());
        }
        info!(
            "Generated proof ({} bytes, {} public inputs)",
            proof.proof.len(),
            proof.public_inputs.len()
        );
        Ok(proof)
    }

    /// Runs one backend call under the driver timeout, folding failures into `wrap`.
    pub(crate) async fn bounded<T, F>(
        &self,
        stage: &str,
        call: F,
        wrap: fn(String) -> ExternalServiceError,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!("Circuit {} failed: {}", stage, e);
                Err(wrap(format!("{}: {}", stage, e)).into())
            }
            Err(_) => {
                warn!("Circuit {} timed out after {:?}", stage, self.timeout);
                Err(wrap(format!("{} timed out after {:?}", stage, self.timeout)).into())
            }
        }
    }
}

fn generation_failed(reason: String) -> ExternalServiceError {
    ExternalServiceError::ProofGenerationFailed(reason)
}
