// src/wallet/key_management.rs
//! EdDSA key management over BabyJubJub.
//!
//! Provides deterministic key derivation, signing and verification for the
//! issuer's field-signing key:
//! - Commitment signatures (one per credential field)
//! - Delegation signatures (signer key authorized by the issuer DID)
//!
//! Uses the following cryptographic primitives:
//! - BabyJubJub twisted Edwards curve (via `ark-ed-on-bn254`), over the BN254 scalar field
//! - SHA-512 for scalar and nonce derivation (via `sha2`)
//! - Poseidon for the signature challenge (see [`crate::utils::crypto`])

use crate::error::CryptoOperationError;
use crate::models::credential::{EddsaSignature, PublicKey};
use crate::models::field::FieldElement;
use crate::utils::crypto::poseidon_hash;
use ark_bn254::Fr as Bn254Fr;
use ark_ec::{AffineRepr, CurveGroup};
use ark_ed_on_bn254::{EdwardsAffine, Fr as JubFr};
use ark_ff::{BigInteger, PrimeField};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use rand::RngCore;
use sha2::{Digest, Sha512};
use std::fmt;

/// Length of a private key in bytes (64 hex characters).
pub const PRIVATE_KEY_BYTES: usize = 32;

/// Issuer signing key, held only for the duration of one operation.
///
/// The key is supplied per call (environment or CLI flag) and never stored in
/// a long-lived structure.
///
/// # Security Notes
/// - Signing is deterministic: the nonce is derived from the key and message
/// - `Debug` never prints the secret scalar
#[derive(Clone)]
pub struct EddsaSigner {
    /// Secret scalar `s`, reduced mod the subgroup order
    scalar: JubFr,
    /// Nonce-derivation prefix, the upper half of `SHA-512(key)`
    prefix: [u8; 32],
    /// Derived public key `A = s·G`
    public: EdwardsAffine,
}

impl fmt::Debug for EddsaSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EddsaSigner")
            .field("public", &self.public_key())
            .finish_non_exhaustive()
    }
}

impl EddsaSigner {
    /// Parses a hex-encoded private key and derives the signing material.
    ///
    /// # Arguments
    /// * `private_key_hex` - 32 bytes as 64 hex characters, optionally `0x`-prefixed
    ///
    /// # Errors
    /// `InvalidKeyFormat` when the string is not exactly 32 hex-encoded bytes.
    pub fn from_hex(private_key_hex: &str) -> Result<Self, CryptoOperationError> {
        let trimmed = private_key_hex.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        if digits.len() != PRIVATE_KEY_BYTES * 2 {
            return Err(CryptoOperationError::InvalidKeyFormat(format!(
                "expected {} hex characters, got {}",
                PRIVATE_KEY_BYTES * 2,
                digits.len()
            )));
        }
        let key = hex::decode(digits)
            .map_err(|e| CryptoOperationError::InvalidKeyFormat(format!("not hex: {}", e)))?;

        let digest = Sha512::digest(&key);
        let mut lower = [0u8; 32];
        lower.copy_from_slice(&digest[..32]);
        lower[0] &= 0xF8;
        lower[31] &= 0x7F;
        lower[31] |= 0x40;

        let mut prefix = [0u8; 32];
        prefix.copy_from_slice(&digest[32..]);

        let scalar = JubFr::from_le_bytes_mod_order(&lower);
        let public = (EdwardsAffine::generator() * scalar).into_affine();
        Ok(EddsaSigner { scalar, prefix, public })
    }

    /// Generates a fresh random private key, hex-encoded.
    pub fn generate_private_key() -> String {
        let mut key = [0u8; PRIVATE_KEY_BYTES];
        rand::thread_rng().fill_bytes(&mut key);
        hex::encode(key)
    }

    /// Returns the public key as `(signer_x, signer_y)`.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            signer_x: FieldElement(self.public.x),
            signer_y: FieldElement(self.public.y),
        }
    }

    /// Hex encoding of the compressed public key (the delegation message preimage).
    pub fn public_key_hex(&self) -> Result<String, CryptoOperationError> {
        compress(&self.public)
    }

    /// Signs a field-element message.
    ///
    /// # Process Flow
    /// 1. `r = SHA-512(prefix ‖ M) mod l`, `R8 = r·G`
    /// 2. `k = Poseidon(R8x, R8y, Ax, Ay, M)`
    /// 3. `S = r + k·s mod l`
    pub fn sign(&self, message: &FieldElement) -> EddsaSignature {
        let mut hasher = Sha512::new();
        hasher.update(self.prefix);
        hasher.update(message.0.into_bigint().to_bytes_le());
        let r = JubFr::from_le_bytes_mod_order(&hasher.finalize());

        let r8 = (EdwardsAffine::generator() * r).into_affine();
        let k = challenge(&r8, &self.public, message);
        let s = r + k * self.scalar;

        EddsaSignature {
            r8x: FieldElement(r8.x),
            r8y: FieldElement(r8.y),
            s: FieldElement(Bn254Fr::from_le_bytes_mod_order(&s.into_bigint().to_bytes_le())),
        }
    }

    /// Verifies `signature` over `message` under `public_key`.
    ///
    /// Returns `false` for any malformed point, an out-of-range `S`, or a
    /// signature made with a different key.
    pub fn verify(
        message: &FieldElement,
        signature: &EddsaSignature,
        public_key: &PublicKey,
    ) -> bool {
        let a = match public_key_point(public_key) {
            Ok(point) => point,
            Err(_) => return false,
        };
        let r8 = match point(signature.r8x, signature.r8y) {
            Ok(point) => point,
            Err(_) => return false,
        };
        let s = match JubFr::from_bigint(signature.s.0.into_bigint()) {
            Some(s) => s,
            None => return false,
        };

        let k = challenge(&r8, &a, message);
        let lhs = EdwardsAffine::generator() * s;
        let rhs = r8.into_group() + a * k;
        lhs == rhs
    }
}

/// Derives the public key for a hex-encoded private key.
pub fn derive_public_key(private_key_hex: &str) -> Result<PublicKey, CryptoOperationError> {
    Ok(EddsaSigner::from_hex(private_key_hex)?.public_key())
}

/// Checks that `public_key` is a BabyJubJub point in the prime-order subgroup.
pub fn public_key_point(public_key: &PublicKey) -> Result<EdwardsAffine, CryptoOperationError> {
    point(public_key.signer_x, public_key.signer_y)
}

/// Hex encoding of a compressed public key given by its coordinates.
pub fn public_key_hex(public_key: &PublicKey) -> Result<String, CryptoOperationError> {
    compress(&public_key_point(public_key)?)
}

/// Parses a compressed public key hex (as printed by `keygen`), optionally `0x`-prefixed.
///
/// # Errors
/// `InvalidKeyFormat` when the string is not hex or not a subgroup point.
pub fn parse_public_key_hex(public_key_hex: &str) -> Result<PublicKey, CryptoOperationError> {
    let trimmed = public_key_hex.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(digits)
        .map_err(|e| CryptoOperationError::InvalidKeyFormat(format!("not hex: {}", e)))?;
    let point = EdwardsAffine::deserialize_compressed(bytes.as_slice()).map_err(|e| {
        CryptoOperationError::InvalidKeyFormat(format!("not a compressed public key: {}", e))
    })?;
    Ok(PublicKey {
        signer_x: FieldElement(point.x),
        signer_y: FieldElement(point.y),
    })
}

fn point(x: FieldElement, y: FieldElement) -> Result<EdwardsAffine, CryptoOperationError> {
    let candidate = EdwardsAffine::new_unchecked(x.0, y.0);
    if candidate.is_on_curve() && candidate.is_in_correct_subgroup_assuming_on_curve() {
        Ok(candidate)
    } else {
        Err(CryptoOperationError::InvalidPoint {
            x: x.to_canonical_string(),
            y: y.to_canonical_string(),
        })
    }
}

fn compress(point: &EdwardsAffine) -> Result<String, CryptoOperationError> {
    let mut bytes = Vec::with_capacity(32);
    point
        .serialize_compressed(&mut bytes)
        .map_err(|e| CryptoOperationError::InvalidPoint {
            x: e.to_string(),
            y: String::new(),
        })?;
    Ok(hex::encode(bytes))
}

fn challenge(r8: &EdwardsAffine, a: &EdwardsAffine, message: &FieldElement) -> JubFr {
    let k = poseidon_hash(&[r8.x, r8.y, a.x, a.y, message.0]);
    JubFr::from_le_bytes_mod_order(&k.into_bigint().to_bytes_le())
}
