// src/utils/crypto.rs
//! Poseidon commitments over the BN254 scalar field.
//!
//! `hash(key, value) = Poseidon([encode(key), encode(value)])`. The same
//! sponge is used by the EdDSA challenge in
//! [`key_management`](crate::wallet::key_management), so one circuit can
//! recompute both the commitment and the signature check.
//!
//! ## Parameters
//! - Full rounds: 8
//! - Partial rounds: 57
//! - Alpha (S-box): 5
//! - Rate: 2
//! - Capacity: 1
//! - Round constants and MDS matrix from the Grain LFSR

use crate::models::field::FieldElement;
use ark_bn254::Fr as Bn254Fr;
use ark_crypto_primitives::sponge::poseidon::{
    find_poseidon_ark_and_mds, PoseidonConfig, PoseidonSponge,
};
use ark_crypto_primitives::sponge::CryptographicSponge;
use ark_ff::PrimeField;
use once_cell::sync::Lazy;

const FULL_ROUNDS: usize = 8;
const PARTIAL_ROUNDS: usize = 57;
const ALPHA: u64 = 5;
const RATE: usize = 2;
const CAPACITY: usize = 1;

/// Bytes per chunk when packing a string; 31 bytes always fit below the modulus.
const CHUNK_BYTES: usize = 31;

/// Domain tag absorbed before a packed (non-numeric) string.
const STRING_TAG: u64 = 0x7a6b_6163_6373; // "zkaccs"

/// Process-wide Poseidon configuration, derived once.
static POSEIDON_CONFIG: Lazy<PoseidonConfig<Bn254Fr>> = Lazy::new(|| {
    let (ark, mds) = find_poseidon_ark_and_mds::<Bn254Fr>(
        Bn254Fr::MODULUS_BIT_SIZE as u64,
        RATE,
        FULL_ROUNDS as u64,
        PARTIAL_ROUNDS as u64,
        0,
    );
    PoseidonConfig::new(FULL_ROUNDS, PARTIAL_ROUNDS, ALPHA, mds, ark, RATE, CAPACITY)
});

/// Retrieves the global Poseidon configuration.
pub fn poseidon_config() -> &'static PoseidonConfig<Bn254Fr> {
    &POSEIDON_CONFIG
}

/// Poseidon sponge over a sequence of field elements, squeezing one element.
pub fn poseidon_hash(inputs: &[Bn254Fr]) -> Bn254Fr {
    let mut sponge = PoseidonSponge::<Bn254Fr>::new(poseidon_config());
    sponge.absorb(&inputs.to_vec());
    sponge.squeeze_field_elements::<Bn254Fr>(1)[0]
}

/// Parses a canonical unsigned decimal (`"0"`, `"1000000"`; no sign, no leading zeros).
pub fn canonical_u64(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if s.len() > 1 && s.starts_with('0') {
        return None;
    }
    s.parse().ok()
}

/// Maps an attribute string to a single field element.
///
/// Canonical `u64` decimals map to themselves so the circuit can order them;
/// every other string is packed into 31-byte chunks and hashed.
pub fn encode_attribute(s: &str) -> FieldElement {
    if let Some(n) = canonical_u64(s) {
        return FieldElement::from(n);
    }

    let bytes = s.as_bytes();
    let mut inputs = Vec::with_capacity(2 + bytes.len() / CHUNK_BYTES + 1);
    inputs.push(Bn254Fr::from(STRING_TAG));
    inputs.push(Bn254Fr::from(bytes.len() as u64));
    inputs.extend(bytes.chunks(CHUNK_BYTES).map(Bn254Fr::from_le_bytes_mod_order));
    FieldElement(poseidon_hash(&inputs))
}

/// Hash of a standalone string (used for the delegation message).
pub fn hash_string(s: &str) -> FieldElement {
    encode_attribute(s)
}

/// `PoseidonCommit.hash`: commitment to one `(key, value)` attribute.
pub fn hash_attribute(key: &str, value: &str) -> FieldElement {
    let key = encode_attribute(key);
    let value = encode_attribute(value);
    FieldElement(poseidon_hash(&[key.0, value.0]))
}
