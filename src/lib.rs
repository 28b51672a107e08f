// src/lib.rs
//! # zk-access
//!
//! Privacy-preserving access credentials.
//!
//! An issuer verifies zk-email offer proofs and a passport disclosure, commits
//! to every attribute with Poseidon and signs each commitment with a delegated
//! BabyJubJub key. A holder later proves rules such as `offer > 500000` over
//! those commitments with a zero-knowledge circuit, without revealing the
//! values themselves.
//!
//! ## Layout
//! - [`models`]: field elements, schemas, credentials, rules and circuit inputs
//! - [`services`]: intake, issuance, verification and inbox polling
//! - [`wallet`]: keys, held credentials and holder-side proving
//! - [`zkp`]: circuit input building and the external prover driver
//! - [`backends`]: HTTP clients for the blueprint verifier, DID/VC agent and prover

pub mod backends;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;
pub mod wallet;
pub mod zkp;

pub use error::{Error, Result};
