// src/zkp/mod.rs
//! Circuit input building, proof generation and proof verification.

pub mod proof_generation;
pub mod proof_verification;
pub mod witness_builder;
