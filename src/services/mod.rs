// src/services/mod.rs
//! Issuer-side intake and issuance, plus verification.

pub mod combined_proof;
pub mod credential_issuer;
pub mod inbox_poller;
pub mod subject_parser;
pub mod verifier;
