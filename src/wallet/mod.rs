// src/wallet/mod.rs
//! Keys, held credentials and holder-side proving.

pub mod credential_storage;
pub mod key_management;
pub mod zkp_generation;
