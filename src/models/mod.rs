// src/models/mod.rs
//! Data structures shared by the issuer, the holder wallet and the prover.

pub mod attribute;
pub mod circuit;
pub mod credential;
pub mod field;
pub mod rule;
