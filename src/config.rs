// src/config.rs
//! Runtime settings for the service endpoints, the circuit and intake policy.
//!
//! Sources, later ones winning:
//! 1. built-in defaults
//! 2. `zk-access.toml` in the working directory, or an explicit file
//! 3. `ZKACCESS_<SECTION>__<KEY>` environment variables (after `.env` is loaded)
//!
//! The issuer private key is deliberately absent; it is read per call from
//! `PRIVATE_KEY_BABY_JUB`. Only its public half appears here, as the trusted
//! issuer key proofs are built and checked against.

use crate::error::Result;
use crate::models::circuit::ProofOptions;
use crate::models::credential::PublicKey;
use crate::services::combined_proof::ValidationPolicy;
use crate::wallet::key_management::parse_public_key_hex;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default settings file, looked up relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "zk-access.toml";

/// Environment variable holding the issuer's BabyJubJub private key.
pub const PRIVATE_KEY_VAR: &str = "PRIVATE_KEY_BABY_JUB";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AgentSettings {
    pub url: String,
    pub api_key: Option<String>,
    /// Alias of the issuer DID managed by the agent
    pub alias: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BlueprintSettings {
    pub url: String,
    /// Registered blueprint the email proofs were generated against
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProverSettings {
    pub url: String,
    pub artifact_path: PathBuf,
    pub timeout_secs: u64,
    pub keccak: bool,
}

impl ProverSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn options(&self) -> ProofOptions {
        ProofOptions { keccak: self.keccak }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ValidationSettings {
    pub require_domain_match: bool,
    /// Recipient recorded on offers when the request does not name one
    pub email_recipient: String,
}

impl ValidationSettings {
    pub fn policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            require_domain_match: self.require_domain_match,
            email_recipient: self.email_recipient.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct InboxSettings {
    pub spool_dir: PathBuf,
    pub poll_interval_secs: u64,
}

impl InboxSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct IssuerSettings {
    /// Compressed BabyJubJub public key hex, as printed by `keygen`
    pub public_key: String,
}

/// All runtime settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    pub agent: AgentSettings,
    pub blueprint: BlueprintSettings,
    pub prover: ProverSettings,
    pub validation: ValidationSettings,
    pub inbox: InboxSettings,
    /// Trusted issuer; required to prove or verify access proofs
    #[serde(default)]
    pub issuer: Option<IssuerSettings>,
}

impl Settings {
    /// The trusted issuer key from `issuer.public_key`.
    ///
    /// # Errors
    /// - `Config` when no issuer is configured
    /// - `InvalidKeyFormat` when the key is not a compressed subgroup point
    pub fn issuer_key(&self) -> Result<PublicKey> {
        let issuer = self
            .issuer
            .as_ref()
            .ok_or_else(|| ConfigError::NotFound("issuer.public_key".into()))?;
        Ok(parse_public_key_hex(&issuer.public_key)?)
    }

    /// Loads settings from the default file (if present) and the process environment.
    ///
    /// # Arguments
    /// * `file` - Explicit settings file; must exist when given
    pub fn load(file: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();
        Self::build(file, environment())
    }

    fn build(file: Option<&Path>, env: Environment) -> Result<Self> {
        let file_source = match file {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = Config::builder()
            .set_default("agent.url", "http://localhost:3332/agent")?
            .set_default("agent.alias", "default")?
            .set_default("blueprint.url", "http://localhost:3400")?
            .set_default("blueprint.name", "LuchoLeonel/ZkAccess@v8")?
            .set_default("prover.url", "http://localhost:3500")?
            .set_default("prover.artifact_path", "circuits/zk_access.json")?
            .set_default("prover.timeout_secs", 120)?
            .set_default("prover.keccak", true)?
            .set_default("validation.require_domain_match", false)?
            .set_default("validation.email_recipient", "")?
            .set_default("inbox.spool_dir", "spool")?
            .set_default("inbox.poll_interval_secs", 60)?
            .add_source(file_source)
            .add_source(env)
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

fn environment() -> Environment {
    Environment::with_prefix("ZKACCESS")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
