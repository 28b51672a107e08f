// src/main.rs

//! # zk-access - Command Line Entry Point
//!
//! Wires the settings, the HTTP backends and the services together behind a
//! small CLI.
//!
//! ## Commands
//! - `keygen`: new BabyJubJub issuer key
//! - `bind`: offline binding of a JSON subject against a schema
//! - `issue`: combined proof intake, then binding and JWT issuance
//! - `paths`: provable field paths of a credential
//! - `prove` / `verify`: access proofs over a held credential
//! - `verify-credential`: local binding checks plus agent JWT verification
//! - `watch`: poll the mail spool and print parsed subjects
//!
//! ## Environment Variables
//! - `PRIVATE_KEY_BABY_JUB`: issuer private key (hex) for `bind` and `issue`
//! - `ZKACCESS_ISSUER__PUBLIC_KEY`: trusted issuer key for `prove` and `verify`
//! - `ZKACCESS_<SECTION>__<KEY>`: overrides for any setting
//! - `RUST_LOG`: log filter (default `info`)

use anyhow::{bail, Context};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::info;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use zk_access::backends::agent::HttpCredentialAgent;
use zk_access::backends::blueprint::HttpBlueprintVerifier;
use zk_access::backends::http_client::JsonServiceClient;
use zk_access::backends::noir::HttpProverBackend;
use zk_access::backends::CredentialAgent;
use zk_access::config::{Settings, PRIVATE_KEY_VAR};
use zk_access::models::attribute::Schema;
use zk_access::models::credential::IssuedCredential;
use zk_access::models::rule::Rule;
use zk_access::services::combined_proof::{
    CombinedProofRequest, CombinedProofValidator, ValidationOutcome,
};
use zk_access::services::credential_issuer::{group_from_json, CredentialIssuer, FieldBinder};
use zk_access::services::inbox_poller::{
    InboxPoller, MailHandler, MailMessage, SpoolDirectory,
};
use zk_access::services::subject_parser::ParsedSubject;
use zk_access::services::verifier::Verifier;
use zk_access::wallet::credential_storage::CredentialStorage;
use zk_access::wallet::key_management::EddsaSigner;
use zk_access::wallet::zkp_generation::HolderWallet;
use zk_access::zkp::proof_generation::{CircuitArtifact, ProofDriver};

#[derive(Parser, Debug)]
#[command(name = "zk-access", version, about = "Privacy-preserving access credentials")]
struct Cli {
    /// Settings file (defaults to ./zk-access.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a new issuer private key
    Keygen,

    /// Bind a JSON subject offline and print the unsigned credential
    Bind {
        /// Schema id or short name (`identity`, `offer`)
        #[arg(long)]
        schema: String,
        /// JSON object with the subject's fields
        #[arg(long)]
        subject: PathBuf,
        /// Issuer DID recorded in the delegation
        #[arg(long)]
        did: String,
        #[arg(long, env = PRIVATE_KEY_VAR, hide_env_values = true)]
        private_key: String,
    },

    /// Validate combined proofs and issue a credential through the agent
    Issue {
        /// JSON request with `zkEmailProofs` and `zkPassportProof`
        #[arg(long)]
        proofs: PathBuf,
        #[arg(long, env = PRIVATE_KEY_VAR, hide_env_values = true)]
        private_key: String,
    },

    /// List the provable field paths of a credential
    Paths {
        #[arg(long)]
        credential: PathBuf,
    },

    /// Prove rules over a held credential
    Prove {
        #[arg(long)]
        credential: PathBuf,
        /// JSON array of `{key, operation, value}` rules
        #[arg(long)]
        rules: PathBuf,
    },

    /// Verify an access proof
    Verify {
        #[arg(long)]
        proof: PathBuf,
    },

    /// Verify a credential's bindings and JWT envelope
    VerifyCredential {
        #[arg(long)]
        credential: PathBuf,
    },

    /// Poll the mail spool until interrupted
    Watch,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("cannot parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn agent(settings: &Settings) -> anyhow::Result<Arc<dyn CredentialAgent>> {
    let client = JsonServiceClient::new("agent", &settings.agent.url, None)?
        .with_bearer(settings.agent.api_key.clone());
    Ok(Arc::new(HttpCredentialAgent::new(client)))
}

fn proof_driver(settings: &Settings) -> anyhow::Result<ProofDriver> {
    let prover = &settings.prover;
    let artifact = CircuitArtifact::load(&prover.artifact_path)
        .with_context(|| format!("cannot load circuit {}", prover.artifact_path.display()))?;
    let client = JsonServiceClient::new("prover", &prover.url, None)?;
    Ok(ProofDriver::new(
        Arc::new(HttpProverBackend::new(client)),
        artifact,
        prover.options(),
        prover.timeout(),
        settings.issuer_key().context("no trusted issuer key configured")?,
    )?)
}

/// Prints each polled message's parsed subject as one JSON line.
struct PrintSubjects;

#[async_trait]
impl MailHandler for PrintSubjects {
    async fn handle(&self, message: &MailMessage, subject: ParsedSubject) {
        let line = serde_json::json!({"message": message.id, "fields": subject.fields()});
        println!("{}", line);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("cannot load settings")?;

    match cli.command {
        Commands::Keygen => {
            let key = EddsaSigner::generate_private_key();
            let signer = EddsaSigner::from_hex(&key)?;
            println!("{}={}", PRIVATE_KEY_VAR, key);
            println!("ZKACCESS_ISSUER__PUBLIC_KEY=0x{}", signer.public_key_hex()?);
        }

        Commands::Bind {
            schema,
            subject,
            did,
            private_key,
        } => {
            let schema = Schema::by_name(&schema)
                .with_context(|| format!("unknown schema `{}`", schema))?;
            let object: Map<String, Value> = read_json(&subject)?;
            let group = group_from_json(schema, &object)?;
            let bound = FieldBinder::new(did).bind(&[group], &private_key)?;
            print_json(&bound.into_credential(None))?;
        }

        Commands::Issue { proofs, private_key } => {
            let request: CombinedProofRequest = read_json(&proofs)?;
            let blueprint = JsonServiceClient::new("blueprint", &settings.blueprint.url, None)?;
            let validator = CombinedProofValidator::new(
                Arc::new(HttpBlueprintVerifier::new(blueprint, &settings.blueprint.name)),
                settings.validation.policy(),
            );

            let outcome = validator.validate(&request).await.context("proof intake failed")?;
            let candidate = match outcome {
                ValidationOutcome::Merged(candidate) => candidate,
                ValidationOutcome::Rejected { reason, detail } => bail!("{}: {}", reason, detail),
            };
            let issuer = CredentialIssuer::new(agent(&settings)?, &settings.agent.alias);
            let credential = issuer.bind_and_emit(&candidate, &private_key).await?;
            print_json(&credential)?;
        }

        Commands::Paths { credential } => {
            let credential: IssuedCredential = read_json(&credential)?;
            for path in credential.credential_subject.paths() {
                println!("{}", path);
            }
        }

        Commands::Prove { credential, rules } => {
            let credential: IssuedCredential = read_json(&credential)?;
            let rules: Vec<Rule> = read_json(&rules)?;

            let mut storage = CredentialStorage::new();
            let id = storage.store_credential(credential);
            let wallet = HolderWallet::new(storage, proof_driver(&settings)?);
            let proof = wallet.build_and_prove(&id, &rules).await?;
            print_json(&proof)?;
        }

        Commands::Verify { proof } => {
            let proof: Value = read_json(&proof)?;
            let verifier =
                Verifier::new(agent(&settings)?).with_proof_driver(proof_driver(&settings)?);
            let valid = verifier.verify_proof(&proof).await?;
            println!("{}", if valid { "valid" } else { "invalid" });
            if !valid {
                std::process::exit(1);
            }
        }

        Commands::VerifyCredential { credential } => {
            let credential: IssuedCredential = read_json(&credential)?;
            let verifier = Verifier::new(agent(&settings)?);
            let verification = verifier.verify_credential(&credential).await?;
            print_json(&verification)?;
            if !verification.verified {
                std::process::exit(1);
            }
        }

        Commands::Watch => {
            let inbox = &settings.inbox;
            let handle = InboxPoller::start(
                Arc::new(SpoolDirectory::new(&inbox.spool_dir)),
                inbox.poll_interval(),
                Arc::new(PrintSubjects),
            );
            tokio::signal::ctrl_c().await.context("cannot listen for ctrl-c")?;
            info!("Interrupted, stopping inbox poller");
            handle.stop().await?;
        }
    }

    Ok(())
}
