// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Decrypts an encrypted MongoDB audit log.
//!
//! Usage:
//!   decrypt_audit_log --file auditLog.bson --local-keyfile localKey
//!   decrypt_audit_log -f auditLog.json --kmip-server-ca-file ca.pem \
//!       --kmip-client-certificate-file client.pem --out decrypted.json
//!
//! Set `CI` to disable interactive credential prompts.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

use audit_decrypt::decryption::{Decryptor, WriterSink};
use audit_decrypt::keyproviders::{
    CredentialPrompt, InteractivePrompt, KeyProviderOpts, NonInteractivePrompt,
};

#[derive(Parser, Debug)]
#[command(version, about = "Decrypt an encrypted MongoDB audit log", long_about = None)]
struct Cli {
    /// Encrypted audit log, JSON or BSON
    #[arg(short, long)]
    file: PathBuf,

    /// Write decrypted records here instead of stdout
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Local KEK file, overriding the filename recorded in headers
    #[arg(long)]
    local_keyfile: Option<PathBuf>,

    /// PEM root CA of the KMIP servers
    #[arg(long)]
    kmip_server_ca_file: Option<PathBuf>,

    /// PEM file holding the KMIP client certificate and private key
    #[arg(long)]
    kmip_client_certificate_file: Option<PathBuf>,

    /// Password of an encrypted KMIP client private key
    #[arg(long)]
    kmip_client_certificate_password: Option<String>,

    #[arg(long)]
    kmip_username: Option<String>,

    #[arg(long)]
    kmip_password: Option<String>,

    #[arg(long)]
    aws_access_key: Option<String>,

    #[arg(long)]
    aws_secret_key: Option<String>,

    #[arg(long)]
    aws_session_token: Option<String>,

    #[arg(long)]
    azure_tenant_id: Option<String>,

    #[arg(long)]
    azure_client_id: Option<String>,

    #[arg(long)]
    azure_secret: Option<String>,

    /// GCP service account JSON key file
    #[arg(long)]
    gcp_service_account_key_file: Option<PathBuf>,

    /// Log filter, e.g. "info" or "audit_decrypt=debug" (default: RUST_LOG, then warn)
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn key_provider_opts(&mut self) -> KeyProviderOpts {
        let secret = |value: Option<String>| value.map(Zeroizing::new);

        let mut opts = KeyProviderOpts::new();
        opts.local_key_file = self.local_keyfile.take();
        opts.kmip_server_ca_file = self.kmip_server_ca_file.take();
        opts.kmip_client_certificate_file = self.kmip_client_certificate_file.take();
        opts.kmip_client_certificate_password =
            secret(self.kmip_client_certificate_password.take());
        opts.kmip_username = self.kmip_username.take();
        opts.kmip_password = secret(self.kmip_password.take());
        opts.aws_access_key = self.aws_access_key.take();
        opts.aws_secret_key = secret(self.aws_secret_key.take());
        opts.aws_session_token = secret(self.aws_session_token.take());
        opts.azure_tenant_id = self.azure_tenant_id.take();
        opts.azure_client_id = self.azure_client_id.take();
        opts.azure_secret = secret(self.azure_secret.take());
        opts.gcp_service_account_key_file = self.gcp_service_account_key_file.take();
        opts
    }
}

fn init_tracing(level: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn credential_prompt() -> Box<dyn CredentialPrompt> {
    if std::env::var_os("CI").is_some() {
        Box::new(NonInteractivePrompt)
    } else {
        Box::new(InteractivePrompt)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let mut cli = Cli::parse();

    if let Err(e) = init_tracing(cli.log_level.as_deref()) {
        eprintln!("Error: invalid log level: {}", e);
        return ExitCode::FAILURE;
    }

    match run(&mut cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %e, "Decryption failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every line was handled without error.
async fn run(cli: &mut Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let out: Box<dyn Write> = match &cli.out {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    };
    let mut sink = WriterSink::new(out);

    let mut decryptor =
        Decryptor::new(cli.key_provider_opts()).with_prompt(credential_prompt());
    let summary = decryptor.decrypt_file(&cli.file, &mut sink).await?;
    sink.into_inner().flush()?;

    info!(
        documents = summary.documents,
        warnings = summary.warnings,
        errors = summary.errors,
        "Done"
    );
    Ok(summary.errors == 0)
}
