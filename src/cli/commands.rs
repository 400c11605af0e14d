use crate::cli::KeyManager;
use crate::config::PipelineConfig;
use crate::crypto::pgp::{EncryptOptions, VerificationResult};
use crate::crypto::Crypto;
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::info;
use pgp::types::KeyDetails;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pgpfile")]
#[command(about = "pgpfile - OpenPGP file encryption, decryption, signing and verification")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a new key pair
    GenKey {
        /// Identity bound to the key, e.g. an email address
        identity: String,
        /// Directory the armored key files are written to
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Encrypt a file to a recipient public key
    Encrypt {
        /// File to encrypt
        input: PathBuf,
        /// Recipient public key file
        #[arg(short, long)]
        recipient: PathBuf,
        /// Output file (defaults to the input name plus .asc or .pgp)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Sign with this secret key file
        #[arg(short, long)]
        sign_with: Option<PathBuf>,
        /// ASCII-armor the output
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        armor: bool,
        /// Compress before encrypting
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        compress: bool,
    },
    /// Decrypt a file with a secret key
    Decrypt {
        /// File to decrypt
        input: PathBuf,
        /// Secret key file
        #[arg(short, long)]
        key: PathBuf,
        /// Output file (defaults to the input name without .asc, .pgp or .gpg)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Verify the signature against this public key file
        #[arg(long)]
        verify_with: Option<PathBuf>,
    },
}

pub struct CliApp {
    crypto: Crypto,
}

impl CliApp {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            crypto: Crypto::new(config),
        }
    }

    pub fn gen_key(&self, identity: &str, out_dir: &Path) -> Result<(PathBuf, PathBuf)> {
        let passphrase = KeyManager::new_passphrase(identity)?;
        let (public_path, secret_path) =
            KeyManager::key_paths(out_dir, &KeyManager::file_stem(identity));

        info!("Generating key pair for {}", identity);
        let pair = self
            .crypto
            .generate_key_files(identity, &passphrase, &public_path, &secret_path)?;

        println!("Fingerprint: {}", pair.public_key.fingerprint());
        println!("Public key:  {}", public_path.display());
        println!("Secret key:  {}", secret_path.display());
        Ok((public_path, secret_path))
    }

    pub fn encrypt(
        &self,
        input: &Path,
        recipient: &Path,
        output: Option<&Path>,
        sign_with: Option<&Path>,
        options: &EncryptOptions,
    ) -> Result<PathBuf> {
        let output = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| KeyManager::default_encrypt_output(input, options.armor));

        match sign_with {
            Some(secret_key) => {
                let passphrase = KeyManager::existing_passphrase(secret_key)?;
                self.crypto.encrypt_file_and_sign(
                    input,
                    &output,
                    recipient,
                    secret_key,
                    &passphrase,
                    options,
                )?;
            }
            None => self.crypto.encrypt_file(input, &output, recipient, options)?,
        }

        info!("Encrypted {} to {}", input.display(), output.display());
        println!("{}", output.display());
        Ok(output)
    }

    pub fn decrypt(
        &self,
        input: &Path,
        key: &Path,
        output: Option<&Path>,
        verify_with: Option<&Path>,
    ) -> Result<PathBuf> {
        let output = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| KeyManager::default_decrypt_output(input));
        if output == input {
            return Err(anyhow!(
                "Refusing to overwrite the input file {}",
                input.display()
            ));
        }

        let passphrase = KeyManager::existing_passphrase(key)?;
        let outcome = match verify_with {
            Some(verifier) => self
                .crypto
                .decrypt_file_and_verify(input, &output, key, &passphrase, verifier)?,
            None => self.crypto.decrypt_file(input, &output, key, &passphrase)?,
        };

        info!(
            "Decrypted {} to {} ({} bytes)",
            input.display(),
            output.display(),
            outcome.bytes_written
        );
        match outcome.verification {
            VerificationResult::Valid => println!("Signature: valid"),
            VerificationResult::Invalid => println!("Signature: INVALID"),
            VerificationResult::Absent => {}
        }

        if outcome.verification == VerificationResult::Invalid {
            std::fs::remove_file(&output)?;
            return Err(anyhow!("Signature verification failed"));
        }
        println!("{}", output.display());
        Ok(output)
    }
}

pub fn run_cli(cli: Cli) -> Result<()> {
    let config = PipelineConfig::from_env()?;
    let app = CliApp::new(config);

    match cli.command {
        Commands::GenKey { identity, out_dir } => {
            app.gen_key(&identity, &out_dir)?;
        }

        Commands::Encrypt {
            input,
            recipient,
            output,
            sign_with,
            armor,
            compress,
        } => {
            let options = EncryptOptions::default()
                .with_armor(armor)
                .with_compression(compress);
            app.encrypt(
                &input,
                &recipient,
                output.as_deref(),
                sign_with.as_deref(),
                &options,
            )?;
        }

        Commands::Decrypt {
            input,
            key,
            output,
            verify_with,
        } => {
            app.decrypt(&input, &key, output.as_deref(), verify_with.as_deref())?;
        }
    }

    Ok(())
}
