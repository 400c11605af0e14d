//! CLI Key Management - pass-phrase acquisition and key file locations

use crate::crypto::pgp::SecurePassphrase;
use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

/// Environment variable consulted before prompting for a pass-phrase.
pub const PASSPHRASE_ENV: &str = "PGPFILE_PASSPHRASE";

/// Handles pass-phrase prompting and key file naming at the CLI level
pub struct KeyManager;

impl KeyManager {
    /// Pass-phrase for a new key pair, entered twice when prompted
    pub fn new_passphrase(identity: &str) -> Result<SecurePassphrase> {
        if let Some(passphrase) = Self::from_env() {
            return Ok(passphrase);
        }

        let passphrase = SecurePassphrase::from_user_input_with_prompt(&format!(
            "Create a pass-phrase for the keys of {}",
            identity
        ))?;
        let confirm = SecurePassphrase::from_user_input_with_prompt("Repeat the pass-phrase")?;
        if passphrase.as_str() != confirm.as_str() {
            return Err(anyhow!("Pass-phrases do not match"));
        }
        Ok(passphrase)
    }

    /// Pass-phrase for an existing secret key file
    pub fn existing_passphrase(secret_key_path: &Path) -> Result<SecurePassphrase> {
        if let Some(passphrase) = Self::from_env() {
            return Ok(passphrase);
        }

        Ok(SecurePassphrase::from_user_input_with_prompt(&format!(
            "Enter the pass-phrase for {}",
            secret_key_path.display()
        ))?)
    }

    fn from_env() -> Option<SecurePassphrase> {
        std::env::var(PASSPHRASE_ENV)
            .ok()
            .map(SecurePassphrase::new)
    }

    /// Default public and secret key paths for a key pair stored under `dir`
    pub fn key_paths(dir: &Path, name: &str) -> (PathBuf, PathBuf) {
        (
            dir.join(format!("{}.pub.asc", name)),
            dir.join(format!("{}.sec.asc", name)),
        )
    }

    /// File-system friendly stem derived from an identity string
    pub fn file_stem(identity: &str) -> String {
        let stem: String = identity
            .trim()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if stem.is_empty() {
            "key".to_string()
        } else {
            stem
        }
    }

    /// Output path for decrypting `input` when none is given: strips `.pgp`, `.gpg` or `.asc`
    pub fn default_decrypt_output(input: &Path) -> PathBuf {
        match input.extension().and_then(|ext| ext.to_str()) {
            Some("pgp") | Some("gpg") | Some("asc") => input.with_extension(""),
            _ => {
                let mut name = input.as_os_str().to_owned();
                name.push(".out");
                PathBuf::from(name)
            }
        }
    }

    /// Output path for encrypting `input` when none is given
    pub fn default_encrypt_output(input: &Path, armor: bool) -> PathBuf {
        let mut name = input.as_os_str().to_owned();
        name.push(if armor { ".asc" } else { ".pgp" });
        PathBuf::from(name)
    }
}
