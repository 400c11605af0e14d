//! Byte- and file-oriented helpers over the OpenPGP pipeline

use crate::config::PipelineConfig;
use crate::crypto::pgp::{
    DecryptOutcome, DecryptionPipeline, EncryptOptions, EncryptionPipeline, GeneratedKeyPair,
    KeyPairGenerator, KeyRingLoader, PublicKeyRing, SecretKeyRing, SecurePassphrase, Signer,
    VerificationResult,
};
use crate::error::{PgpError, PgpResult};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Convenience entry points: whole-buffer and whole-file encryption, decryption and key generation
#[derive(Debug, Clone, Default)]
pub struct Crypto {
    config: PipelineConfig,
}

impl Crypto {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    fn encryption(&self) -> EncryptionPipeline {
        EncryptionPipeline::new(self.config.clone())
    }

    fn decryption(&self) -> DecryptionPipeline {
        DecryptionPipeline::new(self.config.clone())
    }

    /// Generate a key pair with the configured algorithm
    pub fn generate_key_pair(
        &self,
        identity: &str,
        passphrase: &SecurePassphrase,
    ) -> PgpResult<GeneratedKeyPair> {
        KeyPairGenerator::new(self.config.key_algorithm).generate(identity, passphrase)
    }

    /// Encrypt a buffer to the first encryption-capable key in `public_key`
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        public_key: &[u8],
        options: &EncryptOptions,
    ) -> PgpResult<Vec<u8>> {
        let ring = KeyRingLoader::load_public_key(public_key)?;
        let mut out = Vec::new();
        self.encryption()
            .encrypt(plaintext, &mut out, ring.encryption_key()?, None, options)?;
        Ok(out)
    }

    /// Encrypt a buffer and sign it with the first signing-capable key in `secret_key`
    pub fn encrypt_and_sign(
        &self,
        plaintext: &[u8],
        public_key: &[u8],
        secret_key: &[u8],
        passphrase: &SecurePassphrase,
        options: &EncryptOptions,
    ) -> PgpResult<Vec<u8>> {
        let public_ring = KeyRingLoader::load_public_key(public_key)?;
        let secret_ring = KeyRingLoader::load_secret_key(secret_key)?;
        let signer = Signer {
            key: secret_ring.signing_key()?,
            passphrase,
        };
        let mut out = Vec::new();
        self.encryption().encrypt(
            plaintext,
            &mut out,
            public_ring.encryption_key()?,
            Some(signer),
            options,
        )?;
        Ok(out)
    }

    /// Decrypt a buffer; fails with `VerifierKeyRequired` if the message is signed
    pub fn decrypt(
        &self,
        message: &[u8],
        secret_key: &[u8],
        passphrase: &SecurePassphrase,
    ) -> PgpResult<Vec<u8>> {
        let secret_ring = KeyRingLoader::read_secret(secret_key)?;
        let mut out = Vec::new();
        self.decryption()
            .decrypt(message, &mut out, &secret_ring, passphrase, None)?;
        Ok(out)
    }

    /// Decrypt a buffer and check its signature against `verifier_key`
    pub fn decrypt_and_verify(
        &self,
        message: &[u8],
        secret_key: &[u8],
        passphrase: &SecurePassphrase,
        verifier_key: &[u8],
    ) -> PgpResult<(Vec<u8>, VerificationResult)> {
        let secret_ring = KeyRingLoader::read_secret(secret_key)?;
        let verifier_ring = KeyRingLoader::load_verification_key(verifier_key)?;
        let mut out = Vec::new();
        let outcome = self.decryption().decrypt(
            message,
            &mut out,
            &secret_ring,
            passphrase,
            Some(&verifier_ring),
        )?;
        Ok((out, outcome.verification))
    }

    /// Generate a key pair and store both halves as armored files
    ///
    /// The secret key file is readable by the owner only.
    pub fn generate_key_files(
        &self,
        identity: &str,
        passphrase: &SecurePassphrase,
        public_path: &Path,
        secret_path: &Path,
    ) -> PgpResult<GeneratedKeyPair> {
        let pair = self.generate_key_pair(identity, passphrase)?;
        write_atomic(public_path, false, |out| {
            out.write_all(pair.public_armored.as_bytes())?;
            Ok(())
        })?;
        write_atomic(secret_path, true, |out| {
            out.write_all(pair.secret_armored.as_bytes())?;
            Ok(())
        })?;
        log::info!(
            "Wrote key pair to {} and {}",
            public_path.display(),
            secret_path.display()
        );
        Ok(pair)
    }

    /// Encrypt `input` into `output` for the recipient in `public_key_path`
    pub fn encrypt_file(
        &self,
        input: &Path,
        output: &Path,
        public_key_path: &Path,
        options: &EncryptOptions,
    ) -> PgpResult<()> {
        let ring = read_public_file(public_key_path)?;
        let recipient = ring.encryption_key()?;
        let options = with_input_name(options, input);
        let plaintext = BufReader::new(File::open(input)?);

        write_atomic(output, false, |out| {
            self.encryption()
                .encrypt(plaintext, out, recipient, None, &options)?;
            Ok(())
        })
    }

    /// Encrypt `input` into `output` and sign it with the key in `secret_key_path`
    pub fn encrypt_file_and_sign(
        &self,
        input: &Path,
        output: &Path,
        public_key_path: &Path,
        secret_key_path: &Path,
        passphrase: &SecurePassphrase,
        options: &EncryptOptions,
    ) -> PgpResult<()> {
        let public_ring = read_public_file(public_key_path)?;
        let secret_ring = read_secret_file(secret_key_path)?;
        let recipient = public_ring.encryption_key()?;
        let signer = Signer {
            key: secret_ring.signing_key()?,
            passphrase,
        };
        let options = with_input_name(options, input);
        let plaintext = BufReader::new(File::open(input)?);

        write_atomic(output, false, |out| {
            self.encryption()
                .encrypt(plaintext, out, recipient, Some(signer), &options)?;
            Ok(())
        })
    }

    /// Decrypt `input` into `output`; `output` is only created on success
    pub fn decrypt_file(
        &self,
        input: &Path,
        output: &Path,
        secret_key_path: &Path,
        passphrase: &SecurePassphrase,
    ) -> PgpResult<DecryptOutcome> {
        let secret_ring = read_secret_file(secret_key_path)?;
        let message = File::open(input)?;

        write_atomic(output, false, |out| {
            self.decryption()
                .decrypt(message, out, &secret_ring, passphrase, None)
        })
    }

    /// Decrypt `input` into `output` and check its signature against `verifier_path`
    pub fn decrypt_file_and_verify(
        &self,
        input: &Path,
        output: &Path,
        secret_key_path: &Path,
        passphrase: &SecurePassphrase,
        verifier_path: &Path,
    ) -> PgpResult<DecryptOutcome> {
        let secret_ring = read_secret_file(secret_key_path)?;
        let verifier_ring = KeyRingLoader::load_verification_key(BufReader::new(File::open(
            verifier_path,
        )?))?;
        let message = File::open(input)?;

        write_atomic(output, false, |out| {
            self.decryption()
                .decrypt(message, out, &secret_ring, passphrase, Some(&verifier_ring))
        })
    }
}

fn read_public_file(path: &Path) -> PgpResult<PublicKeyRing> {
    KeyRingLoader::load_public_key(BufReader::new(File::open(path)?))
}

fn read_secret_file(path: &Path) -> PgpResult<SecretKeyRing> {
    KeyRingLoader::read_secret(BufReader::new(File::open(path)?))
}

fn with_input_name(options: &EncryptOptions, input: &Path) -> EncryptOptions {
    if !options.file_name.is_empty() {
        return options.clone();
    }
    let name = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    options.clone().with_file_name(name)
}

/// Write through a temporary file in the destination directory, then rename it into place.
///
/// On error the temporary file is removed and `path` is left untouched.
fn write_atomic<T, F>(path: &Path, secret: bool, write: F) -> PgpResult<T>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> PgpResult<T>,
{
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;

    let value = {
        let mut out = BufWriter::new(tmp.as_file_mut());
        let value = write(&mut out)?;
        out.flush()?;
        value
    };
    tmp.as_file().sync_all()?;
    set_output_permissions(tmp.as_file(), secret)?;

    tmp.persist(path).map_err(|e| PgpError::Io(e.error))?;
    log::debug!("Persisted {}", path.display());
    Ok(value)
}

#[cfg(unix)]
fn set_output_permissions(file: &File, secret: bool) -> PgpResult<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = if secret { 0o600 } else { 0o644 };
    file.set_permissions(std::fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_output_permissions(_file: &File, _secret: bool) -> PgpResult<()> {
    Ok(())
}
