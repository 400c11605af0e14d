//! Pipeline configuration.
//!
//! Defaults favour broad interoperability. Every value can be overridden in
//! code with the `with_*` setters or from `PGPFILE_*` environment variables.

use crate::error::{PgpError, PgpResult};
use pgp::crypto::hash::HashAlgorithm;
use pgp::crypto::sym::SymmetricKeyAlgorithm;
use pgp::types::CompressionAlgorithm;

/// Spool size kept in memory before decrypted plaintext spills to disk.
pub const DEFAULT_SPOOL_THRESHOLD: usize = 1024 * 1024;

/// Key material generated for new key pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    /// Ed25519 signing subkey plus Curve25519 encryption subkey.
    Curve25519,
    /// RSA primary and subkeys with the given modulus size in bits.
    Rsa(u32),
}

impl Default for KeyAlgorithm {
    fn default() -> Self {
        KeyAlgorithm::Curve25519
    }
}

/// Algorithms and limits shared by the encryption and decryption pipelines.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub compression: CompressionAlgorithm,
    pub symmetric: SymmetricKeyAlgorithm,
    pub hash: HashAlgorithm,
    pub key_algorithm: KeyAlgorithm,
    pub spool_threshold: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            compression: CompressionAlgorithm::ZIP,
            symmetric: SymmetricKeyAlgorithm::AES256,
            hash: HashAlgorithm::Sha256,
            key_algorithm: KeyAlgorithm::default(),
            spool_threshold: DEFAULT_SPOOL_THRESHOLD,
        }
    }
}

impl PipelineConfig {
    pub fn with_compression(mut self, compression: CompressionAlgorithm) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_symmetric(mut self, symmetric: SymmetricKeyAlgorithm) -> Self {
        self.symmetric = symmetric;
        self
    }

    pub fn with_hash(mut self, hash: HashAlgorithm) -> Self {
        self.hash = hash;
        self
    }

    pub fn with_key_algorithm(mut self, key_algorithm: KeyAlgorithm) -> Self {
        self.key_algorithm = key_algorithm;
        self
    }

    pub fn with_spool_threshold(mut self, spool_threshold: usize) -> Self {
        self.spool_threshold = spool_threshold;
        self
    }

    /// Build a configuration from `PGPFILE_*` environment variables.
    ///
    /// Unset variables keep their defaults; unknown values are rejected.
    pub fn from_env() -> PgpResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> PgpResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("PGPFILE_COMPRESSION") {
            config.compression = parse_compression(&value)?;
        }
        if let Some(value) = lookup("PGPFILE_CIPHER") {
            config.symmetric = parse_symmetric(&value)?;
        }
        if let Some(value) = lookup("PGPFILE_HASH") {
            config.hash = parse_hash(&value)?;
        }
        if let Some(value) = lookup("PGPFILE_KEY_ALGORITHM") {
            config.key_algorithm = parse_key_algorithm(&value)?;
        }
        if let Some(value) = lookup("PGPFILE_SPOOL_THRESHOLD") {
            config.spool_threshold = value.trim().parse().map_err(|_| {
                PgpError::Config(format!("PGPFILE_SPOOL_THRESHOLD is not a size: {}", value))
            })?;
        }

        log::debug!(
            "Pipeline config: compression={:?}, cipher={:?}, hash={:?}, keys={:?}",
            config.compression,
            config.symmetric,
            config.hash,
            config.key_algorithm
        );
        Ok(config)
    }
}

pub fn parse_compression(value: &str) -> PgpResult<CompressionAlgorithm> {
    match value.trim().to_ascii_lowercase().as_str() {
        "zip" => Ok(CompressionAlgorithm::ZIP),
        "zlib" => Ok(CompressionAlgorithm::ZLIB),
        "none" | "uncompressed" => Ok(CompressionAlgorithm::Uncompressed),
        other => Err(PgpError::Config(format!(
            "unknown compression algorithm: {}",
            other
        ))),
    }
}

pub fn parse_symmetric(value: &str) -> PgpResult<SymmetricKeyAlgorithm> {
    match value.trim().to_ascii_lowercase().as_str() {
        "aes128" => Ok(SymmetricKeyAlgorithm::AES128),
        "aes192" => Ok(SymmetricKeyAlgorithm::AES192),
        "aes256" => Ok(SymmetricKeyAlgorithm::AES256),
        "twofish" => Ok(SymmetricKeyAlgorithm::Twofish),
        "cast5" => Ok(SymmetricKeyAlgorithm::CAST5),
        "3des" | "tripledes" => Ok(SymmetricKeyAlgorithm::TripleDES),
        other => Err(PgpError::Config(format!("unknown cipher: {}", other))),
    }
}

pub fn parse_hash(value: &str) -> PgpResult<HashAlgorithm> {
    match value.trim().to_ascii_lowercase().as_str() {
        "sha256" => Ok(HashAlgorithm::Sha256),
        "sha384" => Ok(HashAlgorithm::Sha384),
        "sha512" => Ok(HashAlgorithm::Sha512),
        other => Err(PgpError::Config(format!("unknown hash algorithm: {}", other))),
    }
}

pub fn parse_key_algorithm(value: &str) -> PgpResult<KeyAlgorithm> {
    match value.trim().to_ascii_lowercase().as_str() {
        "curve25519" | "ed25519" => Ok(KeyAlgorithm::Curve25519),
        "rsa2048" => Ok(KeyAlgorithm::Rsa(2048)),
        "rsa3072" => Ok(KeyAlgorithm::Rsa(3072)),
        "rsa4096" => Ok(KeyAlgorithm::Rsa(4096)),
        other => Err(PgpError::Config(format!("unknown key algorithm: {}", other))),
    }
}
