//! pgpfile - OpenPGP file encryption built on rPGP
//!
//! This crate generates key pairs, encrypts and optionally signs plaintext
//! streams to a recipient key, and decrypts messages while checking their
//! signatures. Key rings and messages may be armored or binary.

pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;

// Re-export commonly used items for convenience
pub use config::{KeyAlgorithm, PipelineConfig};
pub use crypto::pgp::{
    DecryptOutcome, DecryptionPipeline, EncryptOptions, EncryptionPipeline, KeyPairGenerator,
    KeyRingLoader, SecurePassphrase, VerificationResult,
};
pub use crypto::Crypto;
pub use error::{PgpError, PgpResult};
