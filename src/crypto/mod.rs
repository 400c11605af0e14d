//! Cryptographic operations for pgpfile
//!
//! This module provides:
//! - The OpenPGP pipeline (keys, encryption, decryption)
//! - A byte- and file-oriented facade over it

pub mod pgp;
pub mod utils;

pub use pgp::{
    DecryptOutcome, DecryptionPipeline, EncryptOptions, EncryptionPipeline, KeyPairGenerator,
    KeyRingLoader, SecurePassphrase, VerificationResult,
};
pub use utils::Crypto;
