//! Error types for pgpfile operations.
//!
//! Every failure is surfaced to the immediate caller as a distinct variant.
//! Messages never include pass-phrases or key material.

use thiserror::Error;

/// Errors that can occur while loading keys or running a message pipeline.
#[derive(Debug, Error)]
pub enum PgpError {
    /// The key-ring or message container could not be parsed at all.
    #[error("Malformed OpenPGP container: {0}")]
    MalformedContainer(String),

    /// The container parsed, but holds no key with the required capability.
    #[error("No {0} key found in key ring")]
    KeyNotFound(&'static str),

    /// The pass-phrase does not unlock the secret key material.
    #[error("Invalid pass-phrase")]
    InvalidPassPhrase,

    /// The recipient key cannot be used for encryption.
    #[error("Recipient key is not usable for encryption")]
    EncryptionKeyUnusable,

    /// The signer key cannot be used for signing.
    #[error("Signer key is not usable for signing")]
    SigningKeyUnusable,

    /// No encrypted session key in the message targets the supplied secret key.
    #[error("Message is not encrypted to the supplied secret key")]
    DecryptionKeyMismatch,

    /// A layer boundary of the message is inconsistent or truncated.
    #[error("Corrupt OpenPGP message: {0}")]
    CorruptMessage(String),

    /// The message carries a signature layer but no verifier key was supplied.
    #[error("Message is signed; a verifier public key is required")]
    VerifierKeyRequired,

    /// The identity bound into a new key pair was empty.
    #[error("Identity must not be empty")]
    InvalidIdentity,

    /// The primitives library failed to produce a key pair.
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// A configuration value could not be interpreted.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Underlying stream failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for pgpfile operations.
pub type PgpResult<T> = Result<T, PgpError>;
