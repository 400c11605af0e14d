//! OpenPGP file pipeline
//!
//! This module handles:
//! - Key pair generation with pass-phrase protected secret material
//! - Loading key rings and selecting keys by capability
//! - Encrypting (and optionally signing) plaintext streams
//! - Decrypting messages and verifying their signatures

pub mod armor;
pub mod decrypt;
pub mod encrypt;
pub mod keypair;
pub mod keyring;
pub mod unlock;

pub use decrypt::{DecryptOutcome, DecryptionPipeline, VerificationResult};
pub use encrypt::{EncryptOptions, EncryptionPipeline, Layer, LayerPlan, Signer};
pub use keypair::{GeneratedKeyPair, KeyPairGenerator, SecurePassphrase};
pub use keyring::{
    Capability, KeyRingLoader, PublicKeyHandle, PublicKeyRing, SecretKeyHandle, SecretKeyRing,
};
pub use unlock::{SecretKeyUnlocker, UnlockedPrivateKey};
